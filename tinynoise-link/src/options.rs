use rand_core::CryptoRngCore;
use tinynoise_handshake::{
    HandshakeState, KeyPair, PresharedKey, ProtocolDescriptor, PublicKey, RequiredKeys, Role,
};
use tracing::debug;

use crate::error::Error;
use crate::negotiation::TransportOptions;

/// Maximum number of protocols a [`LinkOptions`] can offer.
pub const MAX_PROTOCOLS: usize = 4;

/// Default send and receive buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Smallest accepted buffer size; smaller requests are raised to this.
pub const MIN_BUFFER_SIZE: usize = 128;

/// Largest accepted buffer size; larger requests are lowered to this.
pub const MAX_BUFFER_SIZE: usize = 2048;

/// How transport messages are padded up to the buffer size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Padding {
    #[default]
    None,
    Zero,
    Random,
}

impl Padding {
    /// Fill `buf` according to the padding mode. `None` leaves it untouched.
    pub fn fill(self, buf: &mut [u8], rng: &mut impl CryptoRngCore) {
        match self {
            Self::None => {}
            Self::Zero => buf.fill(0),
            Self::Random => rng.fill_bytes(buf),
        }
    }
}

/// Keys, protocol preferences and buffer settings for one end of a link.
///
/// # Example
///
/// ```rust,no_run
/// use rand_core::OsRng;
/// use tinynoise_handshake::{KeyPair, Role, protocol};
/// use tinynoise_link::LinkOptions;
///
/// let mut options = LinkOptions::new().with_local_keypair(KeyPair::generate(&mut OsRng));
/// options.add_protocol(&protocol::NOISE_XX_25519_CHACHAPOLY_BLAKE2S)?;
///
/// let mut handshake = options.create_handshake(Role::Initiator, 0)?;
/// handshake.start(Role::Initiator, b"")?;
/// # Ok::<(), tinynoise_link::Error>(())
/// ```
#[derive(Clone)]
pub struct LinkOptions {
    local_keypair: Option<KeyPair>,
    remote_public: Option<PublicKey>,
    psk: Option<PresharedKey>,
    protocols: Vec<&'static ProtocolDescriptor>,
    send_buffer_size: usize,
    receive_buffer_size: usize,
    allow_aliases: bool,
    padding: Padding,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            local_keypair: None,
            remote_public: None,
            psk: None,
            protocols: Vec::with_capacity(MAX_PROTOCOLS),
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            receive_buffer_size: DEFAULT_BUFFER_SIZE,
            allow_aliases: true,
            padding: Padding::None,
        }
    }
}

impl LinkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_keypair(mut self, keypair: KeyPair) -> Self {
        self.local_keypair = Some(keypair);
        self
    }

    /// Set the peer's static public key, needed to initiate IK.
    pub fn with_remote_public(mut self, key: PublicKey) -> Self {
        self.remote_public = Some(key);
        self
    }

    pub fn with_preshared_key(mut self, psk: PresharedKey) -> Self {
        self.psk = Some(psk);
        self
    }

    // ----- keys -----

    pub fn local_keypair(&self) -> Option<&KeyPair> {
        self.local_keypair.as_ref()
    }

    pub fn set_local_keypair(&mut self, keypair: KeyPair) {
        self.local_keypair = Some(keypair);
    }

    /// Set the local static key from 32 bytes of secret key material.
    pub fn set_local_private_key(&mut self, secret: &[u8]) -> Result<(), Error> {
        self.local_keypair = Some(KeyPair::from_secret_slice(secret)?);
        Ok(())
    }

    /// Generate a fresh local static keypair and return its public half.
    pub fn generate_local_keypair(&mut self, rng: &mut impl CryptoRngCore) -> PublicKey {
        let keypair = KeyPair::generate(rng);
        let public = keypair.public;
        self.local_keypair = Some(keypair);
        public
    }

    pub fn local_public_key(&self) -> Option<PublicKey> {
        self.local_keypair.as_ref().map(|pair| pair.public)
    }

    pub fn remove_local_keypair(&mut self) {
        self.local_keypair = None;
    }

    pub fn remote_public_key(&self) -> Option<PublicKey> {
        self.remote_public
    }

    pub fn set_remote_public_key(&mut self, key: PublicKey) {
        self.remote_public = Some(key);
    }

    pub fn remove_remote_public_key(&mut self) {
        self.remote_public = None;
    }

    /// Set the pre-shared key; it must be exactly 32 bytes.
    pub fn set_preshared_key(&mut self, psk: &[u8]) -> Result<(), Error> {
        self.psk = Some(PresharedKey::from_slice(psk)?);
        Ok(())
    }

    pub fn has_preshared_key(&self) -> bool {
        self.psk.is_some()
    }

    pub fn remove_preshared_key(&mut self) {
        self.psk = None;
    }

    // ----- protocols -----

    /// Append a protocol to the preference list. Adding one that is
    /// already listed does nothing.
    pub fn add_protocol(&mut self, protocol: &'static ProtocolDescriptor) -> Result<(), Error> {
        if self.protocols.contains(&protocol) {
            return Ok(());
        }
        if self.protocols.len() >= MAX_PROTOCOLS {
            return Err(Error::TooManyProtocols);
        }
        self.protocols.push(protocol);
        Ok(())
    }

    pub fn remove_protocol(&mut self, protocol: &ProtocolDescriptor) {
        self.protocols.retain(|p| *p != protocol);
    }

    pub fn protocols(&self) -> &[&'static ProtocolDescriptor] {
        &self.protocols
    }

    pub fn protocol_at(&self, index: usize) -> Option<&'static ProtocolDescriptor> {
        self.protocols.get(index).copied()
    }

    /// Index of the configured protocol called `name`, also matching
    /// aliases when [`allow_aliases`](Self::allow_aliases) is set.
    pub fn protocol_index(&self, name: &str) -> Option<usize> {
        self.protocols.iter().position(|p| {
            p.name() == name || (self.allow_aliases && p.alias() == Some(name))
        })
    }

    // ----- buffers and padding -----

    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }

    /// Set the send buffer size, clamped to
    /// [`MIN_BUFFER_SIZE`]..=[`MAX_BUFFER_SIZE`].
    pub fn set_send_buffer_size(&mut self, size: usize) {
        self.send_buffer_size = size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
    }

    pub fn receive_buffer_size(&self) -> usize {
        self.receive_buffer_size
    }

    /// Set the receive buffer size, clamped like the send size.
    pub fn set_receive_buffer_size(&mut self, size: usize) {
        self.receive_buffer_size = size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
    }

    pub fn allow_aliases(&self) -> bool {
        self.allow_aliases
    }

    pub fn set_allow_aliases(&mut self, allow: bool) {
        self.allow_aliases = allow;
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    pub fn set_padding(&mut self, padding: Padding) {
        self.padding = padding;
    }

    /// The buffer limits to advertise to the peer.
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            max_send_length: u32::try_from(self.send_buffer_size).ok(),
            max_recv_length: u32::try_from(self.receive_buffer_size).ok(),
            ..TransportOptions::default()
        }
    }

    // ----- whole-object operations -----

    /// Replace every setting with a copy of `other`'s.
    pub fn copy_from(&mut self, other: &LinkOptions) {
        self.clone_from(other);
    }

    /// Forget all keys. Protocol and buffer settings are kept.
    pub fn clear(&mut self) {
        // KeyPair and PresharedKey scrub themselves on drop.
        self.local_keypair = None;
        self.remote_public = None;
        self.psk = None;
    }

    /// Create a handshake for the protocol at `index`, loaded with the keys
    /// it requires for `role`. The caller still has to `start` it.
    pub fn create_handshake(&self, role: Role, index: usize) -> Result<HandshakeState, Error> {
        let protocol = self.protocol_at(index).ok_or(Error::NoSuchProtocol)?;
        let required = protocol.required_keys(role);

        let needs = |keys| required.contains(keys);

        let local = self.local_keypair.as_ref().filter(|_| needs(RequiredKeys::LOCAL_STATIC));
        let remote = self.remote_public.filter(|_| needs(RequiredKeys::REMOTE_STATIC));
        let psk = self.psk.as_ref().filter(|_| needs(RequiredKeys::PSK));

        let missing = (needs(RequiredKeys::LOCAL_STATIC) && local.is_none())
            || (needs(RequiredKeys::REMOTE_STATIC) && remote.is_none())
            || (needs(RequiredKeys::PSK) && psk.is_none());
        if missing {
            debug!(protocol = protocol.name(), ?role, "missing key for handshake");
            return Err(tinynoise_handshake::Error::MissingKey.into());
        }

        let mut handshake = protocol.create_handshake();
        if let Some(keypair) = local {
            handshake.set_local_keypair(keypair.clone())?;
        }
        if let Some(key) = remote {
            handshake.set_remote_public_key(key)?;
        }
        if let Some(psk) = psk {
            handshake.set_preshared_key(psk.as_bytes())?;
        }
        debug!(protocol = protocol.name(), ?role, "created handshake");
        Ok(handshake)
    }
}

impl core::fmt::Debug for LinkOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkOptions")
            .field("local_public", &self.local_public_key())
            .field("remote_public", &self.remote_public)
            .field("has_psk", &self.psk.is_some())
            .field("protocols", &self.protocols.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("send_buffer_size", &self.send_buffer_size)
            .field("receive_buffer_size", &self.receive_buffer_size)
            .field("allow_aliases", &self.allow_aliases)
            .field("padding", &self.padding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use tinynoise_handshake::{KeyId, State, protocol};

    #[test]
    fn defaults() {
        let options = LinkOptions::new();
        assert_eq!(options.send_buffer_size(), 512);
        assert_eq!(options.receive_buffer_size(), 512);
        assert!(options.allow_aliases());
        assert_eq!(options.padding(), Padding::None);
        assert!(options.protocols().is_empty());
        assert!(options.local_keypair().is_none());
    }

    #[test]
    fn buffer_sizes_clamped() {
        let mut options = LinkOptions::new();
        options.set_send_buffer_size(10);
        options.set_receive_buffer_size(1 << 20);
        assert_eq!(options.send_buffer_size(), MIN_BUFFER_SIZE);
        assert_eq!(options.receive_buffer_size(), MAX_BUFFER_SIZE);
        options.set_send_buffer_size(1000);
        assert_eq!(options.send_buffer_size(), 1000);

        let transport = options.transport_options();
        assert_eq!(transport.max_send_length, Some(1000));
        assert_eq!(transport.max_recv_length, Some(2048));
    }

    #[test]
    fn protocol_list_limits() {
        let mut options = LinkOptions::new();
        for &p in &protocol::PROTOCOLS[..MAX_PROTOCOLS] {
            options.add_protocol(p).unwrap();
        }
        // duplicates are ignored even when full
        options.add_protocol(protocol::PROTOCOLS[0]).unwrap();
        assert_eq!(
            options.add_protocol(protocol::PROTOCOLS[MAX_PROTOCOLS]),
            Err(Error::TooManyProtocols)
        );
        assert_eq!(options.protocols().len(), MAX_PROTOCOLS);

        options.remove_protocol(protocol::PROTOCOLS[1]);
        assert_eq!(options.protocols().len(), MAX_PROTOCOLS - 1);
        assert_eq!(options.protocol_at(1), Some(protocol::PROTOCOLS[2]));
        assert_eq!(options.protocol_at(9), None);
    }

    #[test]
    fn alias_lookup() {
        let mut options = LinkOptions::new();
        options.add_protocol(&protocol::NOISE_IK_25519_AESGCM_SHA256).unwrap();
        options.add_protocol(&protocol::NOISE_XX_25519_CHACHAPOLY_SHA256).unwrap();

        assert_eq!(options.protocol_index("Noise_XX_25519_ChaChaPoly_SHA256"), Some(1));
        assert_eq!(options.protocol_index("2"), Some(1));
        assert_eq!(options.protocol_index("3"), None);
        options.set_allow_aliases(false);
        assert_eq!(options.protocol_index("2"), None);
    }

    #[test]
    fn private_key_and_psk_lengths() {
        let mut options = LinkOptions::new();
        assert_eq!(
            options.set_local_private_key(&[1u8; 31]),
            Err(Error::Handshake(tinynoise_handshake::Error::BadKey))
        );
        options.set_local_private_key(&[1u8; 32]).unwrap();
        assert_eq!(
            options.local_public_key(),
            Some(KeyPair::from_secret_bytes([1u8; 32]).public)
        );
        assert!(options.set_preshared_key(&[0u8; 33]).is_err());
        options.set_preshared_key(&[0u8; 32]).unwrap();
        assert!(options.has_preshared_key());
    }

    #[test]
    fn copy_and_clear() {
        let mut source = LinkOptions::new();
        let public = source.generate_local_keypair(&mut OsRng);
        source.set_preshared_key(&[5u8; 32]).unwrap();
        source.set_padding(Padding::Random);
        source.add_protocol(&protocol::NOISE_NNPSK0_25519_AESGCM_SHA256).unwrap();

        let mut copy = LinkOptions::new();
        copy.copy_from(&source);
        assert_eq!(copy.local_public_key(), Some(public));
        assert_eq!(copy.padding(), Padding::Random);
        assert_eq!(copy.protocols(), source.protocols());

        copy.clear();
        assert!(copy.local_public_key().is_none());
        assert!(!copy.has_preshared_key());
        assert_eq!(copy.protocols().len(), 1);
        assert!(source.has_preshared_key());
    }

    #[test]
    fn create_handshake_checks_keys() {
        let mut options = LinkOptions::new();
        assert_eq!(
            options.create_handshake(Role::Initiator, 0).unwrap_err(),
            Error::NoSuchProtocol
        );

        options.add_protocol(&protocol::NOISE_IK_25519_CHACHAPOLY_BLAKE2S).unwrap();
        options.generate_local_keypair(&mut OsRng);
        assert_eq!(
            options.create_handshake(Role::Initiator, 0).unwrap_err(),
            Error::Handshake(tinynoise_handshake::Error::MissingKey)
        );

        // the IK responder needs no remote key, so none is installed
        let responder = options.create_handshake(Role::Responder, 0).unwrap();
        assert!(responder.has_key(KeyId::LocalStatic));
        assert!(!responder.has_key(KeyId::RemoteStatic));
        assert_eq!(responder.state(), State::Initial);

        options.set_remote_public_key(KeyPair::generate(&mut OsRng).public);
        let initiator = options.create_handshake(Role::Initiator, 0).unwrap();
        assert!(initiator.has_key(KeyId::RemoteStatic));
        assert!(!initiator.has_key(KeyId::PresharedKey));
    }

    #[test]
    fn padding_modes() {
        let mut buf = [7u8; 16];
        Padding::None.fill(&mut buf, &mut OsRng);
        assert_eq!(buf, [7u8; 16]);
        Padding::Zero.fill(&mut buf, &mut OsRng);
        assert_eq!(buf, [0u8; 16]);
        Padding::Random.fill(&mut buf, &mut OsRng);
        assert_ne!(buf, [0u8; 16]);
    }
}
