use rand_core::CryptoRngCore;
use zeroize::Zeroize;

use crate::crypto::x25519::{DH_LEN, SharedSecret};
use crate::error::Error;
use crate::handshake::Role;
use crate::keys::{KeyPair, PublicKey};

/// Curve25519 key slots for one handshake.
///
/// Every slot starts empty. Secrets are scrubbed when a slot is
/// overwritten, removed or the state is dropped.
#[derive(Default)]
pub struct DhState {
    local_static: Option<KeyPair>,
    local_ephemeral: Option<KeyPair>,
    remote_static: Option<PublicKey>,
    remote_ephemeral: Option<PublicKey>,
}

impl DhState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of a public key on the wire.
    pub const fn public_key_len(&self) -> usize {
        DH_LEN
    }

    pub fn set_local_static(&mut self, pair: KeyPair) {
        self.local_static = Some(pair);
    }

    pub fn set_local_ephemeral(&mut self, pair: KeyPair) {
        self.local_ephemeral = Some(pair);
    }

    pub fn set_remote_static(&mut self, key: PublicKey) {
        self.remote_static = Some(key);
    }

    pub fn set_remote_ephemeral(&mut self, key: PublicKey) {
        self.remote_ephemeral = Some(key);
    }

    pub fn local_static(&self) -> Option<&KeyPair> {
        self.local_static.as_ref()
    }

    pub fn local_ephemeral(&self) -> Option<&KeyPair> {
        self.local_ephemeral.as_ref()
    }

    pub fn remote_static(&self) -> Option<&PublicKey> {
        self.remote_static.as_ref()
    }

    pub fn remote_ephemeral(&self) -> Option<&PublicKey> {
        self.remote_ephemeral.as_ref()
    }

    pub fn remove_local_static(&mut self) {
        self.local_static = None;
    }

    pub fn remove_remote_static(&mut self) {
        if let Some(key) = self.remote_static.as_mut() {
            key.zeroize();
        }
        self.remote_static = None;
    }

    /// Drop both ephemeral keys.
    pub fn remove_ephemerals(&mut self) {
        self.local_ephemeral = None;
        if let Some(key) = self.remote_ephemeral.as_mut() {
            key.zeroize();
        }
        self.remote_ephemeral = None;
    }

    /// Generate the local ephemeral keypair unless one is already present,
    /// and return its public half.
    ///
    /// A pre-set ephemeral is kept so that fixed test vectors and fallback
    /// handshakes reuse it.
    pub fn generate_local_ephemeral(&mut self, rng: &mut impl CryptoRngCore) -> PublicKey {
        self.local_ephemeral
            .get_or_insert_with(|| KeyPair::generate(rng))
            .public
    }

    fn dh(local: Option<&KeyPair>, remote: Option<&PublicKey>) -> Result<SharedSecret, Error> {
        let local = local.ok_or(Error::MissingKey)?;
        let remote = remote.ok_or(Error::MissingKey)?;
        local.secret.dh(remote)
    }

    /// DH(e, re)
    pub fn ee(&self) -> Result<SharedSecret, Error> {
        Self::dh(self.local_ephemeral(), self.remote_ephemeral())
    }

    /// DH(s, rs)
    pub fn ss(&self) -> Result<SharedSecret, Error> {
        Self::dh(self.local_static(), self.remote_static())
    }

    /// Initiator: DH(e, rs). Responder: DH(s, re).
    pub fn es(&self, role: Role) -> Result<SharedSecret, Error> {
        match role {
            Role::Initiator => Self::dh(self.local_ephemeral(), self.remote_static()),
            Role::Responder => Self::dh(self.local_static(), self.remote_ephemeral()),
        }
    }

    /// Initiator: DH(s, re). Responder: DH(e, rs).
    pub fn se(&self, role: Role) -> Result<SharedSecret, Error> {
        match role {
            Role::Initiator => Self::dh(self.local_static(), self.remote_ephemeral()),
            Role::Responder => Self::dh(self.local_ephemeral(), self.remote_static()),
        }
    }

    /// Carry ephemeral material over from an abandoned handshake.
    ///
    /// The party that becomes the fallback initiator reuses its own
    /// ephemeral keypair; the fallback responder reuses the peer ephemeral
    /// it already received. A local static is copied across if this state
    /// does not have one yet.
    pub fn fallback(&mut self, role: Role, other: &DhState) -> Result<(), Error> {
        match role {
            Role::Initiator => {
                let ephemeral = other.local_ephemeral.as_ref().ok_or(Error::MissingKey)?;
                self.local_ephemeral = Some(ephemeral.clone());
            }
            Role::Responder => {
                let ephemeral = other.remote_ephemeral.ok_or(Error::MissingKey)?;
                self.remote_ephemeral = Some(ephemeral);
            }
        }
        if self.local_static.is_none() {
            self.local_static = other.local_static.clone();
        }
        Ok(())
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.local_static = None;
        self.remove_remote_static();
        self.remove_ephemerals();
    }
}

impl Drop for DhState {
    fn drop(&mut self) {
        self.clear();
    }
}
