//! Static protocol descriptors and the Noise Pipes composite.
//!
//! Every supported protocol is a `static` [`ProtocolDescriptor`]; they are
//! read-only and shared by all handshakes.

use core::ops::BitOr;

use tracing::debug;

use crate::error::Error;
use crate::handshake::{HandshakeState, Ik, KeyId, NNpsk0, Pattern, Role, State, Xx, XxFallback};
use crate::suite::{CipherSuite, ProtocolName};

/// Keys a role must hold before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequiredKeys(u8);

impl RequiredKeys {
    pub const NONE: Self = Self(0);
    pub const LOCAL_STATIC: Self = Self(0x01);
    pub const REMOTE_STATIC: Self = Self(0x02);
    pub const PSK: Self = Self(0x04);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RequiredKeys {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Metadata for one named protocol, plus the factory for its handshakes.
pub struct ProtocolDescriptor {
    name: &'static str,
    alias: Option<&'static str>,
    initiator_keys: RequiredKeys,
    responder_keys: RequiredKeys,
    pattern: &'static dyn Pattern,
    suite: CipherSuite,
}

impl core::fmt::Debug for ProtocolDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProtocolDescriptor")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ProtocolDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ProtocolDescriptor {}

impl ProtocolDescriptor {
    const fn new(
        name: &'static str,
        pattern: &'static dyn Pattern,
        suite: CipherSuite,
        initiator_keys: RequiredKeys,
        responder_keys: RequiredKeys,
    ) -> Self {
        Self {
            name,
            alias: None,
            initiator_keys,
            responder_keys,
            pattern,
            suite,
        }
    }

    const fn with_alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// The full protocol name, e.g. `Noise_XX_25519_ChaChaPoly_BLAKE2s`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short alias for negotiation, if the protocol has one.
    pub fn alias(&self) -> Option<&'static str> {
        self.alias
    }

    pub fn pattern(&self) -> &'static dyn Pattern {
        self.pattern
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn protocol_name(&self) -> ProtocolName {
        ProtocolName {
            pattern: self.pattern,
            suite: self.suite,
        }
    }

    pub fn required_keys(&self, role: Role) -> RequiredKeys {
        match role {
            Role::Initiator => self.initiator_keys,
            Role::Responder => self.responder_keys,
        }
    }

    /// A fresh handshake for this protocol, in [`State::Initial`].
    pub fn create_handshake(&'static self) -> HandshakeState {
        HandshakeState::new(self)
    }
}

const LOCAL: RequiredKeys = RequiredKeys::LOCAL_STATIC;
const LOCAL_REMOTE: RequiredKeys = LOCAL.union(RequiredKeys::REMOTE_STATIC);
const PSK: RequiredKeys = RequiredKeys::PSK;

pub static NOISE_XX_25519_CHACHAPOLY_BLAKE2S: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XX_25519_ChaChaPoly_BLAKE2s",
    &Xx,
    CipherSuite::CHACHAPOLY_BLAKE2S,
    LOCAL,
    LOCAL,
)
.with_alias("3");

pub static NOISE_XX_25519_CHACHAPOLY_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XX_25519_ChaChaPoly_SHA256",
    &Xx,
    CipherSuite::CHACHAPOLY_SHA256,
    LOCAL,
    LOCAL,
)
.with_alias("2");

pub static NOISE_XX_25519_AESGCM_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XX_25519_AESGCM_SHA256",
    &Xx,
    CipherSuite::AESGCM_SHA256,
    LOCAL,
    LOCAL,
);

pub static NOISE_IK_25519_CHACHAPOLY_BLAKE2S: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_IK_25519_ChaChaPoly_BLAKE2s",
    &Ik,
    CipherSuite::CHACHAPOLY_BLAKE2S,
    LOCAL_REMOTE,
    LOCAL,
);

pub static NOISE_IK_25519_CHACHAPOLY_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_IK_25519_ChaChaPoly_SHA256",
    &Ik,
    CipherSuite::CHACHAPOLY_SHA256,
    LOCAL_REMOTE,
    LOCAL,
);

pub static NOISE_IK_25519_AESGCM_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_IK_25519_AESGCM_SHA256",
    &Ik,
    CipherSuite::AESGCM_SHA256,
    LOCAL_REMOTE,
    LOCAL,
);

pub static NOISE_NNPSK0_25519_CHACHAPOLY_BLAKE2S: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_NNpsk0_25519_ChaChaPoly_BLAKE2s",
    &NNpsk0,
    CipherSuite::CHACHAPOLY_BLAKE2S,
    PSK,
    PSK,
);

pub static NOISE_NNPSK0_25519_CHACHAPOLY_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_NNpsk0_25519_ChaChaPoly_SHA256",
    &NNpsk0,
    CipherSuite::CHACHAPOLY_SHA256,
    PSK,
    PSK,
);

pub static NOISE_NNPSK0_25519_AESGCM_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_NNpsk0_25519_AESGCM_SHA256",
    &NNpsk0,
    CipherSuite::AESGCM_SHA256,
    PSK,
    PSK,
);

pub static NOISE_XXFALLBACK_25519_CHACHAPOLY_BLAKE2S: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XXfallback_25519_ChaChaPoly_BLAKE2s",
    &XxFallback,
    CipherSuite::CHACHAPOLY_BLAKE2S,
    LOCAL,
    LOCAL,
);

pub static NOISE_XXFALLBACK_25519_CHACHAPOLY_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XXfallback_25519_ChaChaPoly_SHA256",
    &XxFallback,
    CipherSuite::CHACHAPOLY_SHA256,
    LOCAL,
    LOCAL,
);

pub static NOISE_XXFALLBACK_25519_AESGCM_SHA256: ProtocolDescriptor = ProtocolDescriptor::new(
    "Noise_XXfallback_25519_AESGCM_SHA256",
    &XxFallback,
    CipherSuite::AESGCM_SHA256,
    LOCAL,
    LOCAL,
);

/// Every registered protocol.
pub static PROTOCOLS: [&ProtocolDescriptor; 12] = [
    &NOISE_XX_25519_CHACHAPOLY_BLAKE2S,
    &NOISE_XX_25519_CHACHAPOLY_SHA256,
    &NOISE_XX_25519_AESGCM_SHA256,
    &NOISE_IK_25519_CHACHAPOLY_BLAKE2S,
    &NOISE_IK_25519_CHACHAPOLY_SHA256,
    &NOISE_IK_25519_AESGCM_SHA256,
    &NOISE_NNPSK0_25519_CHACHAPOLY_BLAKE2S,
    &NOISE_NNPSK0_25519_CHACHAPOLY_SHA256,
    &NOISE_NNPSK0_25519_AESGCM_SHA256,
    &NOISE_XXFALLBACK_25519_CHACHAPOLY_BLAKE2S,
    &NOISE_XXFALLBACK_25519_CHACHAPOLY_SHA256,
    &NOISE_XXFALLBACK_25519_AESGCM_SHA256,
];

/// Look up a protocol by its full name.
pub fn find(name: &str) -> Result<&'static ProtocolDescriptor, Error> {
    let parsed: ProtocolName = name.parse()?;
    PROTOCOLS
        .iter()
        .copied()
        .find(|p| p.protocol_name() == parsed)
        .ok_or(Error::UnknownProtocol)
}

/// Look up a protocol by its short alias.
pub fn find_by_alias(alias: &str) -> Option<&'static ProtocolDescriptor> {
    PROTOCOLS
        .iter()
        .copied()
        .find(|p| p.alias == Some(alias))
}

/// Noise Pipes: try IK first, and fall back to XXfallback if the
/// initiator's idea of the responder's static key turns out to be wrong.
#[derive(Debug)]
pub struct NoisePipes {
    name: &'static str,
    abbreviated: &'static ProtocolDescriptor,
    fallback: &'static ProtocolDescriptor,
}

pub static NOISE_PIPES_25519_CHACHAPOLY_BLAKE2S: NoisePipes = NoisePipes {
    name: "NoisePipes_25519_ChaChaPoly_BLAKE2s",
    abbreviated: &NOISE_IK_25519_CHACHAPOLY_BLAKE2S,
    fallback: &NOISE_XXFALLBACK_25519_CHACHAPOLY_BLAKE2S,
};

pub static NOISE_PIPES_25519_CHACHAPOLY_SHA256: NoisePipes = NoisePipes {
    name: "NoisePipes_25519_ChaChaPoly_SHA256",
    abbreviated: &NOISE_IK_25519_CHACHAPOLY_SHA256,
    fallback: &NOISE_XXFALLBACK_25519_CHACHAPOLY_SHA256,
};

pub static NOISE_PIPES_25519_AESGCM_SHA256: NoisePipes = NoisePipes {
    name: "NoisePipes_25519_AESGCM_SHA256",
    abbreviated: &NOISE_IK_25519_AESGCM_SHA256,
    fallback: &NOISE_XXFALLBACK_25519_AESGCM_SHA256,
};

impl NoisePipes {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The IK protocol tried first.
    pub fn abbreviated_descriptor(&self) -> &'static ProtocolDescriptor {
        self.abbreviated
    }

    /// The XXfallback protocol used when IK fails.
    pub fn fallback_descriptor(&self) -> &'static ProtocolDescriptor {
        self.fallback
    }

    /// A fresh IK handshake.
    pub fn create_handshake(&self) -> HandshakeState {
        self.abbreviated.create_handshake()
    }

    /// Whether `failed` is an IK attempt of this composite that can seed a
    /// fallback.
    ///
    /// True when it failed authenticating (or was abandoned) and still holds
    /// the ephemeral key its role carries into XXfallback.
    pub fn can_fall_back(&self, failed: &HandshakeState) -> bool {
        if failed.protocol() != self.abbreviated || failed.state() != State::Failed {
            return false;
        }
        if !matches!(
            failed.failure(),
            Some(Error::CryptoFailed | Error::HandshakeFailed)
        ) {
            return false;
        }
        match failed.role() {
            Some(Role::Initiator) => failed.has_key(KeyId::LocalEphemeral),
            Some(Role::Responder) => failed.has_key(KeyId::RemoteEphemeral),
            None => false,
        }
    }

    /// Start the XXfallback handshake from a failed IK attempt.
    ///
    /// `role` is normally the role the party had in the IK attempt.
    pub fn start_fallback(
        &self,
        failed: &HandshakeState,
        role: Role,
        prologue: &[u8],
    ) -> Result<HandshakeState, Error> {
        if !self.can_fall_back(failed) {
            return Err(Error::WrongState);
        }
        debug!(pipes = self.name, ?role, "starting fallback handshake");
        let mut handshake = self.fallback.create_handshake();
        handshake.start_fallback(failed, role, prologue)?;
        Ok(handshake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_components() {
        for protocol in PROTOCOLS {
            assert_eq!(protocol.protocol_name().to_string(), protocol.name());
        }
    }

    #[test]
    fn find_by_name_and_alias() {
        let xx = find("Noise_XX_25519_ChaChaPoly_BLAKE2s").unwrap();
        assert!(core::ptr::eq(xx, &NOISE_XX_25519_CHACHAPOLY_BLAKE2S));
        assert_eq!(find_by_alias("2").map(|p| p.name()), Some("Noise_XX_25519_ChaChaPoly_SHA256"));
        assert!(find_by_alias("9").is_none());
        assert_eq!(find("Noise_XX_25519_AESGCM_BLAKE2s").unwrap_err(), Error::UnknownProtocol);
        assert_eq!(find("garbage").unwrap_err(), Error::UnknownProtocol);
    }

    #[test]
    fn required_key_flags() {
        let ik = &NOISE_IK_25519_AESGCM_SHA256;
        assert_eq!(ik.required_keys(Role::Initiator).bits(), 0x03);
        assert_eq!(ik.required_keys(Role::Responder).bits(), 0x01);
        let nn = &NOISE_NNPSK0_25519_AESGCM_SHA256;
        assert!(nn.required_keys(Role::Initiator).contains(RequiredKeys::PSK));
        assert!(!nn.required_keys(Role::Responder).contains(RequiredKeys::LOCAL_STATIC));
        assert_eq!(
            RequiredKeys::LOCAL_STATIC | RequiredKeys::PSK,
            RequiredKeys(0x05)
        );
    }

    #[test]
    fn pipes_pair_matching_suites() {
        for pipes in [
            &NOISE_PIPES_25519_CHACHAPOLY_BLAKE2S,
            &NOISE_PIPES_25519_CHACHAPOLY_SHA256,
            &NOISE_PIPES_25519_AESGCM_SHA256,
        ] {
            assert_eq!(pipes.abbreviated_descriptor().pattern().name(), "IK");
            assert!(pipes.fallback_descriptor().pattern().is_fallback());
            assert_eq!(
                pipes.abbreviated_descriptor().suite(),
                pipes.fallback_descriptor().suite()
            );
        }
    }

    #[test]
    fn fresh_handshake_cannot_fall_back() {
        let pipes = &NOISE_PIPES_25519_AESGCM_SHA256;
        let hs = pipes.create_handshake();
        assert!(!pipes.can_fall_back(&hs));
        assert_eq!(
            pipes.start_fallback(&hs, Role::Initiator, b"").unwrap_err(),
            Error::WrongState
        );
    }
}
