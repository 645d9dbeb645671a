use core::fmt;
use core::str::FromStr;

use crate::crypto::aead::CipherKind;
use crate::crypto::hash::HashKind;
use crate::crypto::x25519::DH_NAME;
use crate::error::Error;
use crate::handshake::{Pattern, pattern_by_name};

/// The cipher and hash of a protocol. DH is always Curve25519.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite {
    pub cipher: CipherKind,
    pub hash: HashKind,
}

impl CipherSuite {
    pub const CHACHAPOLY_BLAKE2S: Self = Self::new(CipherKind::ChaChaPoly, HashKind::Blake2s);
    pub const CHACHAPOLY_SHA256: Self = Self::new(CipherKind::ChaChaPoly, HashKind::Sha256);
    pub const AESGCM_SHA256: Self = Self::new(CipherKind::AesGcm, HashKind::Sha256);

    pub const fn new(cipher: CipherKind, hash: HashKind) -> Self {
        Self { cipher, hash }
    }
}

/// A parsed `Noise_<Pattern>_<DH>_<Cipher>_<Hash>` protocol name.
#[derive(Clone, Copy)]
pub struct ProtocolName {
    pub pattern: &'static dyn Pattern,
    pub suite: CipherSuite,
}

impl PartialEq for ProtocolName {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.name() == other.pattern.name() && self.suite == other.suite
    }
}

impl Eq for ProtocolName {}

impl fmt::Debug for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolName({self})")
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Noise_{}_{}_{}_{}",
            self.pattern.name(),
            DH_NAME,
            self.suite.cipher.name(),
            self.suite.hash.name()
        )
    }
}

impl FromStr for ProtocolName {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        let mut parts = name.split('_');
        let mut next = || parts.next().ok_or(Error::UnknownProtocol);

        if next()? != "Noise" {
            return Err(Error::UnknownProtocol);
        }
        let pattern = pattern_by_name(next()?).ok_or(Error::UnknownProtocol)?;
        if next()? != DH_NAME {
            return Err(Error::UnknownProtocol);
        }
        let cipher = CipherKind::from_name(next()?).ok_or(Error::UnknownProtocol)?;
        let hash = HashKind::from_name(next()?).ok_or(Error::UnknownProtocol)?;
        if next().is_ok() {
            return Err(Error::UnknownProtocol);
        }

        Ok(Self {
            pattern,
            suite: CipherSuite::new(cipher, hash),
        })
    }
}
