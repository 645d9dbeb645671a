use rand_core::CryptoRngCore;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::x25519::{self, DH_LEN, SharedSecret};
use crate::error::Error;

/// An X25519 secret key, used for both static and ephemeral keys.
///
/// Zeroized from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StaticSecret(DalekStaticSecret);

impl StaticSecret {
    /// Create from raw 32-byte secret key material.
    pub fn from_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self(DalekStaticSecret::from(bytes))
    }

    /// Export the raw 32-byte secret key material.
    pub fn to_bytes(&self) -> [u8; DH_LEN] {
        self.0.to_bytes()
    }

    /// Diffie-Hellman with a remote public key.
    pub(crate) fn dh(&self, remote: &PublicKey) -> Result<SharedSecret, Error> {
        x25519::dh(&self.0, remote.as_bytes())
    }
}

impl core::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("StaticSecret([REDACTED])")
    }
}

/// An X25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Zeroize)]
pub struct PublicKey([u8; DH_LEN]);

impl PublicKey {
    /// The length of a public key in bytes.
    pub const LEN: usize = DH_LEN;

    /// Create from raw 32-byte public key.
    pub fn from_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly [`PublicKey::LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; DH_LEN] = bytes.try_into().map_err(|_| Error::BadKey)?;
        Ok(Self(bytes))
    }

    /// Access the raw bytes of this public key.
    pub fn as_bytes(&self) -> &[u8; DH_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PublicKey({:02x?})", &self.0[..4])
    }
}

/// A secret key and its corresponding public key.
#[derive(Clone)]
pub struct KeyPair {
    pub secret: StaticSecret,
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair using the provided RNG.
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        Self::from_secret(StaticSecret(DalekStaticSecret::random_from_rng(rng)))
    }

    /// Create a keypair from an existing secret.
    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey(DalekPublicKey::from(&secret.0).to_bytes());
        Self { secret, public }
    }

    /// Create a keypair from raw 32-byte secret key material.
    ///
    /// Derives the corresponding public key automatically.
    pub fn from_secret_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self::from_secret(StaticSecret::from_bytes(bytes))
    }

    /// Create a keypair from a secret key slice of exactly 32 bytes.
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self, Error> {
        let mut raw: [u8; DH_LEN] = bytes.try_into().map_err(|_| Error::BadKey)?;
        let pair = Self::from_secret_bytes(raw);
        raw.zeroize();
        Ok(pair)
    }

    /// Export the raw 32-byte secret key material.
    pub fn secret_bytes(&self) -> [u8; DH_LEN] {
        self.secret.to_bytes()
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
