use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// DH output and public key length in bytes (X25519 = 32).
pub const DH_LEN: usize = 32;

/// Name of the DH function in a Noise protocol name.
pub const DH_NAME: &str = "25519";

/// A shared secret resulting from a Diffie-Hellman operation.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; DH_LEN]);

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; DH_LEN] {
        &self.0
    }
}

/// X25519 between a local secret and raw remote public key bytes.
///
/// Returns `Error::BadKey` if the result is the all-zeros value, which a
/// low-order remote point produces (RFC 7748 Section 6.1).
pub fn dh(local: &DalekStaticSecret, remote: &[u8; DH_LEN]) -> Result<SharedSecret, Error> {
    let shared = local.diffie_hellman(&DalekPublicKey::from(*remote));
    if bool::from(shared.as_bytes().ct_eq(&[0u8; DH_LEN])) {
        Err(Error::BadKey)
    } else {
        Ok(SharedSecret(*shared.as_bytes()))
    }
}
