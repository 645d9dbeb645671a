use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// Pre-shared key length in bytes.
pub const PSK_LEN: usize = 32;

/// A 32-byte pre-shared symmetric key.
///
/// Zeroized from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PresharedKey([u8; PSK_LEN]);

impl PresharedKey {
    pub fn from_bytes(bytes: [u8; PSK_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly [`PSK_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PSK_LEN {
            return Err(Error::BadKey);
        }
        let mut psk = Self([0u8; PSK_LEN]);
        psk.0.copy_from_slice(bytes);
        Ok(psk)
    }

    pub fn as_bytes(&self) -> &[u8; PSK_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PresharedKey([REDACTED])")
    }
}
