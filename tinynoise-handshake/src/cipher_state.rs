use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::aead::{self, AEAD_KEY_LEN, AEAD_TAG_LEN, CipherKind};
use crate::error::Error;

/// Noise CipherState: an AEAD key and a nonce counter.
///
/// Without a key, encryption and decryption pass data through unchanged.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherState {
    #[zeroize(skip)]
    kind: CipherKind,
    /// The AEAD key, or `None` if uninitialized.
    key: Option<[u8; AEAD_KEY_LEN]>,
    /// Nonce counter, incremented after each successful encryption/decryption.
    nonce: u64,
}

impl CipherState {
    /// Create an empty (uninitialized) CipherState.
    pub fn empty(kind: CipherKind) -> Self {
        Self {
            kind,
            key: None,
            nonce: 0,
        }
    }

    /// Initialize with a key, resetting the nonce counter to zero.
    pub fn initialize_key(&mut self, key: [u8; AEAD_KEY_LEN]) {
        self.key = Some(key);
        self.nonce = 0;
    }

    /// Whether this CipherState has a key set.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn cipher(&self) -> CipherKind {
        self.kind
    }

    /// The nonce that the next encryption or decryption will use.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Set the nonce explicitly, for transports that deliver out of order.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    /// Encrypt plaintext with associated data.
    ///
    /// Returns the number of bytes written.
    pub fn encrypt_with_ad(
        &mut self,
        ad: &[u8],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            if out.len() < plaintext.len() {
                return Err(Error::BufferTooSmall);
            }
            out[..plaintext.len()].copy_from_slice(plaintext);
            return Ok(plaintext.len());
        };
        if self.nonce == u64::MAX {
            // 2^64-1 is reserved for rekey
            return Err(Error::NonceExhausted);
        }
        let needed = plaintext.len() + AEAD_TAG_LEN;
        if out.len() < needed {
            return Err(Error::BufferTooSmall);
        }
        out[..plaintext.len()].copy_from_slice(plaintext);
        let len = aead::encrypt_in_place(self.kind, key, self.nonce, ad, out, plaintext.len())?;
        self.nonce += 1;
        Ok(len)
    }

    /// Decrypt ciphertext with associated data.
    ///
    /// Returns the number of plaintext bytes written. On authentication
    /// failure the plaintext area of `out` is zeroed and the nonce is left
    /// unchanged.
    pub fn decrypt_with_ad(
        &mut self,
        ad: &[u8],
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            if out.len() < ciphertext.len() {
                return Err(Error::BufferTooSmall);
            }
            out[..ciphertext.len()].copy_from_slice(ciphertext);
            return Ok(ciphertext.len());
        };
        if self.nonce == u64::MAX {
            return Err(Error::NonceExhausted);
        }
        if ciphertext.len() < AEAD_TAG_LEN {
            return Err(Error::BadMessage);
        }
        let plaintext_len = ciphertext.len() - AEAD_TAG_LEN;
        if out.len() < plaintext_len {
            return Err(Error::BufferTooSmall);
        }

        let result = if out.len() >= ciphertext.len() {
            out[..ciphertext.len()].copy_from_slice(ciphertext);
            aead::decrypt_in_place(self.kind, key, self.nonce, ad, out, ciphertext.len())
        } else {
            // In-place decryption needs room for the tag as well.
            let mut tmp = Zeroizing::new(ciphertext.to_vec());
            let result =
                aead::decrypt_in_place(self.kind, key, self.nonce, ad, &mut tmp, ciphertext.len());
            if let Ok(len) = result {
                out[..len].copy_from_slice(&tmp[..len]);
            }
            result
        };

        match result {
            Ok(len) => {
                self.nonce += 1;
                Ok(len)
            }
            Err(err) => {
                out[..plaintext_len].zeroize();
                Err(err)
            }
        }
    }

    /// Replace the key with REKEY(key). Does not reset the nonce counter.
    pub fn rekey(&mut self) -> Result<(), Error> {
        if let Some(ref mut key) = self.key {
            let mut new_key = aead::rekey(self.kind, key)?;
            key.copy_from_slice(&new_key);
            new_key.zeroize();
        }
        Ok(())
    }

    /// The overhead added by encryption (0 if no key, AEAD_TAG_LEN otherwise).
    pub fn overhead(&self) -> usize {
        if self.has_key() { AEAD_TAG_LEN } else { 0 }
    }

    /// Forget the key and reset the nonce.
    pub fn clear(&mut self) {
        self.zeroize();
        self.key = None;
    }
}

impl core::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CipherState")
            .field("cipher", &self.kind)
            .field("has_key", &self.has_key())
            .field("nonce", &self.nonce)
            .finish()
    }
}
