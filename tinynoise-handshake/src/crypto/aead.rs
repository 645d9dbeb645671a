use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroize;

use crate::error::Error;

/// AEAD key length in bytes.
pub const AEAD_KEY_LEN: usize = 32;
/// AEAD tag length in bytes.
pub const AEAD_TAG_LEN: usize = 16;
/// AEAD nonce length in bytes.
pub const AEAD_NONCE_LEN: usize = 12;

/// The AEAD construction selected by a protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    /// ChaCha20-Poly1305, little-endian nonce counter.
    ChaChaPoly,
    /// AES-256-GCM, big-endian nonce counter.
    AesGcm,
}

impl CipherKind {
    /// The name of this cipher as it appears in a Noise protocol name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChaChaPoly => "ChaChaPoly",
            Self::AesGcm => "AESGCM",
        }
    }

    /// Look up a cipher by its protocol-name component.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ChaChaPoly" => Some(Self::ChaChaPoly),
            "AESGCM" => Some(Self::AesGcm),
            _ => None,
        }
    }

    /// Build the 12-byte nonce from a u64 counter.
    ///
    /// 4 bytes of zeros followed by the 64-bit counter: little-endian
    /// for ChaChaPoly, big-endian for AESGCM.
    fn make_nonce(self, n: u64) -> [u8; AEAD_NONCE_LEN] {
        let mut nonce = [0u8; AEAD_NONCE_LEN];
        match self {
            Self::ChaChaPoly => nonce[4..].copy_from_slice(&n.to_le_bytes()),
            Self::AesGcm => nonce[4..].copy_from_slice(&n.to_be_bytes()),
        }
        nonce
    }
}

/// Encrypt plaintext in-place, appending the 16-byte AEAD tag.
///
/// `buffer[..plaintext_len]` contains the plaintext.
/// `buffer` must have room for `plaintext_len + AEAD_TAG_LEN` bytes.
/// Returns the total ciphertext length (plaintext_len + tag).
pub fn encrypt_in_place(
    kind: CipherKind,
    key: &[u8; AEAD_KEY_LEN],
    nonce: u64,
    ad: &[u8],
    buffer: &mut [u8],
    plaintext_len: usize,
) -> Result<usize, Error> {
    let total_len = plaintext_len
        .checked_add(AEAD_TAG_LEN)
        .ok_or(Error::BufferTooSmall)?;
    if buffer.len() < total_len {
        return Err(Error::BufferTooSmall);
    }

    let nonce = Nonce::from(kind.make_nonce(nonce));
    let plaintext = &mut buffer[..plaintext_len];
    let tag = match kind {
        CipherKind::ChaChaPoly => {
            ChaCha20Poly1305::new(key.into()).encrypt_in_place_detached(&nonce, ad, plaintext)
        }
        CipherKind::AesGcm => {
            Aes256Gcm::new(key.into()).encrypt_in_place_detached(&nonce, ad, plaintext)
        }
    }
    .map_err(|_| Error::CryptoFailed)?;

    buffer[plaintext_len..total_len].copy_from_slice(&tag);
    Ok(total_len)
}

/// Decrypt ciphertext in-place, verifying the 16-byte AEAD tag.
///
/// `buffer[..ciphertext_len]` contains ciphertext + tag.
/// Returns the plaintext length (ciphertext_len - AEAD_TAG_LEN).
pub fn decrypt_in_place(
    kind: CipherKind,
    key: &[u8; AEAD_KEY_LEN],
    nonce: u64,
    ad: &[u8],
    buffer: &mut [u8],
    ciphertext_len: usize,
) -> Result<usize, Error> {
    if ciphertext_len < AEAD_TAG_LEN || buffer.len() < ciphertext_len {
        return Err(Error::BadMessage);
    }
    let plaintext_len = ciphertext_len - AEAD_TAG_LEN;

    let nonce = Nonce::from(kind.make_nonce(nonce));
    let (ct, tag_bytes) = buffer[..ciphertext_len].split_at_mut(plaintext_len);
    let tag = Tag::from_slice(tag_bytes);

    match kind {
        CipherKind::ChaChaPoly => {
            ChaCha20Poly1305::new(key.into()).decrypt_in_place_detached(&nonce, ad, ct, tag)
        }
        CipherKind::AesGcm => {
            Aes256Gcm::new(key.into()).decrypt_in_place_detached(&nonce, ad, ct, tag)
        }
    }
    .map_err(|_| Error::CryptoFailed)?;

    Ok(plaintext_len)
}

/// REKEY(k) = ENCRYPT(k, maxnonce, "", zeros), truncated to 32 bytes.
///
/// maxnonce = 2^64 - 1 and zeros = 32 zero bytes.
pub fn rekey(kind: CipherKind, key: &[u8; AEAD_KEY_LEN]) -> Result<[u8; AEAD_KEY_LEN], Error> {
    let mut buffer = [0u8; AEAD_KEY_LEN + AEAD_TAG_LEN];
    encrypt_in_place(kind, key, u64::MAX, &[], &mut buffer, AEAD_KEY_LEN)?;
    let mut new_key = [0u8; AEAD_KEY_LEN];
    new_key.copy_from_slice(&buffer[..AEAD_KEY_LEN]);
    buffer.zeroize();
    Ok(new_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [CipherKind; 2] = [CipherKind::ChaChaPoly, CipherKind::AesGcm];

    #[test]
    fn encrypt_decrypt_round_trip() {
        for kind in KINDS {
            let key = [0x42u8; AEAD_KEY_LEN];
            let plaintext = b"hello noise";
            let ad = b"associated data";

            let mut buffer = [0u8; 128];
            buffer[..plaintext.len()].copy_from_slice(plaintext);

            let ct_len = encrypt_in_place(kind, &key, 0, ad, &mut buffer, plaintext.len()).unwrap();
            assert_eq!(ct_len, plaintext.len() + AEAD_TAG_LEN);

            let pt_len = decrypt_in_place(kind, &key, 0, ad, &mut buffer, ct_len).unwrap();
            assert_eq!(&buffer[..pt_len], plaintext);
        }
    }

    #[test]
    fn nonce_byte_order() {
        let n = 0x0102_0304_0506_0708;
        assert_eq!(
            CipherKind::ChaChaPoly.make_nonce(n),
            [0, 0, 0, 0, 8, 7, 6, 5, 4, 3, 2, 1]
        );
        assert_eq!(
            CipherKind::AesGcm.make_nonce(n),
            [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn ciphers_disagree() {
        let key = [0x42u8; AEAD_KEY_LEN];
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        encrypt_in_place(CipherKind::ChaChaPoly, &key, 0, &[], &mut a, 8).unwrap();
        encrypt_in_place(CipherKind::AesGcm, &key, 0, &[], &mut b, 8).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        for kind in KINDS {
            let mut buffer = [0u8; 128];
            buffer[..5].copy_from_slice(b"hello");

            let ct_len = encrypt_in_place(kind, &[0x42; 32], 0, &[], &mut buffer, 5).unwrap();
            let result = decrypt_in_place(kind, &[0x43; 32], 0, &[], &mut buffer, ct_len);
            assert_eq!(result.unwrap_err(), Error::CryptoFailed);
        }
    }

    #[test]
    fn decrypt_wrong_nonce_fails() {
        let key = [0x42u8; AEAD_KEY_LEN];
        let mut buffer = [0u8; 128];
        buffer[..5].copy_from_slice(b"hello");

        let ct_len =
            encrypt_in_place(CipherKind::AesGcm, &key, 0, &[], &mut buffer, 5).unwrap();
        let result = decrypt_in_place(CipherKind::AesGcm, &key, 1, &[], &mut buffer, ct_len);
        assert_eq!(result.unwrap_err(), Error::CryptoFailed);
    }

    #[test]
    fn decrypt_wrong_ad_fails() {
        let key = [0x42u8; AEAD_KEY_LEN];
        let mut buffer = [0u8; 128];
        buffer[..5].copy_from_slice(b"hello");

        let kind = CipherKind::ChaChaPoly;
        let ct_len = encrypt_in_place(kind, &key, 0, b"ad1", &mut buffer, 5).unwrap();
        let result = decrypt_in_place(kind, &key, 0, b"ad2", &mut buffer, ct_len);
        assert_eq!(result.unwrap_err(), Error::CryptoFailed);
    }

    #[test]
    fn encrypt_buffer_too_small() {
        let mut buffer = [0u8; 4]; // too small for plaintext(3) + tag(16)
        let result = encrypt_in_place(CipherKind::ChaChaPoly, &[0x42; 32], 0, &[], &mut buffer, 3);
        assert_eq!(result.unwrap_err(), Error::BufferTooSmall);
    }

    #[test]
    fn decrypt_too_short() {
        let mut buffer = [0u8; 8];
        let result = decrypt_in_place(CipherKind::AesGcm, &[0x42; 32], 0, &[], &mut buffer, 8);
        assert_eq!(result.unwrap_err(), Error::BadMessage);
    }

    #[test]
    fn encrypt_empty_plaintext() {
        for kind in KINDS {
            let key = [0x42u8; AEAD_KEY_LEN];
            let mut buffer = [0u8; AEAD_TAG_LEN];

            let ct_len = encrypt_in_place(kind, &key, 0, &[], &mut buffer, 0).unwrap();
            assert_eq!(ct_len, AEAD_TAG_LEN);
            assert_eq!(decrypt_in_place(kind, &key, 0, &[], &mut buffer, ct_len), Ok(0));
        }
    }

    #[test]
    fn rekey_produces_different_key() {
        for kind in KINDS {
            let key = [0x42u8; AEAD_KEY_LEN];
            assert_ne!(key, rekey(kind, &key).unwrap());
        }
    }

    #[test]
    fn names_round_trip() {
        for kind in KINDS {
            assert_eq!(CipherKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CipherKind::from_name("AESGCM256"), None);
    }
}
