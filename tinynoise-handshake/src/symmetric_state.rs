use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher_state::CipherState;
use crate::crypto::aead::{AEAD_KEY_LEN, CipherKind};
use crate::crypto::hash::{self, HASH_LEN, HashKind, Hasher};
use crate::error::Error;

/// Noise SymmetricState: the chaining key, the handshake hash and the
/// handshake-phase cipher.
///
/// The prologue is hashed lazily. After `initialize` the state sits in a
/// prologue phase in which [`mix_prologue`](Self::mix_prologue) feeds a
/// running hash seeded with `h`; the first operation that touches `h`,
/// `ck` or the cipher closes that phase and fixes
/// `h = HASH(h || prologue)`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricState {
    #[zeroize(skip)]
    hash: HashKind,
    cipher: CipherState,
    /// Chaining key (ck), mixed with DH outputs via HKDF.
    ck: [u8; HASH_LEN],
    /// Handshake hash (h), accumulates all handshake data.
    h: [u8; HASH_LEN],
    #[zeroize(skip)]
    prologue: Option<Hasher>,
}

impl SymmetricState {
    /// Initialize from a protocol name.
    ///
    /// A name of at most `HASH_LEN` bytes is zero-padded into `h`; a longer
    /// name is hashed.
    pub fn initialize(protocol_name: &str, cipher: CipherKind, hash_kind: HashKind) -> Self {
        let name_bytes = protocol_name.as_bytes();
        let h = if name_bytes.len() <= HASH_LEN {
            let mut h = [0u8; HASH_LEN];
            h[..name_bytes.len()].copy_from_slice(name_bytes);
            h
        } else {
            hash::hash(hash_kind, name_bytes)
        };

        let mut prologue = Hasher::new(hash_kind);
        prologue.update(&h);

        Self {
            hash: hash_kind,
            cipher: CipherState::empty(cipher),
            ck: h,
            h,
            prologue: Some(prologue),
        }
    }

    /// Append prologue bytes. Only valid before any other operation.
    pub fn mix_prologue(&mut self, data: &[u8]) -> Result<(), Error> {
        match &mut self.prologue {
            Some(hasher) => {
                hasher.update(data);
                Ok(())
            }
            None => Err(Error::WrongState),
        }
    }

    pub fn in_prologue(&self) -> bool {
        self.prologue.is_some()
    }

    fn end_prologue(&mut self) {
        if let Some(hasher) = self.prologue.take() {
            self.h = hasher.finalize();
        }
    }

    fn set_key(&mut self, temp_k: &[u8; HASH_LEN]) {
        let mut key = [0u8; AEAD_KEY_LEN];
        key.copy_from_slice(&temp_k[..AEAD_KEY_LEN]);
        self.cipher.initialize_key(key);
        key.zeroize();
    }

    /// `(ck, temp_k) = HKDF(ck, input_key_material, 2)`, then
    /// `InitializeKey(temp_k)`.
    pub fn mix_key(&mut self, input_key_material: &[u8]) {
        self.end_prologue();
        let (new_ck, temp_k) = hash::hkdf2(self.hash, &self.ck, input_key_material);
        self.ck = *new_ck;
        self.set_key(&temp_k);
    }

    /// `h = HASH(h || data)`
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.end_prologue();
        self.h = hash::hash_two(self.hash, &self.h, data);
    }

    /// `(ck, temp_h, temp_k) = HKDF(ck, input_key_material, 3)`, then
    /// `MixHash(temp_h)` and `InitializeKey(temp_k)`. Used for PSKs.
    pub fn mix_key_and_hash(&mut self, input_key_material: &[u8]) {
        self.end_prologue();
        let (new_ck, temp_h, temp_k) = hash::hkdf3(self.hash, &self.ck, input_key_material);
        self.ck = *new_ck;
        self.mix_hash(temp_h.as_slice());
        self.set_key(&temp_k);
    }

    /// `ciphertext = EncryptWithAd(h, plaintext)`, then `MixHash(ciphertext)`.
    ///
    /// Before the first `mix_key` the plaintext is copied through unchanged
    /// but still hashed.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.end_prologue();
        let len = self.cipher.encrypt_with_ad(&self.h, plaintext, out)?;
        self.mix_hash(&out[..len]);
        Ok(len)
    }

    /// `plaintext = DecryptWithAd(h, ciphertext)`, then `MixHash(ciphertext)`.
    ///
    /// The current hash is used as AD *before* mixing in the ciphertext. On
    /// failure `h` is left as it was and the output is zeroed.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.end_prologue();
        let len = self.cipher.decrypt_with_ad(&self.h, ciphertext, out)?;
        self.mix_hash(ciphertext);
        Ok(len)
    }

    /// Derive the two transport ciphers and consume the state.
    ///
    /// `(temp_k1, temp_k2) = HKDF(ck, "", 2)`. Returns the final handshake
    /// hash alongside `(c1, c2)`.
    pub fn split(mut self) -> ([u8; HASH_LEN], CipherState, CipherState) {
        self.end_prologue();
        let (temp_k1, temp_k2) = hash::hkdf2(self.hash, &self.ck, &[]);
        let kind = self.cipher.cipher();

        let mut c1 = CipherState::empty(kind);
        let mut key = [0u8; AEAD_KEY_LEN];
        key.copy_from_slice(&temp_k1[..AEAD_KEY_LEN]);
        c1.initialize_key(key);

        let mut c2 = CipherState::empty(kind);
        key.copy_from_slice(&temp_k2[..AEAD_KEY_LEN]);
        c2.initialize_key(key);
        key.zeroize();

        (self.h, c1, c2)
    }

    /// The current handshake hash.
    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.h
    }

    pub fn has_key(&self) -> bool {
        self.cipher.has_key()
    }

    /// The current encryption overhead.
    pub fn overhead(&self) -> usize {
        self.cipher.overhead()
    }

    /// Scrub all secrets. The state is unusable afterwards.
    pub fn clear(&mut self) {
        self.zeroize();
        self.prologue = None;
    }
}
