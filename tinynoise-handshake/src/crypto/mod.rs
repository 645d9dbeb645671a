//! Cryptographic primitives for the Noise handshake.
//!
//! - [`aead`]: ChaChaPoly and AESGCM authenticated encryption
//! - [`hash`]: BLAKE2s / SHA-256 hashing, HMAC, and HKDF
//! - [`x25519`]: X25519 Diffie-Hellman with low-order point rejection

pub mod aead;
pub mod hash;
pub mod x25519;
