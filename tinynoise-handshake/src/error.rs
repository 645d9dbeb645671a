/// Errors that can occur during the Noise handshake or transport phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A cryptographic operation failed (e.g., AEAD decryption).
    CryptoFailed,
    /// A key is invalid (low-order point, wrong length, etc.).
    BadKey,
    /// The provided output buffer is too small.
    BufferTooSmall,
    /// An operation was attempted in the wrong handshake state.
    WrongState,
    /// The handshake message is malformed or truncated.
    BadMessage,
    /// The nonce counter has been exhausted (2^64 - 1 messages).
    NonceExhausted,
    /// A key required by the protocol for this role has not been set.
    MissingKey,
    /// The protocol name or one of its components is not supported.
    UnknownProtocol,
    /// The handshake already failed; it cannot be used any more.
    HandshakeFailed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CryptoFailed => write!(f, "cryptographic operation failed"),
            Self::BadKey => write!(f, "invalid key"),
            Self::BufferTooSmall => write!(f, "output buffer too small"),
            Self::WrongState => write!(f, "operation not valid in current state"),
            Self::BadMessage => write!(f, "malformed handshake message"),
            Self::NonceExhausted => write!(f, "nonce counter exhausted"),
            Self::MissingKey => write!(f, "required key not set"),
            Self::UnknownProtocol => write!(f, "unknown protocol"),
            Self::HandshakeFailed => write!(f, "handshake has failed"),
        }
    }
}

impl core::error::Error for Error {}
