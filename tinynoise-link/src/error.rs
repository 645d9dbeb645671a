/// Errors from link configuration and payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The underlying handshake rejected an operation.
    Handshake(tinynoise_handshake::Error),
    /// A payload did not fit its buffer, or an embedded message exceeded
    /// 65535 bytes.
    Encoding,
    /// A payload could not be decoded.
    Malformed,
    /// The options already hold the maximum number of protocols.
    TooManyProtocols,
    /// No protocol is configured at the requested index or name.
    NoSuchProtocol,
}

impl From<tinynoise_handshake::Error> for Error {
    fn from(err: tinynoise_handshake::Error) -> Self {
        Self::Handshake(err)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Handshake(err) => write!(f, "handshake: {err}"),
            Self::Encoding => write!(f, "payload encoding failed"),
            Self::Malformed => write!(f, "malformed payload"),
            Self::TooManyProtocols => write!(f, "too many protocols configured"),
            Self::NoSuchProtocol => write!(f, "no such protocol configured"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Handshake(err) => Some(err),
            _ => None,
        }
    }
}
