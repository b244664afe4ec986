use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced while connecting to or speaking with `ClickHouse`.
///
/// Nothing is retried internally. After a [`Error::Server`] or
/// [`Error::Protocol`] mid-stream the connection is in an undefined state and
/// must not be reused; [`Error::Timeout`] is the one kind a pooling layer can
/// treat as retriable with a fresh connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket setup, resolution, or handshake failure.
    #[error("connect error: {0}")]
    Connect(String),
    /// Malformed or unexpected frame from the server.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// An exception decoded off the wire.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// A socket read or flush exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// Unsupported column type or a value that cannot be packed for one.
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("utf8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A server-side exception, with the exception name already stripped from the
/// message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("server exception (code {code}): {message}")]
pub struct ServerError {
    pub code:    i32,
    pub message: String,
}
