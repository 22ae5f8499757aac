//! Shared error type across logstash exporter crates.

use thiserror::Error;

/// Stable error classes, used as structured log fields and in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broker unreachable or the socket broke.
    Connection,
    /// Broker rejected the credential.
    Auth,
    /// Broker reply could not be framed or had an unexpected shape.
    Protocol,
    /// Queue payload is not a JSON object.
    Decode,
    /// A consumed payload field has the wrong JSON type.
    FieldType,
    /// Invalid startup configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "CONNECTION",
            ErrorKind::Auth => "AUTH",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Decode => "DECODE",
            ErrorKind::FieldType => "FIELD_TYPE",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("connection: {0}")]
    Connection(String),
    #[error("auth failed: {0}")]
    Auth(String),
    /// `desync` is set when the byte stream can no longer be trusted.
    #[error("protocol: {msg}")]
    Protocol { msg: String, desync: bool },
    #[error("decode: {0}")]
    Decode(String),
    #[error("field `{field}` must be a string")]
    FieldType { field: &'static str },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ExporterError {
    /// Framing failure: the connection is out of sync with the broker.
    pub fn framing(msg: impl Into<String>) -> Self {
        ExporterError::Protocol { msg: msg.into(), desync: true }
    }

    /// Well-framed reply with unexpected content (e.g. a `-ERR` reply).
    pub fn reply(msg: impl Into<String>) -> Self {
        ExporterError::Protocol { msg: msg.into(), desync: false }
    }

    /// Map to a stable error class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExporterError::Connection(_) => ErrorKind::Connection,
            ExporterError::Auth(_) => ErrorKind::Auth,
            ExporterError::Protocol { .. } => ErrorKind::Protocol,
            ExporterError::Decode(_) => ErrorKind::Decode,
            ExporterError::FieldType { .. } => ErrorKind::FieldType,
            ExporterError::Config(_) => ErrorKind::Config,
            ExporterError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the queue connection that produced this error must be rebuilt.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            ExporterError::Connection(_) | ExporterError::Auth(_) => true,
            ExporterError::Protocol { desync, .. } => *desync,
            _ => false,
        }
    }
}

impl From<std::io::Error> for ExporterError {
    fn from(e: std::io::Error) -> Self {
        ExporterError::Connection(e.to_string())
    }
}
