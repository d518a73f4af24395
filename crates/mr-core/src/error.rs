//! Unified error type for mediarelay.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP layer to derive a status code via [`Error::http_status`] and
//! to decide whether a failure should be reported at all.

use std::fmt;

use crate::ids::ObjectRef;

/// The closed family of transport failures caused by a peer going away.
///
/// These are an expected way for a stream to end and are never reported to
/// the client or logged above debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The remote side sent a garbled or truncated status line.
    MalformedStatusLine,
    /// The connection was reset, aborted, or the pipe broke.
    ConnectionReset,
    /// The remote side half-closed the connection mid-message.
    HalfClosed,
}

impl fmt::Display for DisconnectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisconnectKind::MalformedStatusLine => "malformed status line",
            DisconnectKind::ConnectionReset => "connection reset",
            DisconnectKind::HalfClosed => "half-closed connection",
        };
        f.write_str(s)
    }
}

/// Unified error type covering all failure modes in mediarelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The capability hash did not match the object's unique token.
    #[error("Invalid hash for object {0}")]
    InvalidToken(ObjectRef),

    /// The upstream no longer has the object.
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectRef),

    /// The requested byte window lies outside the object.
    #[error("Range not satisfiable (object size {total_size})")]
    RangeNotSatisfiable {
        /// Size of the object the range was checked against.
        total_size: u64,
    },

    /// A peer went away mid-exchange.
    #[error("Peer disconnected: {0}")]
    PeerDisconnect(DisconnectKind),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The configuration is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// An upstream client call failed in an unexpected way.
    #[error("Upstream error [{client}]: {message}")]
    Upstream {
        /// Name of the upstream client that failed.
        client: String,
        /// Human-readable error description.
        message: String,
    },

    /// A catalog database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    ///
    /// Peer disconnects map to 204: the reply carries no body and is usually
    /// never read by anyone.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidToken(_) => 403,
            Error::ObjectNotFound(_) => 404,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::PeerDisconnect(_) => 204,
            Error::Validation(_) => 400,
            Error::Config(_) => 500,
            Error::Upstream { .. } => 500,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error is one of the expected disconnect classes.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::PeerDisconnect(_))
    }

    /// Convenience constructor for [`Error::Upstream`].
    pub fn upstream(client: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Upstream {
            client: client.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
