use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};

/// Errors that can occur during RPC operations.
///
/// The variants fall into three families that callers must keep apart:
///
/// - **transport**: [`Transport`](Self::Transport),
///   [`NoResponders`](Self::NoResponders), [`Timeout`](Self::Timeout),
///   [`Cancelled`](Self::Cancelled) and [`Remote`](Self::Remote)
/// - **codec**: [`Decode`](Self::Decode) and [`Encode`](Self::Encode)
/// - **usage / configuration**: the rest
///
/// An application-level failure is *not* an `RpcError`. It travels as an
/// ordinary `result` value inside a successful call.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Publish, subscribe or connection failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request was published to a subject nobody is subscribed to.
    #[error("no responders on subject: {0}")]
    NoResponders(String),

    /// No reply arrived before the call deadline.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the call before a reply arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The server answered with a protocol-error reply instead of results.
    #[error("remote error: {0}")]
    Remote(String),

    /// Bytes did not parse as the expected kind.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A value did not conform to its declared kind.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// `serve()` called on a server that is already serving.
    #[error("server is already serving")]
    AlreadyServing,

    /// Two exports passed to one `serve()` map to the same request subject.
    #[error("duplicate export for subject: {0}")]
    DuplicateExport(String),

    /// Required configuration value was not provided.
    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    /// JSON framing of an envelope failed (broker transports only).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RpcError {
    /// True for failures of the message path rather than of the payload.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_)
                | RpcError::NoResponders(_)
                | RpcError::Timeout
                | RpcError::Cancelled
                | RpcError::Remote(_)
        )
    }

    /// True when reply bytes failed to parse as the declared kind.
    pub fn is_decode(&self) -> bool {
        matches!(self, RpcError::Decode(_))
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
