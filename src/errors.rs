use crate::http::types::Status;
use thiserror::Error;

/// Reasons a request head is rejected by the parser.
///
/// Every variant recovers locally: the connection answers with a bare status
/// line and shuts down. Only [`LimitExceeded`](ParseError::LimitExceeded)
/// maps to `413`; the remaining variants map to `500`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Structural damage: missing separator, missing CRLF, missing head
    /// terminator, a query pair without `=`.
    #[error("malformed request head")]
    MalformedRequest,

    /// A known-but-unserved method token, or a protocol version other than
    /// `HTTP/1.1`.
    #[error("unsupported method or protocol version")]
    Unsupported,

    /// A method token that is not an HTTP method at all.
    #[error("unrecognized method token")]
    InvalidMethodName,

    /// Request target longer than the configured bound.
    #[error("request target too long")]
    UriTooLong,

    /// A header name or value longer than its bound.
    #[error("header name or value too long")]
    HeaderTooLong,

    /// Too many query pairs or too many header fields.
    #[error("query or header count limit exceeded")]
    LimitExceeded,
}

impl ParseError {
    pub(crate) const fn status(self) -> Status {
        match self {
            Self::LimitExceeded => Status::PayloadTooLarge,
            _ => Status::InternalServerError,
        }
    }
}

/// Failure signalled by a route handler. Logged, answered with `500`, and
/// the connection is terminated.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("page `{0}` is not loaded")]
    MissingPage(String),

    #[error("{0}")]
    Other(String),
}
