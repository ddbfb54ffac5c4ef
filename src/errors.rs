//! Error handling for the gateway

use std::io;

use thiserror::Error;

/// A Result for internal operations.
pub type Result<T> = ::std::result::Result<T, Error>;

/// All errors which might arise within the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// The FastCGI exchange could not be completed.
    #[error("FastCGI transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The responder's output couldn't be decoded into a response.
    #[error("malformed response from responder: {0}")]
    MalformedResponse(String),

    #[error("could not read uploaded file {filename:?}: {source}")]
    Upload {
        filename: String,
        #[source]
        source: io::Error,
    },

    #[error("could not serialize request attributes: {0}")]
    AttributeEncoding(#[from] serde_json::Error),

    #[error("invalid request uri: {0}")]
    Uri(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unparseable HTTP request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request head too large")]
    RequestTooLarge,

    #[error("request body too large")]
    BodyTooLarge,

    #[error("invalid Host header {0:?}")]
    InvalidHost(String),

    #[error("connection closed before the request was complete")]
    RequestIncomplete,

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("transfer codings are not supported")]
    UnsupportedTransferEncoding,

    #[error("request path is not in origin form")]
    PathNotInOriginForm,

    #[error("illegal percent-encoding in path")]
    IllegalPercentEncoding,

    #[error("request path escapes the document root")]
    PathTraversal,
}

/// Failures of the FastCGI transport itself
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The responder sent something that isn't valid FastCGI for this
    /// exchange.
    #[error("FastCGI protocol violation: {0}")]
    ProtocolViolation(String),

    /// The responder closed the connection without an END_REQUEST record.
    #[error("responder closed the connection before ending the request")]
    UnexpectedEof,

    /// The responder refused the request (FCGI_CANT_MPX_CONN, FCGI_OVERLOADED,
    /// FCGI_UNKNOWN_ROLE).
    #[error("responder rejected the request with protocol status {0}")]
    Rejected(u8),

    #[error("record content exceeds the FastCGI length limit")]
    TooLong,
}
