use std::fmt;

use http::StatusCode;

/// Errors surfaced by a produced invocation function to the host.
///
/// Authorization failures never appear here: they are answered with a
/// `401`/`403` response and `invoke` returns `Ok(())`.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    /// The user handler returned an error
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
    /// The handler's result could not be serialized into the response body
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// An authorization decision that rejected an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// The kind of denial that occurred
    pub kind: DenialKind,
    /// Human-readable message explaining the denial
    pub message: String,
}

impl Denial {
    /// Creates a new denial.
    pub fn new(kind: DenialKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the HTTP status the host should answer with.
    ///
    /// `401` when no identity was decoded, `403` when an identity was present
    /// but did not satisfy every declared rule.
    pub fn status(&self) -> StatusCode {
        match self.kind {
            DenialKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            DenialKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Denial {}

/// The kind of authorization denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// No identity was carried by the request
    Unauthenticated,
    /// An identity was present but a declared rule rejected it
    Forbidden,
}

impl fmt::Display for DenialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialKind::Unauthenticated => write!(f, "Unauthenticated"),
            DenialKind::Forbidden => write!(f, "Forbidden"),
        }
    }
}

/// Failures while decoding an identity header.
///
/// The pipeline never surfaces these to the host; an undecodable credential
/// is treated the same as no credential.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Header value was not visible ASCII
    #[error("identity header is not valid ASCII")]
    InvalidHeader,
    /// Header value was not valid base64
    #[error("identity header is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// Decoded payload was not the expected JSON document
    #[error("identity payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors raised by the persistence capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// A replacement document carried no `_id`
    #[error("replacement document must contain _id")]
    MissingId,
    /// A document id is not a 24 character hex string
    #[error("invalid document id: {0}")]
    InvalidId(String),
    /// An insert reused an id already present in the collection
    #[error("duplicate document id: {0}")]
    DuplicateId(String),
    /// A replace matched zero or several documents
    #[error("expected 1 modified but got {matched}")]
    ReplaceMismatch {
        /// Number of documents the filter matched
        matched: usize,
    },
    /// Connecting to the backing store failed
    #[error("database initialization failed: {0}")]
    Initialization(String),
    /// The backing store rejected an operation
    #[error("document store error: {0}")]
    Store(String),
}

/// Errors raised by a realtime transport.
///
/// [`BroadcastRealtime`](crate::realtime::BroadcastRealtime) never fails a
/// send. Transports backed by an external service report refusals here.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The transport refused the event
    #[error("realtime transport rejected event '{event}': {reason}")]
    Rejected {
        /// Event name that was being sent
        event: String,
        /// Transport-specific reason
        reason: String,
    },
}
