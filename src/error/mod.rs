//! Error types for registry operations
//!
//! Failures are layered: the transfer engine and the credential exchange report
//! [`TransferError`] and [`AuthError`], the manifest validator reports
//! [`ValidationError`], and the [`RegistryError`] returned by the client façade wraps
//! them with the operation, repository and reference that failed.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors surfaced by [`crate::registry::RegistryClient`]
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry {host}: {reason}")]
    InvalidRegistry { host: String, reason: String },

    #[error("invalid digest '{0}': expected <algorithm>:<hex>")]
    InvalidDigest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("local store {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: TransferError,
    },

    #[error("{operation} failed for {repository}@{reference}: {source}")]
    Transfer {
        operation: &'static str,
        repository: String,
        reference: String,
        #[source]
        source: TransferError,
    },

    /// The registry rejected the artifact manifest schema
    #[error("registry does not support OCI artifacts (repository {repository})")]
    UnsupportedRegistry { repository: String },

    #[error("failed to tag artifact in {repository} with {tag}: {source}")]
    Tag {
        repository: String,
        tag: String,
        #[source]
        source: TransferError,
    },

    #[error("failed to decode manifest {digest}: {source}")]
    Decode {
        digest: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{repository}@{digest}: {source}")]
    Validation {
        repository: String,
        digest: String,
        #[source]
        source: ValidationError,
    },
}

impl RegistryError {
    /// True when a push failed because the registry cannot store OCI artifacts.
    pub fn is_unsupported_registry(&self) -> bool {
        matches!(self, RegistryError::UnsupportedRegistry { .. })
    }

    /// The validation failure, if this error came from manifest validation.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            RegistryError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }

    pub(crate) fn transfer(
        operation: &'static str,
        repository: &str,
        reference: &str,
        source: TransferError,
    ) -> Self {
        RegistryError::Transfer {
            operation,
            repository: repository.to_string(),
            reference: reference.to_string(),
            source,
        }
    }
}

/// Errors from the cloud credential exchange
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("couldn't authorize with ECR: empty authorization data returned")]
    EmptyAuthorizationData,

    #[error("couldn't authorize with ECR: empty authorization token returned")]
    EmptyToken,

    #[error("authorization token exchange failed: {0}")]
    Exchange(String),

    #[error("authorization token is not a valid header value")]
    InvalidHeader,
}

/// Reasons a digest does not refer to an artifact of the expected shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("not a valid image manifest: empty config media type")]
    EmptyConfigMediaType,

    #[error(
        "not a valid image manifest: unexpected config media type: {actual}, expected one of: {}",
        .expected.join(", ")
    )]
    UnexpectedConfigMediaType {
        actual: String,
        expected: &'static [&'static str],
    },

    #[error(
        "not a valid image index: unexpected media type: {actual}, expected one of: {}",
        .expected.join(", ")
    )]
    NotAnIndex {
        actual: String,
        expected: &'static [&'static str],
    },

    #[error("unsupported index version policy '{0}': expected V1 or V2")]
    UnsupportedPolicy(String),
}

/// Errors reported by a [`crate::registry::TransferEngine`] or a
/// [`crate::store::ContentStore`]
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status, with the first entry of the registry error envelope
    #[error("response status code {status}: {}", handlers::status_detail(.code.as_deref(), .message))]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("registry response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("content digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("content size mismatch for {digest}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        digest: String,
        expected: u64,
        actual: u64,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed content {digest}: {source}")]
    Malformed {
        digest: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl TransferError {
    /// HTTP status of a registry rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            TransferError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
