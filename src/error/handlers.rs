//! Translation of registry HTTP failures into classified errors

use crate::error::{RegistryError, TransferError};
use reqwest::Response;
use serde::Deserialize;

/// Message a registry without OCI artifact support returns for a rejected manifest
pub const UNSUPPORTED_ARTIFACT_MESSAGE: &str =
    "Invalid parameter at 'ImageManifest' failed to satisfy constraint: 'Invalid JSON syntax'";

/// Rendered form of the same rejection, as produced by transfer clients that only
/// expose the error text
const UNSUPPORTED_ARTIFACT_RENDERED: &str = "Response status code 405: unsupported: Invalid parameter at 'ImageManifest' failed to satisfy constraint: 'Invalid JSON syntax'";

const UNSUPPORTED_CODE: &str = "UNSUPPORTED";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn status_detail(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) if !code.is_empty() => format!("{}: {}", code.to_lowercase(), message),
        _ => message.to_string(),
    }
}

/// Build a [`TransferError::Status`] from a status code and the raw response body.
///
/// The first entry of a distribution-spec error envelope supplies the code and message;
/// bodies that are not an envelope are kept verbatim as the message.
pub fn status_error(status: u16, body: &str) -> TransferError {
    let entry = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());

    match entry {
        Some(entry) => TransferError::Status {
            status,
            code: entry.code,
            message: entry.message.unwrap_or_default(),
        },
        None => TransferError::Status {
            status,
            code: None,
            message: body.trim().to_string(),
        },
    }
}

/// Consume a non-success response into a [`TransferError`].
pub(crate) async fn response_error(response: Response) -> TransferError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    status_error(status, &body)
}

/// Whether a failed push was the manifest-schema rejection of a registry that
/// lacks OCI artifact support.
///
/// Matches the structured status first; the rendered-text comparison covers
/// errors that only carry the message.
pub fn is_unsupported_artifact_rejection(err: &TransferError) -> bool {
    if let TransferError::Status {
        status,
        code,
        message,
    } = err
    {
        return *status == 405
            && code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(UNSUPPORTED_CODE))
            && message.contains(UNSUPPORTED_ARTIFACT_MESSAGE);
    }

    err.to_string()
        .to_lowercase()
        .contains(&UNSUPPORTED_ARTIFACT_RENDERED.to_lowercase())
}

/// Map a failed graph copy to the façade error, isolating the unsupported-registry case.
pub(crate) fn classify_push_failure(repository: &str, reference: &str, err: TransferError) -> RegistryError {
    if is_unsupported_artifact_rejection(&err) {
        tracing::warn!(repository, error = %err, "Error when pushing");
        return RegistryError::UnsupportedRegistry {
            repository: repository.to_string(),
        };
    }
    RegistryError::transfer("push", repository, reference, err)
}
