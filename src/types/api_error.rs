use serde::{Deserialize, Serialize};

use crate::Error;

/// Error detail in a Google API error body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// HTTP-like status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Canonical status string (e.g. `RESOURCE_EXHAUSTED`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The `{"error": {...}}` envelope Google APIs return on failure, both as an
/// HTTP body and as an in-stream SSE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// The error detail.
    pub error: ApiErrorDetail,
}

impl From<ApiErrorResponse> for Error {
    fn from(response: ApiErrorResponse) -> Self {
        let ApiErrorDetail {
            code,
            message,
            status,
        } = response.error;
        Error::api(
            code.unwrap_or(500),
            status,
            message.unwrap_or_else(|| "unknown error".to_string()),
        )
    }
}
