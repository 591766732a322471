//! Error types and error handling

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum FormKitError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session store error
    #[error("session error: {0}")]
    Session(String),

    /// Upload storage error
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Posted CSRF token missing or mismatched
    #[error("invalid CSRF token")]
    Csrf,

    /// A configured delivery handler name has no registration
    #[error("unknown delivery handler: {0}")]
    UnknownHandler(String),

    /// A delivery handler failed during dispatch
    #[error("delivery failed: {0}")]
    Delivery(#[from] crate::delivery::DeliveryError),

    /// Malformed request (e.g. unreadable multipart body)
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl FormKitError {
    /// HTTP status this error maps to
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Csrf => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_)
            | Self::Session(_)
            | Self::Storage(_)
            | Self::UnknownHandler(_)
            | Self::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FormKitError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "form request failed");
        }
        (status, self.to_string()).into_response()
    }
}
