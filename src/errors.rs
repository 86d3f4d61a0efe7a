//! Application error types.
//!
//! Every variant maps to an HTTP status and a plain-text message.  The
//! enum implements [`axum::response::IntoResponse`] so handlers can simply
//! return `Err(AppError::NoteNotFound { .. })`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::storage::container::BlobError;

#[derive(Debug, Error)]
pub enum AppError {
    /// No note with the requested id.
    #[error("Note {id} not found")]
    NoteNotFound { id: String },

    /// The request is missing a required part or carries an empty one.
    #[error("{message}")]
    InvalidInput { message: String },

    /// The upload exceeds the configured request body limit.
    #[error("File too large: uploads are limited to {limit} bytes")]
    UploadTooLarge { limit: usize },

    /// The named blob does not exist.
    #[error("{context}: blob '{name}' not found")]
    BlobNotFound { context: &'static str, name: String },

    /// The blob storage service failed.
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: BlobError,
    },

    /// Catch-all for database and other internal failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wrap a blob error, keeping "not found" distinct from service failures.
    pub fn storage(context: &'static str, err: BlobError) -> Self {
        match err {
            BlobError::NotFound { name } => AppError::BlobNotFound { context, name },
            source => AppError::Storage { context, source },
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            message: message.into(),
        }
    }

    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoteNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BlobNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", message);
        } else {
            warn!(status = status.as_u16(), "{}", message);
        }

        (
            status,
            [("content-type", "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
