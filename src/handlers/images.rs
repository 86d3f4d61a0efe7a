//! Image upload, delete and download handlers.

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::html;
use crate::metrics::{IMAGES_UPLOADED_TOTAL, UPLOAD_BYTES_TOTAL};
use crate::sas;
use crate::storage::container::BlobError;
use crate::AppState;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Content type used when the client does not send one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /upload` -- Store the `file` part under its filename, overwriting.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    // A body that is not multipart at all has no file part either.
    let mut multipart = multipart.map_err(|_| AppError::invalid_input("No file part"))?;
    let limit = state.config.server.max_upload_size;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit))?;
        let Some(field) = field else {
            return Err(AppError::invalid_input("No file part"));
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AppError::invalid_input("No selected file"));
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?;
        let size = data.len() as u64;

        state
            .images
            .upload(&filename, data, &content_type)
            .await
            .map_err(|e| AppError::storage("Error uploading file", e))?;

        info!("Uploaded image {} ({} bytes)", filename, size);
        metrics::counter!(IMAGES_UPLOADED_TOTAL).increment(1);
        metrics::counter!(UPLOAD_BYTES_TOTAL).increment(size);

        let url = state.images.public_url(&filename);
        return Ok(Html(html::render_upload_success(&url)?));
    }
}

/// Body-limit overruns are 413; anything else is a malformed request.
fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::UploadTooLarge { limit }
    } else {
        AppError::invalid_input(format!("Malformed upload: {}", err.body_text()))
    }
}

/// `POST /delete_image/{name}` -- Delete a blob, then go back to `/`.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Redirect, AppError> {
    state
        .images
        .delete(&name)
        .await
        .map_err(|e| AppError::storage("Error deleting image", e))?;

    info!("Deleted image {}", name);
    Ok(Redirect::to("/"))
}

/// `GET /download_image/{name}` -- Redirect to a one-hour read-only signed URL.
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Redirect, AppError> {
    let token = state
        .sas
        .generate(&name)
        .map_err(|e| {
            AppError::storage("Error downloading image", BlobError::Signing(e.to_string()))
        })?;
    let url = sas::signed_url(&state.images.public_url(&name), &token);

    debug!("Issued download link for {}", name);
    Ok(Redirect::to(&url))
}
