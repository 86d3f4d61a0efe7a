//! Abstract blob container trait.
//!
//! The application talks to exactly one blob container.  Every backend
//! implements [`BlobContainer`]; handlers only see the trait object.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by blob container operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The named blob does not exist.
    #[error("blob '{name}' not found")]
    NotFound { name: String },

    /// The storage service answered with a non-success status.
    #[error("Azure {operation}: HTTP {status} - {body}")]
    Service {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The request never got a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a body we could not parse.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Request signing failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Boxed future returned by [`BlobContainer`] methods.
pub type BlobFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BlobError>> + Send + 'a>>;

/// Async contract for the single image container.
pub trait BlobContainer: Send + Sync + 'static {
    /// Container name.
    fn name(&self) -> &str;

    /// Publicly constructible URL of `blob_name` (no credentials attached).
    fn public_url(&self, blob_name: &str) -> String;

    /// Create the container if it does not exist yet.  Returns `true` when
    /// it was created by this call.
    fn ensure_container(&self) -> BlobFuture<'_, bool>;

    /// Names of every blob in the container.
    fn list_blobs(&self) -> BlobFuture<'_, Vec<String>>;

    /// Store `data` under `blob_name`, replacing any existing blob.
    fn upload(&self, blob_name: &str, data: Bytes, content_type: &str) -> BlobFuture<'_, ()>;

    /// Remove `blob_name`.  Fails with [`BlobError::NotFound`] when absent.
    fn delete(&self, blob_name: &str) -> BlobFuture<'_, ()>;
}

/// Percent-encoding set for blob names: encode everything except
/// unreserved characters and '/'.
pub const BLOB_NAME_ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Build `{endpoint}/{container}/{encoded blob name}`.
pub fn blob_url(endpoint: &str, container: &str, blob_name: &str) -> String {
    let encoded = percent_encoding::utf8_percent_encode(blob_name, &BLOB_NAME_ENCODE_SET);
    format!("{}/{}/{}", endpoint, container, encoded)
}
