//! Blobnotes library -- a small notes and image board.
//!
//! Notes live in a SQL table; images live in a single Azure Blob Storage
//! container and are downloaded through short-lived SAS links.

use std::sync::Arc;

use tracing::info;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod html;
pub mod metrics;
pub mod notes;
pub mod sas;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::notes::sqlite::SqliteNoteStore;
use crate::notes::store::NoteStore;
use crate::sas::SasSigner;
use crate::storage::azure::AzureBlobContainer;
use crate::storage::connection_string::ConnectionString;
use crate::storage::container::BlobContainer;
use crate::storage::memory::MemoryBlobContainer;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Validated configuration.
    pub config: Config,
    /// Note table.
    pub notes: Arc<dyn NoteStore>,
    /// Image container.
    pub images: Arc<dyn BlobContainer>,
    /// Signs download links with the account key.
    pub sas: SasSigner,
}

/// Connect every external dependency named by `config`.
///
/// Opens the note database (creating the table if missing), connects the
/// image container (creating it if missing) and prepares the SAS signer.
pub async fn build_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let conn = ConnectionString::parse(&config.storage.connection_string)?;
    let container_name = config.storage.container.clone();

    let notes = SqliteNoteStore::open(&config.database.uri)?;
    info!("Note store ready at {}", config.database.uri);

    let images: Arc<dyn BlobContainer> = match config.storage.backend.as_str() {
        "memory" => Arc::new(MemoryBlobContainer::new(
            &conn.blob_endpoint,
            &container_name,
        )),
        _ => Arc::new(AzureBlobContainer::new(&conn, container_name.clone())?),
    };

    if images
        .ensure_container()
        .await
        .map_err(|e| anyhow::anyhow!("cannot prepare container '{}': {}", container_name, e))?
    {
        info!("Created blob container {}", container_name);
    } else {
        info!("Using existing blob container {}", container_name);
    }

    let sas = SasSigner::new(&conn, &container_name);

    Ok(Arc::new(AppState {
        config,
        notes: Arc::new(notes),
        images,
        sas,
    }))
}
