//! Index page and note handlers.

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::response::{Html, Redirect};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::html::{self, ImageEntry};
use crate::metrics::NOTES_CREATED_TOTAL;
use crate::AppState;

/// Body of `POST /`.
#[derive(Debug, Deserialize)]
pub struct NoteForm {
    pub note: String,
}

/// `GET /` -- Render every note and every image in the container.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let notes = state.notes.list_all().await?;

    let images: Vec<ImageEntry> = state
        .images
        .list_blobs()
        .await
        .map_err(|e| AppError::storage("Error listing images", e))?
        .into_iter()
        .map(|name| ImageEntry {
            url: state.images.public_url(&name),
            name,
        })
        .collect();

    debug!("Index: {} notes, {} images", notes.len(), images.len());

    Ok(Html(html::render_index(&notes, &images)?))
}

/// `POST /` -- Store the submitted note unless it is blank, then go back to `/`.
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NoteForm>,
) -> Result<Redirect, AppError> {
    match state.notes.create(&form.note).await? {
        Some(note) => {
            info!("Created note {}", note.id);
            metrics::counter!(NOTES_CREATED_TOTAL).increment(1);
        }
        None => debug!("Ignored blank note"),
    }
    Ok(Redirect::to("/"))
}

/// `POST /delete/{id}` -- Delete a note, 404 if it does not exist.
///
/// Non-numeric ids cannot name a note, so they are also 404.
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let not_found = || AppError::NoteNotFound { id: id.clone() };

    let note_id: i64 = id.parse().map_err(|_| not_found())?;
    if !state.notes.delete(note_id).await? {
        return Err(not_found());
    }

    info!("Deleted note {}", note_id);
    Ok(Redirect::to("/"))
}
