//! HTTP handlers.
//!
//! [`notes`] serves the index page and note create/delete; [`images`]
//! handles upload, delete and signed download of blobs.

pub mod images;
pub mod notes;
