//! Note persistence.
//!
//! The [`store::NoteStore`] trait defines the interface;
//! [`sqlite::SqliteNoteStore`] is the only implementation.

pub mod sqlite;
pub mod store;
