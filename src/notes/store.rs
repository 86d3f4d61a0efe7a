//! Abstract note store trait.
//!
//! Methods return pinned futures (manual `async_trait` desugaring) so
//! handlers can hold the store as `Arc<dyn NoteStore>`.

use std::future::Future;
use std::pin::Pin;

/// Maximum note length in characters, matching the `VARCHAR(255)` column.
pub const MAX_NOTE_LEN: usize = 255;

/// A single row of the `note` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub content: String,
}

/// Async note persistence contract.
pub trait NoteStore: Send + Sync + 'static {
    /// Insert `content` unless it is blank after trimming.  The stored text
    /// is the untrimmed input.  Returns `None` when nothing was inserted.
    fn create(
        &self,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Note>>> + Send + '_>>;

    /// All notes in insertion order.
    fn list_all(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Note>>> + Send + '_>>;

    /// Delete the note with `id`.  Returns `false` if no such note exists.
    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;
}

/// Whether `content` would be skipped by [`NoteStore::create`].
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("\t\r\n "));
        assert!(!is_blank(" Buy milk "));
    }
}
