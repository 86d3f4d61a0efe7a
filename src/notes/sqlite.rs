//! SQLite-backed note store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  Async trait methods are thin wrappers around
//! synchronous rusqlite calls executed under a `Mutex`.  Every write is a
//! single autocommitted statement.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::store::{is_blank, Note, NoteStore, MAX_NOTE_LEN};

/// Table name, derived from the record type.
const NOTE_TABLE: &str = "note";

/// Note store backed by a single SQLite database.
pub struct SqliteNoteStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteNoteStore {
    /// Open the database named by a connection URI (see [`sqlite_path_from_uri`]),
    /// creating the parent directory of a file database if needed.
    pub fn open(uri: &str) -> anyhow::Result<Self> {
        let path = sqlite_path_from_uri(uri)?;
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Self::new(&path)
    }

    /// Open (or create) the database at `path` and make sure the note table exists.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.ensure_table()?;
        Ok(store)
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("note store mutex poisoned"))
    }

    fn apply_pragmas(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the note table unless schema introspection shows it already
    /// exists.  Returns `true` if the table was created.
    pub fn ensure_table(&self) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![NOTE_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(false);
        }

        conn.execute_batch(&format!(
            "
            CREATE TABLE note (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                content VARCHAR({max}) NOT NULL CHECK (length(content) <= {max})
            );
            ",
            max = MAX_NOTE_LEN
        ))?;
        info!("Created table '{}'", NOTE_TABLE);
        Ok(true)
    }

    /// Number of rows in the note table.
    #[cfg(test)]
    fn count(&self) -> anyhow::Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))?)
    }
}

impl NoteStore for SqliteNoteStore {
    fn create(
        &self,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Note>>> + Send + '_>> {
        let content = content.to_string();
        Box::pin(async move {
            if is_blank(&content) {
                return Ok(None);
            }
            let conn = self.conn()?;
            conn.execute("INSERT INTO note (content) VALUES (?1)", params![content])?;
            let id = conn.last_insert_rowid();
            Ok(Some(Note { id, content }))
        })
    }

    fn list_all(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Note>>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn()?;
            let mut stmt = conn.prepare("SELECT id, content FROM note ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Note {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })?;
            let mut notes = Vec::new();
            for row in rows {
                notes.push(row?);
            }
            Ok(notes)
        })
    }

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn()?;
            let removed = conn.execute("DELETE FROM note WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }
}

/// Map a database URI to a rusqlite path.
///
/// Accepted forms: `sqlite:///abs/path.db`, `sqlite://relative.db`,
/// `sqlite::memory:`, `:memory:`, and bare file paths.
pub fn sqlite_path_from_uri(uri: &str) -> anyhow::Result<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        anyhow::bail!("database URI is empty");
    }
    if let Some(rest) = uri.strip_prefix("sqlite:") {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            anyhow::bail!("database URI '{}' has no path", uri);
        }
        return Ok(path.to_string());
    }
    if let Some((scheme, _)) = uri.split_once("://") {
        anyhow::bail!("unsupported database scheme '{}' (expected sqlite)", scheme);
    }
    Ok(uri.to_string())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteNoteStore {
        SqliteNoteStore::new(":memory:").expect("failed to create in-memory store")
    }

    #[test]
    fn test_ensure_table_idempotent() {
        let store = test_store();
        assert!(!store.ensure_table().expect("second ensure_table failed"));
        assert!(!store.ensure_table().expect("third ensure_table failed"));
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = test_store();
        let note = store.create("Buy milk").await.unwrap().unwrap();
        assert_eq!(note.content, "Buy milk");

        let notes = store.list_all().await.unwrap();
        assert_eq!(notes, vec![note]);
    }

    #[tokio::test]
    async fn test_create_keeps_untrimmed_text() {
        let store = test_store();
        store.create("  padded  ").await.unwrap();
        let notes = store.list_all().await.unwrap();
        assert_eq!(notes[0].content, "  padded  ");
    }

    #[tokio::test]
    async fn test_create_skips_blank() {
        let store = test_store();
        assert!(store.create("").await.unwrap().is_none());
        assert!(store.create(" \t\n ").await.unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_in_insertion_order() {
        let store = test_store();
        for text in ["first", "second", "third"] {
            store.create(text).await.unwrap();
        }
        let contents: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_delete_removes_only_target() {
        let store = test_store();
        let a = store.create("a").await.unwrap().unwrap();
        let b = store.create("b").await.unwrap().unwrap();

        assert!(store.delete(a.id).await.unwrap());
        let notes = store.list_all().await.unwrap();
        assert_eq!(notes, vec![b]);
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_table_unchanged() {
        let store = test_store();
        store.create("keep me").await.unwrap();
        assert!(!store.delete(9999).await.unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = test_store();
        let a = store.create("a").await.unwrap().unwrap();
        store.delete(a.id).await.unwrap();
        let b = store.create("b").await.unwrap().unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_content_longer_than_column_rejected() {
        let store = test_store();
        let long = "x".repeat(MAX_NOTE_LEN + 1);
        assert!(store.create(&long).await.is_err());
        let max = "y".repeat(MAX_NOTE_LEN);
        assert!(store.create(&max).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.db");
        let uri = format!("sqlite://{}", path.display());

        {
            let store = SqliteNoteStore::open(&uri).unwrap();
            store.create("persisted").await.unwrap();
        }

        let store = SqliteNoteStore::open(&uri).unwrap();
        assert!(!store.ensure_table().unwrap());
        let notes = store.list_all().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "persisted");
    }

    #[test]
    fn test_sqlite_path_from_uri() {
        assert_eq!(sqlite_path_from_uri("sqlite:///var/lib/notes.db").unwrap(), "/var/lib/notes.db");
        assert_eq!(sqlite_path_from_uri("sqlite://data/notes.db").unwrap(), "data/notes.db");
        assert_eq!(sqlite_path_from_uri("sqlite::memory:").unwrap(), ":memory:");
        assert_eq!(sqlite_path_from_uri(":memory:").unwrap(), ":memory:");
        assert_eq!(sqlite_path_from_uri("notes.db").unwrap(), "notes.db");
    }

    #[test]
    fn test_sqlite_path_from_uri_rejects_other_schemes() {
        assert!(sqlite_path_from_uri("postgres://user@host/db").is_err());
        assert!(sqlite_path_from_uri("").is_err());
        assert!(sqlite_path_from_uri("sqlite://").is_err());
    }
}
