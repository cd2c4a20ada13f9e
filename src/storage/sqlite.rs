use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Result as SqlResult, params};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    Document, DocumentStore, ListenerRegistration, ListenerRegistry, SnapshotCallback, StoreError,
};

/// Document store persisted in a SQLite file.
///
/// Listeners are notified in-process after each committed write, on the
/// writing thread.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    listeners: ListenerRegistry,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        super::ensure_parent_dir(&path)
            .map_err(|err| StoreError::Unavailable(format!("cannot create data dir: {err}")))?;
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Number of documents stored in `collection`
    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn load(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, data
             FROM documents
             WHERE collection = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let documents = rows
            .into_iter()
            .map(|(id, raw)| {
                // Unreadable rows become empty documents so the feed counts them as malformed.
                let data = serde_json::from_str::<Map<String, Value>>(&raw).unwrap_or_else(|err| {
                    log::warn!("Document {id} in `{collection}` holds invalid JSON: {err}");
                    Map::new()
                });
                Document::new(Some(id), data)
            })
            .collect();

        Ok(documents)
    }
}

fn init_schema(conn: &Connection) -> SqlResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (collection, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, created_at)",
        [],
    )?;

    Ok(())
}

impl DocumentStore for SqliteStore {
    fn subscribe(
        &self,
        collection: &str,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StoreError> {
        self.listeners
            .subscribe(collection, callback, || self.load(collection))
    }

    fn remove_listener(&self, registration: ListenerRegistration) -> bool {
        self.listeners.remove(registration)
    }

    fn submit(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let data = serde_json::to_string(&fields)?;
        self.conn.lock().execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection, id, data],
        )?;
        log::debug!("Stored document {id} in `{collection}`");

        self.listeners.notify(collection, || self.load(collection));
        Ok(id)
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.load(collection)
    }
}
