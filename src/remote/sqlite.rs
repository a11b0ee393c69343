//! [`RemoteStore`] over a SQLite `documents` table.
//!
//! rusqlite is synchronous, so every call runs on `spawn_blocking` against a
//! shared `Arc<Mutex<Connection>>`. Ordering uses `json_extract` on the stored
//! body with `seq` (first-insertion order) as the tie-breaker.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{new_key, Document, RemoteError, RemoteResult, RemoteStore};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = crate::db::open_database(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(crate::db::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RemoteResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| RemoteError::Storage(format!("db lock poisoned: {e}")))?;
            f(&mut *conn)
        })
        .await?
    }
}

/// Only plain identifiers are spliced into the JSON path.
fn json_path(order_field: &str) -> RemoteResult<String> {
    let valid = !order_field.is_empty()
        && order_field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RemoteError::Malformed(format!(
            "invalid order field: {order_field:?}"
        )));
    }
    Ok(format!("$.{order_field}"))
}

fn row_to_document(id: String, body: String) -> RemoteResult<Document> {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(fields)) => Ok(Document::new(id, fields)),
        Ok(_) => Err(RemoteError::Malformed(format!("document {id} is not an object"))),
        Err(e) => Err(RemoteError::Malformed(format!("document {id}: {e}"))),
    }
}

fn query_ordered(
    conn: &Connection,
    path: &str,
    order_field: &str,
    descending: bool,
    limit: Option<usize>,
) -> RemoteResult<Vec<Document>> {
    let json_path = json_path(order_field)?;
    let direction = if descending { "DESC" } else { "ASC" };
    // -1 means "no limit" in SQLite
    let limit = limit.map_or(-1, |n| n as i64);

    // Spliced as a literal so the expression index can match it
    let sql = format!(
        "SELECT id, body FROM documents WHERE path = ?1 \
         ORDER BY json_extract(body, '{json_path}') {direction}, seq {direction} LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(String, String)> = stmt
        .query_map(params![path, limit], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, body)| row_to_document(id, body))
        .collect()
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn ordered_last(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        let (path, field) = (path.to_string(), order_field.to_string());
        self.with_conn(move |conn| {
            let mut docs = query_ordered(conn, &path, &field, true, Some(n))?;
            docs.reverse();
            Ok(docs)
        })
        .await
    }

    async fn ordered_first(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        let (path, field) = (path.to_string(), order_field.to_string());
        self.with_conn(move |conn| query_ordered(conn, &path, &field, false, Some(n)))
            .await
    }

    async fn ordered_all(&self, path: &str, order_field: &str) -> RemoteResult<Vec<Document>> {
        let (path, field) = (path.to_string(), order_field.to_string());
        self.with_conn(move |conn| query_ordered(conn, &path, &field, false, None))
            .await
    }

    async fn count(&self, path: &str) -> RemoteResult<usize> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn generate_id(&self, _path: &str) -> RemoteResult<String> {
        Ok(new_key())
    }

    async fn write(&self, path: &str, id: &str, value: Map<String, Value>) -> RemoteResult<()> {
        let (path, id) = (path.to_string(), id.to_string());
        let body = serde_json::to_string(&value)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        self.with_conn(move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO documents (path, id, body, updated_at) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(path, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![path, id, body, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, path: &str, id: &str) -> RemoteResult<()> {
        let (path, id) = (path.to_string(), id.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM documents WHERE path = ?1 AND id = ?2",
                params![path, id],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_all(&self, path: &str) -> RemoteResult<()> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM documents WHERE path = ?1", params![path])?;
            tracing::debug!(path = %path, removed, "collection cleared");
            Ok(())
        })
        .await
    }
}
