//! SQL DDL for the document store tables.
//!
//! Defines `documents` (one row per `path/id`, JSON body) and `schema_meta`.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Path-addressed documents. `seq` records first insertion and breaks ordering ties.
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL CHECK(json_valid(body)),
    updated_at TEXT NOT NULL,
    UNIQUE(path, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(path);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"documents".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn body_must_be_json() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let res = conn.execute(
            "INSERT INTO documents (path, id, body, updated_at) VALUES ('p', 'a', 'not json', 'now')",
            [],
        );
        assert!(res.is_err());
    }
}
