//! Database schema SQL for the vector index.

/// Bumped whenever the tables below change incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Database file name inside the index directory.
pub const DB_FILE: &str = "index.db";

/// Files SQLite may leave next to the database in WAL mode.
pub const DB_FILES: &[&str] = &["index.db", "index.db-wal", "index.db-shm"];

/// Core tables: manifest, entries, entry_embeddings.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    source TEXT NOT NULL,
    page INTEGER,
    chunk_index INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source);

CREATE TABLE IF NOT EXISTS entry_embeddings (
    entry_id INTEGER PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL
);
"#;
