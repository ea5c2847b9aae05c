//! Persistent vector index: SQLite for entries + a normalized in-memory matrix for search.
//!
//! Every entry row carries its text, source file, page and chunk position. Embeddings are
//! stored as float32 blobs and mirrored into an `(N, dim)` matrix of unit rows so that a
//! query is a single matrix-vector product.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::embedding::{decode_f32, encode_f32};
use crate::schema::{DB_FILE, DB_FILES, SCHEMA_SQL, SCHEMA_VERSION};
use crate::types::*;
use reqmind_core::{Error, Result};

/// Vectors with a norm below this are treated as zero and never ranked.
const MIN_NORM: f32 = 1e-9;

/// `index_meta` key written by [`VectorIndex::finish`]; absent while a build is in progress.
const ENTRY_COUNT_KEY: &str = "entry_count";

/// Persistent cosine-distance index over chunk embeddings.
pub struct VectorIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    manifest: IndexManifest,
    matrix: Mutex<SearchMatrix>,
}

struct SearchMatrix {
    /// Unit-normalized embeddings, shape (N, dim).
    rows: Array2<f32>,
    /// Entry IDs corresponding to each row, in insertion order.
    entry_ids: Vec<i64>,
    /// All stored entries, including zero-norm ones that have no matrix row.
    entries: usize,
}

impl VectorIndex {
    /// Create an empty index in `dir`, replacing any index database already there.
    ///
    /// Only the index database files are removed; other files in `dir` are left alone.
    pub fn create(dir: impl AsRef<Path>, model_id: &str, dimension: usize) -> Result<Self> {
        let dir = dir.as_ref();
        if dimension == 0 {
            return Err(Error::Index("embedding dimension must be greater than zero".into()));
        }
        std::fs::create_dir_all(dir)?;
        for name in DB_FILES {
            let path = dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)?;
                debug!("Removed stale {}", path.display());
            }
        }

        let db_path = dir.join(DB_FILE);
        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        Self::configure_connection(&conn).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let manifest = IndexManifest {
            schema_version: SCHEMA_VERSION,
            model_id: model_id.to_string(),
            dimension,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        Self::write_manifest(&conn, &manifest)?;

        info!(
            "Created vector index: model={}, dim={}, path={}",
            model_id,
            dimension,
            db_path.display()
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            manifest,
            matrix: Mutex::new(SearchMatrix {
                rows: Array2::zeros((0, dimension)),
                entry_ids: Vec::new(),
                entries: 0,
            }),
        })
    }

    /// Open an index previously built in `dir`.
    ///
    /// Fails with [`Error::RebuildRequired`] when the index is missing, unreadable, was built
    /// with a different embedding model or dimension, or its build never reached
    /// [`finish`](Self::finish).
    pub fn open(dir: impl AsRef<Path>, model_id: &str, dimension: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let db_path = dir.join(DB_FILE);
        if !db_path.is_file() {
            return Err(Error::RebuildRequired(format!(
                "no index found in {}",
                dir.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unreadable)?;
        Self::configure_connection(&conn).map_err(unreadable)?;

        let manifest = Self::read_manifest(&conn)?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(Error::RebuildRequired(format!(
                "index schema version {} does not match {}",
                manifest.schema_version, SCHEMA_VERSION
            )));
        }
        if manifest.model_id != model_id {
            return Err(Error::RebuildRequired(format!(
                "index was built with embedding model '{}', configured model is '{}'",
                manifest.model_id, model_id
            )));
        }
        if manifest.dimension != dimension {
            return Err(Error::RebuildRequired(format!(
                "index dimension {} does not match embedder dimension {}",
                manifest.dimension, dimension
            )));
        }

        let matrix = Self::load_matrix(&conn, dimension).map_err(unreadable)?;
        match Self::read_entry_count(&conn)? {
            None => {
                return Err(Error::RebuildRequired(format!(
                    "index build in {} did not complete",
                    dir.display()
                )));
            }
            Some(count) if count != matrix.entries => {
                return Err(Error::RebuildRequired(format!(
                    "index holds {} entries but its build recorded {}",
                    matrix.entries, count
                )));
            }
            Some(_) => {}
        }
        info!(
            "Opened vector index: {} entries, model={}, dim={}, path={}",
            matrix.entries,
            manifest.model_id,
            manifest.dimension,
            db_path.display()
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            manifest,
            matrix: Mutex::new(matrix),
        })
    }

    fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
    }

    fn write_manifest(conn: &Connection, manifest: &IndexManifest) -> Result<()> {
        let pairs = [
            ("schema_version", manifest.schema_version.to_string()),
            ("model_id", manifest.model_id.clone()),
            ("dimension", manifest.dimension.to_string()),
            ("created_at", manifest.created_at.clone()),
        ];
        for (key, value) in pairs {
            conn.execute(
                "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        }
        Ok(())
    }

    fn read_manifest(conn: &Connection) -> Result<IndexManifest> {
        let mut stmt = conn
            .prepare("SELECT key, value FROM index_meta")
            .map_err(unreadable)?;
        let meta: HashMap<String, String> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(unreadable)?
            .collect::<rusqlite::Result<_>>()
            .map_err(unreadable)?;

        let field = |key: &str| {
            meta.get(key)
                .cloned()
                .ok_or_else(|| Error::RebuildRequired(format!("index manifest is missing '{}'", key)))
        };
        let number = |key: &str| -> Result<usize> {
            field(key)?
                .parse()
                .map_err(|_| Error::RebuildRequired(format!("index manifest has invalid '{}'", key)))
        };

        Ok(IndexManifest {
            schema_version: number("schema_version")? as u32,
            model_id: field("model_id")?,
            dimension: number("dimension")?,
            created_at: field("created_at")?,
        })
    }

    fn read_entry_count(conn: &Connection) -> Result<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![ENTRY_COUNT_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(unreadable)?;
        value
            .map(|v| {
                v.parse().map_err(|_| {
                    Error::RebuildRequired(format!(
                        "index manifest has invalid '{}'",
                        ENTRY_COUNT_KEY
                    ))
                })
            })
            .transpose()
    }

    /// Load all embeddings into a matrix of unit rows.
    fn load_matrix(conn: &Connection, dimension: usize) -> Result<SearchMatrix> {
        let entries: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT entry_id, embedding FROM entry_embeddings ORDER BY entry_id")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut entry_ids = Vec::new();
        let mut embeddings = Vec::new();
        for row in rows {
            let (id, blob) = row.map_err(|e| Error::Database(e.to_string()))?;
            let embedding = decode_f32(&blob)?;
            if embedding.len() != dimension {
                return Err(Error::Index(format!(
                    "entry {} has dimension {}, expected {}",
                    id,
                    embedding.len(),
                    dimension
                )));
            }
            if let Some(unit) = normalized(&embedding) {
                entry_ids.push(id);
                embeddings.push(unit);
            }
        }

        let mut matrix = Array2::zeros((embeddings.len(), dimension));
        for (i, emb) in embeddings.iter().enumerate() {
            matrix.row_mut(i).assign(emb);
        }
        debug!("Loaded {} embeddings into matrix", entry_ids.len());

        Ok(SearchMatrix {
            rows: matrix,
            entry_ids,
            entries: entries as usize,
        })
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Append entries in one transaction and return their IDs in input order.
    ///
    /// Any vector of the wrong dimension rejects the whole batch before anything is written.
    /// The index counts as incomplete again until the next [`finish`](Self::finish).
    pub fn add(&self, entries: &[NewEntry]) -> Result<Vec<i64>> {
        let dimension = self.manifest.dimension;
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(Error::Index(format!(
                "embedding for {} chunk {} has dimension {}, index expects {}",
                bad.source,
                bad.chunk_index,
                bad.embedding.len(),
                dimension
            )));
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();
        let mut ids = Vec::with_capacity(entries.len());
        {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(e.to_string()))?;
            tx.execute("DELETE FROM index_meta WHERE key = ?1", params![ENTRY_COUNT_KEY])
                .map_err(|e| Error::Database(e.to_string()))?;
            for entry in entries {
                tx.execute(
                    "INSERT INTO entries (text, source, page, chunk_index, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.text,
                        entry.source,
                        entry.page,
                        entry.chunk_index as i64,
                        now
                    ],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO entry_embeddings (entry_id, embedding) VALUES (?1, ?2)",
                    params![id, encode_f32(&entry.embedding)],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                ids.push(id);
            }
            tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        }

        let mut matrix = self.matrix.lock();
        let mut skipped = 0usize;
        for (id, entry) in ids.iter().zip(entries) {
            match normalized(&entry.embedding) {
                Some(unit) => {
                    matrix
                        .rows
                        .push(Axis(0), unit.view())
                        .map_err(|e| Error::Index(e.to_string()))?;
                    matrix.entry_ids.push(*id);
                }
                None => skipped += 1,
            }
        }
        matrix.entries += ids.len();
        if skipped > 0 {
            warn!("{} zero-norm embeddings stored but excluded from search", skipped);
        }
        debug!("Added {} entries (total {})", ids.len(), matrix.entries);
        Ok(ids)
    }

    /// Mark the build complete and persist it.
    ///
    /// Records the entry count so that [`open`](Self::open) can tell a finished index from one
    /// whose build was interrupted.
    pub fn finish(&self) -> Result<()> {
        let entries = self.len();
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
                params![ENTRY_COUNT_KEY, entries.to_string()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        }
        self.persist()?;
        info!("Index build complete: {} entries", entries);
        Ok(())
    }

    /// Flush the write-ahead log into the main database file.
    pub fn persist(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| Error::Database(e.to_string()))?;
        debug!("Checkpointed {}", self.db_path.display());
        Ok(())
    }

    /// Persist and release the database handle.
    ///
    /// Dropping the index also releases the handle, but skips the checkpoint.
    pub fn close(self) -> Result<()> {
        self.persist()?;
        let conn = self.conn.into_inner();
        conn.close().map_err(|(_, e)| Error::Database(e.to_string()))?;
        debug!("Closed vector index");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Return up to `k` entries ranked by ascending cosine distance to `query`.
    ///
    /// Ties keep insertion order. An empty index, `k == 0` or a zero query yield no hits.
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.manifest.dimension {
            return Err(Error::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.manifest.dimension
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(q) = normalized(query) else {
            return Ok(Vec::new());
        };

        let top: Vec<(i64, f32)> = {
            let matrix = self.matrix.lock();
            if matrix.rows.nrows() == 0 {
                return Ok(Vec::new());
            }

            // (N, dim) @ (dim,) -> (N,)
            let similarities = matrix.rows.dot(&q);
            let mut ranked: Vec<(usize, f32)> = similarities
                .iter()
                .enumerate()
                .map(|(i, &s)| (i, (1.0 - s).clamp(0.0, 2.0)))
                .collect();
            // sort_by is stable, so equal distances stay in row (insertion) order
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(k);
            ranked
                .into_iter()
                .map(|(row, distance)| (matrix.entry_ids[row], distance))
                .collect()
        };

        let mut hits = Vec::with_capacity(top.len());
        for (id, distance) in top {
            match self.get_entry(id)? {
                Some(entry) => hits.push(SearchHit { entry, distance }),
                None => warn!("Entry {} is in the search matrix but not in the database", id),
            }
        }
        Ok(hits)
    }

    /// Fetch a stored entry by ID.
    pub fn get_entry(&self, id: i64) -> Result<Option<IndexEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, text, source, page, chunk_index, created_at FROM entries WHERE id = ?1",
            params![id],
            Self::row_to_entry,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.matrix.lock().entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    /// Get index statistics.
    pub fn stats(&self) -> Result<IndexStats> {
        let sources: i64 = {
            let conn = self.conn.lock();
            conn.query_row("SELECT COUNT(DISTINCT source) FROM entries", [], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))?
        };
        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let matrix = self.matrix.lock();

        Ok(IndexStats {
            entries: matrix.entries,
            sources: sources as usize,
            model_id: self.manifest.model_id.clone(),
            dimension: self.manifest.dimension,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
            matrix_rows: matrix.rows.nrows(),
        })
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexEntry> {
        Ok(IndexEntry {
            id: row.get(0)?,
            text: row.get(1)?,
            source: row.get(2)?,
            page: row.get(3)?,
            chunk_index: row.get::<_, i64>(4)? as usize,
            created_at: row.get(5)?,
        })
    }
}

fn normalized(v: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(v).sqrt();
    if !norm.is_finite() || norm < MIN_NORM {
        return None;
    }
    Some(v / norm)
}

fn unreadable(e: impl Display) -> Error {
    Error::RebuildRequired(format!("index is unreadable: {}", e))
}
