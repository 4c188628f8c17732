//! Write-through persistence for the memory store.
//!
//! The store is authoritative in memory; a [`MemoryJournal`] mirrors every
//! committed write and eviction so a session can be rehydrated later. The
//! SQLite implementation keeps the two representations in separate tables
//! and commits both rows in one transaction:
//!
//! ```sql
//! CREATE TABLE memory_records (
//!     seq        INTEGER PRIMARY KEY AUTOINCREMENT,
//!     id         TEXT NOT NULL UNIQUE,
//!     agent      TEXT NOT NULL,
//!     kind       TEXT NOT NULL,
//!     timestamp  TEXT NOT NULL,
//!     important  INTEGER NOT NULL,
//!     payload    TEXT NOT NULL
//! );
//! CREATE TABLE memory_embeddings (
//!     id      TEXT PRIMARY KEY REFERENCES memory_records(id) ON DELETE CASCADE,
//!     vector  BLOB NOT NULL
//! );
//! ```
//!
//! Payloads are JSON; embeddings are `bincode`-encoded `Vec<f32>`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::memory::{MemoryKind, MemoryPayload, MemoryRecord};
use crate::types::{AgentId, Embedding, MemoryId};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Durable mirror of the memory store.
pub trait MemoryJournal: Send + Sync {
    /// Persist a record together with its embedding as one unit.
    ///
    /// # Errors
    ///
    /// Any error means nothing was persisted.
    fn append(&self, record: &MemoryRecord, embedding: &Embedding) -> Result<()>;

    /// Remove an evicted record.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn remove(&self, id: &MemoryId) -> Result<()>;

    /// Every persisted record with its embedding, in write order.
    ///
    /// # Errors
    ///
    /// Returns an error on backend or decoding failure.
    fn load_all(&self) -> Result<Vec<(MemoryRecord, Embedding)>>;
}

// ---------------------------------------------------------------------------
// SqliteJournal
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memory_records (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT NOT NULL UNIQUE,
    agent      TEXT NOT NULL,
    kind       TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    important  INTEGER NOT NULL,
    payload    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS memory_embeddings (
    id      TEXT PRIMARY KEY REFERENCES memory_records(id) ON DELETE CASCADE,
    vector  BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_records_agent ON memory_records(agent, seq);
";

/// SQLite-backed [`MemoryJournal`].
pub struct SqliteJournal {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJournal")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteJournal {
    /// Open (or create) a journal database at `path` in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "memory journal opened");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Number of records currently persisted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM memory_records", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Whether the journal holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl MemoryJournal for SqliteJournal {
    fn append(&self, record: &MemoryRecord, embedding: &Embedding) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        let vector =
            bincode::serialize(&embedding.0).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let id = record.id.0.to_string();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO memory_records (id, agent, kind, timestamp, important, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                record.agent.as_str(),
                record.kind.as_str(),
                record.timestamp.to_rfc3339(),
                record.important,
                payload,
            ],
        )?;
        tx.execute(
            "INSERT INTO memory_embeddings (id, vector) VALUES (?1, ?2)",
            params![id, vector],
        )?;
        tx.commit()?;

        debug!(memory = %record.id, agent = %record.agent, "journaled memory");
        Ok(())
    }

    fn remove(&self, id: &MemoryId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM memory_records WHERE id = ?1", params![id.0.to_string()])?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<(MemoryRecord, Embedding)>> {
        type Row = (String, String, String, String, bool, String, Vec<u8>);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.agent, r.kind, r.timestamp, r.important, r.payload, e.vector
             FROM memory_records r
             JOIN memory_embeddings e ON e.id = r.id
             ORDER BY r.seq",
        )?;
        let rows: Vec<Row> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, agent, kind, timestamp, important, payload, vector)| {
                let id = Uuid::parse_str(&id).map_err(|e| CoreError::Serialization(e.to_string()))?;
                let kind: MemoryKind = kind.parse().map_err(CoreError::Serialization)?;
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?
                    .with_timezone(&Utc);
                let payload: MemoryPayload = serde_json::from_str(&payload)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                let vector: Vec<f32> = bincode::deserialize(&vector)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;

                Ok((
                    MemoryRecord {
                        id: MemoryId(id),
                        agent: AgentId::new(agent),
                        kind,
                        timestamp,
                        payload,
                        important,
                    },
                    Embedding(vector),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent: &str, text: &str) -> MemoryRecord {
        MemoryRecord::new(
            AgentId::new(agent),
            MemoryKind::Event,
            MemoryPayload::new(agent, "market", 0.3, text),
            Utc::now(),
        )
    }

    #[test]
    fn append_then_load_preserves_order_and_embedding() {
        let journal = SqliteJournal::open_in_memory().expect("open");
        let first = record("A", "opened the shop");
        let second = record("A", "sold bread").important(true);
        journal.append(&first, &Embedding(vec![0.1, 0.2])).expect("append");
        journal.append(&second, &Embedding(vec![0.3, 0.4])).expect("append");

        let loaded = journal.load_all().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0.id, first.id);
        assert_eq!(loaded[1].0, second);
        assert_eq!(loaded[1].1, Embedding(vec![0.3, 0.4]));
    }

    #[test]
    fn remove_cascades_to_embedding() {
        let journal = SqliteJournal::open_in_memory().expect("open");
        let r = record("A", "lost a coin");
        journal.append(&r, &Embedding(vec![1.0])).expect("append");
        journal.remove(&r.id).expect("remove");
        assert!(journal.is_empty().expect("count"));
        assert!(journal.load_all().expect("load").is_empty());
    }

    #[test]
    fn duplicate_id_fails_without_partial_write() {
        let journal = SqliteJournal::open_in_memory().expect("open");
        let r = record("A", "waved");
        journal.append(&r, &Embedding(vec![1.0])).expect("append");
        assert!(journal.append(&r, &Embedding(vec![2.0])).is_err());
        let loaded = journal.load_all().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1, Embedding(vec![1.0]));
    }
}
