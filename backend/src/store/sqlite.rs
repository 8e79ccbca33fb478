use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pairing_core::Pairing;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::warn;

use super::{PairingStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pairings (
    giver_id    TEXT    NOT NULL,
    receiver_id TEXT    NOT NULL UNIQUE,
    created_at  INTEGER NOT NULL,
    CHECK (giver_id <> receiver_id)
);
CREATE INDEX IF NOT EXISTS pairings_giver_idx ON pairings (giver_id);
";

const INSERT: &str = "INSERT INTO pairings (giver_id, receiver_id, created_at) VALUES (?1, ?2, ?3)";

type RawRow = (String, String, i64);

#[derive(Clone)]
pub struct SqlitePairingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePairingStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::persistence("create database directory", e))?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StoreError::persistence("open", e))?;
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::persistence("set journal_mode", e))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!(journal_mode = %journal_mode, "sqlite did not switch to WAL");
        }
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::persistence("open", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::persistence("set busy_timeout", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::persistence("create schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::persistence(op, "connection lock poisoned"))?;
            f(&mut *conn).map_err(|e| StoreError::persistence(op, e))
        })
        .await
        .map_err(|e| StoreError::persistence(op, e))?
    }
}

fn to_sql_millis(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}

fn from_raw((giver_id, receiver_id, created_at): RawRow) -> Result<Pairing, StoreError> {
    let created_at = u64::try_from(created_at)
        .map_err(|_| StoreError::Corrupt(format!("negative created_at {created_at}")))?;
    Ok(Pairing {
        giver_id,
        receiver_id,
        created_at,
    })
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

#[async_trait]
impl PairingStore for SqlitePairingStore {
    async fn replace_all(&self, pairings: Vec<Pairing>) -> Result<usize, StoreError> {
        self.run("replace_all", move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM pairings", [])?;
            {
                let mut insert = tx.prepare(INSERT)?;
                for pairing in &pairings {
                    insert.execute(params![
                        pairing.giver_id,
                        pairing.receiver_id,
                        to_sql_millis(pairing.created_at)
                    ])?;
                }
            }
            tx.commit()?;
            Ok(pairings.len())
        })
        .await
    }

    async fn reset_all(&self) -> Result<(), StoreError> {
        self.run("reset_all", |conn| {
            conn.execute("DELETE FROM pairings", [])?;
            Ok(())
        })
        .await
    }

    async fn override_receiver(&self, pairing: Pairing) -> Result<Option<Pairing>, StoreError> {
        let replaced = self
            .run("override_receiver", move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let replaced = tx
                    .query_row(
                        "DELETE FROM pairings WHERE receiver_id = ?1
                         RETURNING giver_id, receiver_id, created_at",
                        params![pairing.receiver_id],
                        read_raw,
                    )
                    .optional()?;
                tx.execute(
                    INSERT,
                    params![
                        pairing.giver_id,
                        pairing.receiver_id,
                        to_sql_millis(pairing.created_at)
                    ],
                )?;
                tx.commit()?;
                Ok(replaced)
            })
            .await?;
        replaced.map(from_raw).transpose()
    }

    async fn list(&self) -> Result<Vec<Pairing>, StoreError> {
        let rows = self
            .run("list", |conn| {
                let mut stmt = conn.prepare(
                    "SELECT giver_id, receiver_id, created_at FROM pairings ORDER BY rowid",
                )?;
                let rows = stmt.query_map([], read_raw)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        rows.into_iter().map(from_raw).collect()
    }

    async fn assignments_for(&self, giver_id: &str) -> Result<Vec<Pairing>, StoreError> {
        let giver_id = giver_id.to_string();
        let rows = self
            .run("assignments_for", move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT giver_id, receiver_id, created_at FROM pairings
                     WHERE giver_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map(params![giver_id], read_raw)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        rows.into_iter().map(from_raw).collect()
    }
}
