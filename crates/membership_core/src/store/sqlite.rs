//! SQLite-backed optimistic row store.
//!
//! # Responsibility
//! - Buffer writes per transaction and apply them atomically on commit.
//! - Validate every read row version and scanned partition at commit time.
//!
//! # Invariants
//! - Row versions come from one monotonic commit sequence, so a row that
//!   was deleted and recreated never reuses a version a reader observed.
//! - A failed validation writes nothing.

use super::{
    Columns, Row, RowKey, ScanSpec, StoreError, StoreResult, Transaction, TransactionManager,
    COMMON_KEY_COLUMN,
};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

struct StoreInner {
    conn: Mutex<Connection>,
}

impl StoreInner {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::CommitFault("row store connection lock poisoned".to_string()))
    }
}

/// Transaction manager over one SQLite connection.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
}

impl SqliteStore {
    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
            }),
        }
    }

    /// Number of stored rows in `namespace.table`. Intended for diagnostics.
    pub fn row_count(&self, namespace: &str, table: &str) -> StoreResult<u64> {
        let conn = self.inner.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_rows WHERE namespace = ?1 AND table_name = ?2;",
            params![namespace, table],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl TransactionManager for SqliteStore {
    fn start(&self) -> StoreResult<Box<dyn Transaction>> {
        if self.inner.conn.is_poisoned() {
            return Err(StoreError::StartFailed(
                "row store connection lock poisoned".to_string(),
            ));
        }
        Ok(Box::new(SqliteTransaction::new(Arc::clone(&self.inner))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Failed,
    Committed,
    Aborted,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Put(Columns),
    Delete,
}

/// One optimistic transaction over `SqliteStore`.
pub struct SqliteTransaction {
    id: String,
    inner: Arc<StoreInner>,
    state: TxState,
    // `None` records that the row was observed absent.
    reads: HashMap<RowKey, Option<i64>>,
    scans: Vec<(ScanSpec, BTreeMap<RowKey, i64>)>,
    writes: BTreeMap<RowKey, PendingWrite>,
}

impl SqliteTransaction {
    fn new(inner: Arc<StoreInner>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            inner,
            state: TxState::Active,
            reads: HashMap::new(),
            scans: Vec::new(),
            writes: BTreeMap::new(),
        }
    }

    fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            _ => Err(StoreError::TransactionClosed),
        }
    }

    /// Records the observed version of `key`. A second observation with a
    /// different version means a concurrent commit landed mid-transaction.
    fn observe(&mut self, key: &RowKey, version: Option<i64>) -> StoreResult<()> {
        match self.reads.get(key) {
            Some(seen) if *seen != version => Err(StoreError::Conflict {
                key: key.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.reads.insert(key.clone(), version);
                Ok(())
            }
        }
    }

    fn validate_and_apply(&self, conn: &mut Connection) -> StoreResult<()> {
        let sql_tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::CommitFault(format!("begin failed: {err}")))?;

        for (key, seen) in &self.reads {
            let current = load_version(&sql_tx, key)?;
            if current != *seen {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                });
            }
        }

        for (spec, seen) in &self.scans {
            let current: BTreeMap<RowKey, i64> = load_partition(&sql_tx, spec)?
                .into_iter()
                .map(|(key, _, version)| (key, version))
                .collect();
            if current != *seen {
                return Err(StoreError::Conflict {
                    key: format!("{}.{}[{}]", spec.namespace, spec.table, spec.common_key),
                });
            }
        }

        if self.writes.is_empty() {
            return sql_tx
                .commit()
                .map_err(|err| StoreError::CommitFault(err.to_string()));
        }

        let version = next_commit_version(&sql_tx)
            .map_err(|err| StoreError::CommitFault(err.to_string()))?;
        for (key, write) in &self.writes {
            let applied = match write {
                PendingWrite::Put(columns) => upsert_row(&sql_tx, key, columns, version),
                PendingWrite::Delete => delete_row(&sql_tx, key),
            };
            applied.map_err(|err| StoreError::CommitFault(format!("{key}: {err}")))?;
        }

        sql_tx
            .commit()
            .map_err(|err| StoreError::CommitFault(err.to_string()))
    }
}

impl Transaction for SqliteTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&mut self, key: &RowKey) -> StoreResult<Option<Row>> {
        self.ensure_active()?;
        if let Some(write) = self.writes.get(key) {
            return Ok(match write {
                PendingWrite::Put(columns) => Some(Row {
                    key: key.clone(),
                    columns: columns.clone(),
                }),
                PendingWrite::Delete => None,
            });
        }

        let loaded = {
            let conn = self.inner.lock()?;
            load_row(&conn, key)?
        };
        match loaded {
            Some((columns, version)) => {
                self.observe(key, Some(version))?;
                Ok(Some(Row {
                    key: key.clone(),
                    columns,
                }))
            }
            None => {
                self.observe(key, None)?;
                Ok(None)
            }
        }
    }

    fn scan(&mut self, spec: &ScanSpec) -> StoreResult<Vec<Row>> {
        self.ensure_active()?;
        let stored = {
            let conn = self.inner.lock()?;
            load_partition(&conn, spec)?
        };

        let mut snapshot = BTreeMap::new();
        let mut merged: BTreeMap<RowKey, Columns> = BTreeMap::new();
        for (key, columns, version) in stored {
            self.observe(&key, Some(version))?;
            snapshot.insert(key.clone(), version);
            merged.insert(key, columns);
        }
        self.scans.push((spec.clone(), snapshot));

        for (key, write) in &self.writes {
            if key.namespace != spec.namespace || key.table != spec.table {
                continue;
            }
            match write {
                PendingWrite::Put(columns) if spec.matches(key, columns) => {
                    merged.insert(key.clone(), columns.clone());
                }
                PendingWrite::Put(_) | PendingWrite::Delete => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(key, columns)| Row { key, columns })
            .collect())
    }

    fn put(&mut self, key: RowKey, columns: Columns) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key, PendingWrite::Put(columns));
        Ok(())
    }

    fn delete(&mut self, key: RowKey) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key, PendingWrite::Delete);
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        let outcome = {
            let mut conn = self.inner.lock()?;
            self.validate_and_apply(&mut conn)
        };

        match outcome {
            Ok(()) => {
                self.state = TxState::Committed;
                debug!(
                    "event=tx_commit module=store status=ok tx_id={} reads={} writes={}",
                    self.id,
                    self.reads.len(),
                    self.writes.len()
                );
                Ok(())
            }
            Err(err) => {
                self.state = TxState::Failed;
                warn!(
                    "event=tx_commit module=store status=error tx_id={} error={}",
                    self.id, err
                );
                Err(err)
            }
        }
    }

    fn abort(&mut self) -> StoreResult<()> {
        if self.state == TxState::Committed {
            return Err(StoreError::TransactionClosed);
        }
        self.writes.clear();
        self.reads.clear();
        self.scans.clear();
        self.state = TxState::Aborted;
        debug!("event=tx_abort module=store status=ok tx_id={}", self.id);
        Ok(())
    }
}

fn decode_columns(key: &RowKey, raw: &str) -> StoreResult<Columns> {
    serde_json::from_str(raw).map_err(|err| StoreError::InvalidRow {
        key: key.to_string(),
        message: err.to_string(),
    })
}

fn load_version(conn: &Connection, key: &RowKey) -> StoreResult<Option<i64>> {
    let version = conn
        .query_row(
            "SELECT version FROM kv_rows
             WHERE namespace = ?1 AND table_name = ?2 AND row_key = ?3;",
            params![key.namespace, key.table, key.id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}

fn load_row(conn: &Connection, key: &RowKey) -> StoreResult<Option<(Columns, i64)>> {
    let loaded: Option<(String, i64)> = conn
        .query_row(
            "SELECT columns, version FROM kv_rows
             WHERE namespace = ?1 AND table_name = ?2 AND row_key = ?3;",
            params![key.namespace, key.table, key.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match loaded {
        Some((raw, version)) => Ok(Some((decode_columns(key, &raw)?, version))),
        None => Ok(None),
    }
}

fn load_partition(conn: &Connection, spec: &ScanSpec) -> StoreResult<Vec<(RowKey, Columns, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT row_key, columns, version FROM kv_rows
         WHERE namespace = ?1 AND table_name = ?2 AND common_key = ?3
         ORDER BY row_key ASC;",
    )?;
    let mut rows = stmt.query(params![spec.namespace, spec.table, spec.common_key])?;
    let mut loaded = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let version: i64 = row.get(2)?;
        let key = RowKey::new(spec.namespace.as_str(), spec.table.as_str(), id);
        let columns = decode_columns(&key, &raw)?;
        loaded.push((key, columns, version));
    }
    Ok(loaded)
}

fn next_commit_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.execute("UPDATE kv_commit_seq SET value = value + 1 WHERE id = 1;", [])?;
    conn.query_row("SELECT value FROM kv_commit_seq WHERE id = 1;", [], |row| {
        row.get(0)
    })
}

fn upsert_row(
    conn: &Connection,
    key: &RowKey,
    columns: &Columns,
    version: i64,
) -> Result<(), String> {
    let encoded = serde_json::to_string(columns).map_err(|err| err.to_string())?;
    conn.execute(
        "INSERT INTO kv_rows (namespace, table_name, row_key, common_key, columns, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (namespace, table_name, row_key) DO UPDATE SET
            common_key = excluded.common_key,
            columns = excluded.columns,
            version = excluded.version,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            key.namespace,
            key.table,
            key.id,
            columns.get(COMMON_KEY_COLUMN),
            encoded,
            version
        ],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

fn delete_row(conn: &Connection, key: &RowKey) -> Result<(), String> {
    conn.execute(
        "DELETE FROM kv_rows WHERE namespace = ?1 AND table_name = ?2 AND row_key = ?3;",
        params![key.namespace, key.table, key.id],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
