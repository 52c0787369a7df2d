//! Transactional row store contracts.
//!
//! # Responsibility
//! - Define the storage primitive consumed by repositories and services:
//!   single-row reads, partition scans, buffered puts/deletes, commit, abort.
//! - Classify every storage failure exactly once (`StoreError::class`).
//!
//! # Invariants
//! - Nothing written through a `Transaction` is visible to other
//!   transactions before `commit` returns `Ok`.
//! - Reads inside a transaction observe that transaction's buffered writes.
//! - A commit that observes a concurrent change to any row it read fails
//!   with `StoreError::Conflict` and applies nothing.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod sqlite;

pub use sqlite::{SqliteStore, SqliteTransaction};

/// Column holding the partition discriminator shared by all rows of a table.
pub const COMMON_KEY_COLUMN: &str = "common_key";

/// Column name -> text value. Every put carries the full row.
pub type Columns = BTreeMap<String, String>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Primary key of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub namespace: String,
    pub table: String,
    pub id: String,
}

impl RowKey {
    pub fn new(
        namespace: impl Into<String>,
        table: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
            id: id.into(),
        }
    }
}

impl Display for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}/{}", self.namespace, self.table, self.id)
    }
}

/// Range read selecting every row of a table sharing one `common_key` value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanSpec {
    pub namespace: String,
    pub table: String,
    pub common_key: String,
}

impl ScanSpec {
    pub fn new(
        namespace: impl Into<String>,
        table: impl Into<String>,
        common_key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
            common_key: common_key.into(),
        }
    }

    /// Returns whether a row with `key` and `columns` belongs to this scan.
    pub fn matches(&self, key: &RowKey, columns: &Columns) -> bool {
        key.namespace == self.namespace
            && key.table == self.table
            && columns.get(COMMON_KEY_COLUMN).map(String::as_str) == Some(self.common_key.as_str())
    }
}

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RowKey,
    pub columns: Columns,
}

impl Row {
    /// Returns the text value of `column`, or `""` when the column is unset.
    pub fn text(&self, column: &str) -> &str {
        self.columns.get(column).map_or("", String::as_str)
    }
}

/// Handle for one read-modify-write unit of work.
///
/// A handle is owned by exactly one operation attempt and never shared.
pub trait Transaction: Send {
    /// Stable identifier used in log events.
    fn id(&self) -> &str;
    fn get(&mut self, key: &RowKey) -> StoreResult<Option<Row>>;
    fn scan(&mut self, spec: &ScanSpec) -> StoreResult<Vec<Row>>;
    fn put(&mut self, key: RowKey, columns: Columns) -> StoreResult<()>;
    fn delete(&mut self, key: RowKey) -> StoreResult<()>;
    fn commit(&mut self) -> StoreResult<()>;
    /// Discards buffered writes. Safe to call after a failed commit.
    fn abort(&mut self) -> StoreResult<()>;
}

/// Source of fresh transactions.
pub trait TransactionManager: Send + Sync {
    fn start(&self) -> StoreResult<Box<dyn Transaction>>;
}

impl<M: TransactionManager + ?Sized> TransactionManager for Arc<M> {
    fn start(&self) -> StoreResult<Box<dyn Transaction>> {
        (**self).start()
    }
}

/// How the retry coordinator must treat a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Restart the whole read-modify-write sequence.
    Retryable,
    /// The commit may or may not have been applied.
    Ambiguous,
    /// Abort and surface immediately.
    Fatal,
}

/// Storage-level failure.
#[derive(Debug)]
pub enum StoreError {
    /// A transaction could not be started.
    StartFailed(String),
    /// A concurrent commit changed a row this transaction read.
    Conflict { key: String },
    /// The store rejected the commit for a reason other than a conflict.
    CommitFault(String),
    /// The commit outcome could not be determined.
    UnknownOutcome(String),
    /// Underlying SQLite failure.
    Db(DbError),
    /// A stored row could not be decoded.
    InvalidRow { key: String, message: String },
    /// The transaction already committed or aborted.
    TransactionClosed,
}

impl StoreError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::StartFailed(_) | Self::Conflict { .. } => FailureClass::Retryable,
            Self::UnknownOutcome(_) => FailureClass::Ambiguous,
            Self::CommitFault(_)
            | Self::Db(_)
            | Self::InvalidRow { .. }
            | Self::TransactionClosed => FailureClass::Fatal,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartFailed(message) => write!(f, "transaction start failed: {message}"),
            Self::Conflict { key } => write!(f, "optimistic conflict on {key}"),
            Self::CommitFault(message) => write!(f, "commit failed: {message}"),
            Self::UnknownOutcome(message) => {
                write!(f, "transaction outcome unknown: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidRow { key, message } => write!(f, "invalid row {key}: {message}"),
            Self::TransactionClosed => write!(f, "transaction already finished"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{Columns, FailureClass, RowKey, ScanSpec, StoreError, COMMON_KEY_COLUMN};

    #[test]
    fn conflicts_and_start_failures_are_retryable() {
        let conflict = StoreError::Conflict {
            key: "demo.groups/g1".to_string(),
        };
        assert_eq!(conflict.class(), FailureClass::Retryable);
        assert_eq!(
            StoreError::StartFailed("busy".to_string()).class(),
            FailureClass::Retryable
        );
        assert_eq!(
            StoreError::CommitFault("disk".to_string()).class(),
            FailureClass::Fatal
        );
        assert_eq!(
            StoreError::UnknownOutcome("timeout".to_string()).class(),
            FailureClass::Ambiguous
        );
    }

    #[test]
    fn scan_spec_matches_on_table_and_common_key() {
        let spec = ScanSpec::new("demo", "users", "common_key");
        let mut columns = Columns::new();
        columns.insert(COMMON_KEY_COLUMN.to_string(), "common_key".to_string());

        assert!(spec.matches(&RowKey::new("demo", "users", "u1"), &columns));
        assert!(!spec.matches(&RowKey::new("demo", "groups", "u1"), &columns));

        columns.insert(COMMON_KEY_COLUMN.to_string(), "other".to_string());
        assert!(!spec.matches(&RowKey::new("demo", "users", "u1"), &columns));
    }
}
