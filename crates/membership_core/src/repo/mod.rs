//! Entity repositories over the transactional row store.
//!
//! # Responsibility
//! - Translate one logical entity to and from one store row.
//! - Enforce existence (`NotFound`) and absence (`AlreadyExists`)
//!   preconditions before buffering writes.
//!
//! # Invariants
//! - Every write re-specifies every column of the row, including
//!   `common_key`; there is no partial-column update.
//! - Repositories never touch each other's rows. Cross-entity sequencing
//!   belongs to the service layer.
//! - Nothing written here is durable until the enclosing transaction commits.

pub mod codec;
pub mod collection_repo;
pub mod user_repo;

use crate::model::{EntityId, EntityKind};
use crate::store::{Columns, Row, RowKey, ScanSpec, StoreError, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Namespace holding every table of this crate.
pub const NAMESPACE: &str = "demo";

/// Value of `common_key` shared by every row of a table.
pub const COMMON_KEY: &str = "common_key";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity reads and writes.
#[derive(Debug)]
pub enum RepoError {
    NotFound { entity: EntityKind, id: EntityId },
    AlreadyExists { entity: EntityKind, id: EntityId },
    /// A stored nested blob could not be decoded or encoded.
    InvalidData(String),
    Store(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::AlreadyExists { entity, id } => write!(f, "{entity} already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Row mapping for one entity type plus the shared CRUD code path.
///
/// Implementors supply keys and the encode/decode pair; `get`, `create`,
/// `replace`, `delete` and `list` are provided.
pub trait EntityRepository {
    type Entity;
    /// Caller-supplied fields for `create`.
    type Fields;

    fn entity_kind(&self) -> EntityKind;
    fn row_key(&self, id: &str) -> RowKey;
    fn scan_spec(&self) -> ScanSpec;
    fn entity_id<'a>(&self, entity: &'a Self::Entity) -> &'a str;
    fn build(&self, id: &str, fields: Self::Fields) -> Self::Entity;
    fn encode(&self, entity: &Self::Entity) -> RepoResult<Columns>;
    fn decode(&self, row: &Row) -> RepoResult<Self::Entity>;

    /// Loads one entity, failing with `NotFound` when absent.
    fn get(&self, tx: &mut dyn Transaction, id: &str) -> RepoResult<Self::Entity> {
        match tx.get(&self.row_key(id))? {
            Some(row) => self.decode(&row),
            None => Err(self.not_found(id)),
        }
    }

    /// Buffers a full new row, failing with `AlreadyExists` on id collision.
    fn create(
        &self,
        tx: &mut dyn Transaction,
        id: &str,
        fields: Self::Fields,
    ) -> RepoResult<Self::Entity> {
        let key = self.row_key(id);
        if tx.get(&key)?.is_some() {
            return Err(RepoError::AlreadyExists {
                entity: self.entity_kind(),
                id: id.to_string(),
            });
        }
        let entity = self.build(id, fields);
        tx.put(key, self.encode(&entity)?)?;
        Ok(entity)
    }

    /// Overwrites every column of an existing row.
    fn replace(&self, tx: &mut dyn Transaction, entity: &Self::Entity) -> RepoResult<()> {
        let id = self.entity_id(entity);
        let key = self.row_key(id);
        if tx.get(&key)?.is_none() {
            return Err(self.not_found(id));
        }
        tx.put(key, self.encode(entity)?)?;
        Ok(())
    }

    /// Deletes an existing row, failing with `NotFound` when absent.
    fn delete(&self, tx: &mut dyn Transaction, id: &str) -> RepoResult<()> {
        let key = self.row_key(id);
        if tx.get(&key)?.is_none() {
            return Err(self.not_found(id));
        }
        tx.delete(key)?;
        Ok(())
    }

    /// Full-table scan over the shared partition discriminator.
    fn list(&self, tx: &mut dyn Transaction) -> RepoResult<Vec<Self::Entity>> {
        tx.scan(&self.scan_spec())?
            .iter()
            .map(|row| self.decode(row))
            .collect()
    }

    fn not_found(&self, id: &str) -> RepoError {
        RepoError::NotFound {
            entity: self.entity_kind(),
            id: id.to_string(),
        }
    }
}
