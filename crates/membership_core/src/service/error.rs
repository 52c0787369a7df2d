//! Service error taxonomy.
//!
//! Every use case returns exactly one terminal `ServiceError`; callers map
//! `ServiceError::kind` to a transport response.

use crate::model::collection::CollectionKind;
use crate::model::{EntityId, EntityKind};
use crate::repo::RepoError;
use crate::store::{FailureClass, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyExists,
    AlreadyBelongs,
    NotBelonging,
    Storage,
    Exhausted,
}

#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before any transaction started.
    InvalidInput(String),
    NotFound {
        entity: EntityKind,
        id: EntityId,
    },
    AlreadyExists {
        entity: EntityKind,
        id: EntityId,
    },
    /// The user is already a member of the collection.
    AlreadyBelongs {
        kind: CollectionKind,
        collection_id: EntityId,
        user_id: EntityId,
    },
    /// The user is not a member of the collection.
    NotBelonging {
        kind: CollectionKind,
        collection_id: EntityId,
        user_id: EntityId,
    },
    /// Persisted nested data could not be decoded.
    InvalidData(String),
    Store(StoreError),
    /// Every allowed attempt ended in a retryable failure.
    Exhausted {
        operation: &'static str,
        attempts: u32,
        last_error: Box<ServiceError>,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AlreadyBelongs { .. } => ErrorKind::AlreadyBelongs,
            Self::NotBelonging { .. } => ErrorKind::NotBelonging,
            Self::InvalidData(_) | Self::Store(_) => ErrorKind::Storage,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }

    /// Retry classification. Only storage failures can be retryable.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Store(err) => err.class(),
            _ => FailureClass::Fatal,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::AlreadyExists { entity, id } => write!(f, "{entity} already exists: {id}"),
            Self::AlreadyBelongs {
                kind,
                collection_id,
                user_id,
            } => write!(
                f,
                "user {user_id} already belongs to {kind} {collection_id}"
            ),
            Self::NotBelonging {
                kind,
                collection_id,
                user_id,
            } => write!(f, "user {user_id} does not belong to {kind} {collection_id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Exhausted {
                operation,
                attempts,
                last_error,
            } => write!(
                f,
                "{operation} failed after {attempts} attempts: {last_error}"
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Exhausted { last_error, .. } => Some(last_error.as_ref()),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::AlreadyExists { entity, id } => Self::AlreadyExists { entity, id },
            RepoError::InvalidData(message) => Self::InvalidData(message),
            RepoError::Store(err) => Self::Store(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ServiceError};
    use crate::model::EntityKind;
    use crate::repo::RepoError;
    use crate::store::{FailureClass, StoreError};

    #[test]
    fn repo_errors_keep_their_classification() {
        let not_found: ServiceError = RepoError::NotFound {
            entity: EntityKind::Group,
            id: "g1".to_string(),
        }
        .into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.failure_class(), FailureClass::Fatal);

        let conflict: ServiceError = RepoError::Store(StoreError::Conflict {
            key: "demo.groups/g1".to_string(),
        })
        .into();
        assert_eq!(conflict.kind(), ErrorKind::Storage);
        assert_eq!(conflict.failure_class(), FailureClass::Retryable);
    }
}
