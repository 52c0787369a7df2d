//! Core domain logic for the membership backend.
//! Users, groups and movies with a bidirectional membership relation kept
//! consistent by transactional use cases.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, RetryPolicyConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::collection::{Collection, CollectionKind, Member};
pub use model::user::{Membership, User, UserDetail, UserProfile};
pub use model::{EntityId, EntityKind};
pub use repo::{EntityRepository, RepoError, RepoResult};
pub use service::collection_service::CollectionService;
pub use service::error::{ErrorKind, ServiceError, ServiceResult};
pub use service::retry::{run_in_transaction, RetryPolicy};
pub use service::user_service::UserService;
pub use store::{SqliteStore, StoreError, Transaction, TransactionManager};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
