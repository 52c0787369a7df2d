//! Domain model for users and their collections.
//!
//! # Responsibility
//! - Define the in-memory shapes the repositories decode rows into.
//! - Describe both collection kinds (groups, movies) with one type.
//!
//! # Invariants
//! - Every entity is identified by an opaque string id (a v4 UUID when
//!   generated by this crate).
//! - A membership edge is stored twice: once in `Collection::members`, once
//!   in the user's membership list for the collection's kind.
//! - Domain types carry no serialization concerns; see `repo::codec`.

pub mod collection;
pub mod user;

use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque entity identifier.
pub type EntityId = String;

/// Generates a fresh random entity id.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// Entity type, used in not-found / already-exists errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Group,
    Movie,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Movie => "movie",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
