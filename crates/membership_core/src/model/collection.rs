//! Collection (group / movie) model.
//!
//! Groups and movies share one shape; `CollectionKind` carries everything
//! that differs between them (table, column names, role vocabulary).

use super::{EntityId, EntityKind};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    Group,
    Movie,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Group, CollectionKind::Movie];

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Group => EntityKind::Group,
            Self::Movie => EntityKind::Movie,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Group => "groups",
            Self::Movie => "movies",
        }
    }

    pub fn name_column(self) -> &'static str {
        match self {
            Self::Group => "group_name",
            Self::Movie => "movie_name",
        }
    }

    pub fn members_column(self) -> &'static str {
        match self {
            Self::Group => "group_users",
            Self::Movie => "movie_users",
        }
    }

    /// Column of the user row listing memberships of this kind.
    pub fn membership_column(self) -> &'static str {
        match self {
            Self::Group => "user_groups",
            Self::Movie => "user_movies",
        }
    }

    /// Role granted to the user who creates a collection.
    pub fn creator_role(self) -> &'static str {
        "admin"
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entity_kind().as_str())
    }
}

/// Collection-side half of a membership edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: EntityId,
    /// Free-form role, e.g. `admin`.
    pub role: String,
}

impl Member {
    pub fn new(user_id: impl Into<EntityId>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

/// A group or movie with its embedded member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: EntityId,
    pub kind: CollectionKind,
    pub name: String,
    /// Insertion-ordered; a user appears at most once.
    pub members: Vec<Member>,
}

impl Collection {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member.user_id == user_id)
    }

    /// Removes the member edge for `user_id`. Returns whether one existed.
    pub fn remove_member(&mut self, user_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member.user_id != user_id);
        self.members.len() != before
    }
}

/// Caller-supplied fields for a new collection row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
    pub members: Vec<Member>,
}

#[cfg(test)]
mod tests {
    use super::{Collection, CollectionKind, Member};

    #[test]
    fn remove_member_reports_whether_edge_existed() {
        let mut collection = Collection {
            id: "g1".to_string(),
            kind: CollectionKind::Group,
            name: "Admins".to_string(),
            members: vec![Member::new("u1", "admin"), Member::new("u2", "member")],
        };

        assert!(collection.remove_member("u1"));
        assert!(!collection.remove_member("u1"));
        assert_eq!(collection.members, vec![Member::new("u2", "member")]);
        assert!(!collection.has_member("u1"));
        assert!(collection.has_member("u2"));
    }

    #[test]
    fn kinds_use_distinct_tables_and_columns() {
        assert_ne!(
            CollectionKind::Group.table(),
            CollectionKind::Movie.table()
        );
        assert_eq!(CollectionKind::Movie.membership_column(), "user_movies");
        assert_eq!(CollectionKind::Group.to_string(), "group");
    }
}
