//! User model.

use super::collection::CollectionKind;
use super::EntityId;

/// User-side half of a membership edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub collection_id: EntityId,
    pub collection_name: String,
}

impl Membership {
    pub fn new(collection_id: impl Into<EntityId>, collection_name: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            collection_name: collection_name.into(),
        }
    }
}

/// Optional profile block stored as one nested column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDetail {
    pub preferred_language: Option<String>,
    pub phone_number: Option<String>,
}

/// Caller-supplied profile fields for create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub family_name: String,
    pub given_name: String,
    pub detail: Option<UserDetail>,
}

impl UserProfile {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub family_name: String,
    pub given_name: String,
    pub detail: Option<UserDetail>,
    pub groups: Vec<Membership>,
    pub movies: Vec<Membership>,
}

impl User {
    /// Builds a user with no memberships.
    pub fn from_profile(id: impl Into<EntityId>, profile: UserProfile) -> Self {
        Self {
            id: id.into(),
            email: profile.email,
            family_name: profile.family_name,
            given_name: profile.given_name,
            detail: profile.detail,
            groups: Vec::new(),
            movies: Vec::new(),
        }
    }

    pub fn memberships(&self, kind: CollectionKind) -> &[Membership] {
        match kind {
            CollectionKind::Group => &self.groups,
            CollectionKind::Movie => &self.movies,
        }
    }

    pub fn memberships_mut(&mut self, kind: CollectionKind) -> &mut Vec<Membership> {
        match kind {
            CollectionKind::Group => &mut self.groups,
            CollectionKind::Movie => &mut self.movies,
        }
    }

    pub fn belongs_to(&self, kind: CollectionKind, collection_id: &str) -> bool {
        self.memberships(kind)
            .iter()
            .any(|membership| membership.collection_id == collection_id)
    }

    /// Appends a membership unless one for the same collection exists.
    pub fn add_membership(&mut self, kind: CollectionKind, membership: Membership) {
        if !self.belongs_to(kind, &membership.collection_id) {
            self.memberships_mut(kind).push(membership);
        }
    }

    /// Removes the membership for `collection_id`. Returns whether one existed.
    pub fn remove_membership(&mut self, kind: CollectionKind, collection_id: &str) -> bool {
        let memberships = self.memberships_mut(kind);
        let before = memberships.len();
        memberships.retain(|membership| membership.collection_id != collection_id);
        memberships.len() != before
    }

    /// Replaces profile fields, keeping memberships untouched.
    pub fn apply_profile(&mut self, profile: UserProfile) {
        self.email = profile.email;
        self.family_name = profile.family_name;
        self.given_name = profile.given_name;
        self.detail = profile.detail;
    }
}
