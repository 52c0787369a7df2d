//! Collection (group / movie) use-case service.
//!
//! # Responsibility
//! - Create and delete collections, add and remove members, list them.
//! - Keep the collection member list and every affected user's membership
//!   list consistent inside one transaction per use case.
//!
//! # Invariants
//! - `user ∈ members(c)` iff `c ∈ memberships(user)` after every commit.
//! - A user appears at most once per member list and a collection at most
//!   once per membership list.
//! - The collection-side write is buffered before the user-side write; both
//!   land in the same commit.

use super::error::{ServiceError, ServiceResult};
use super::require_non_blank;
use super::retry::{run_in_transaction, RetryPolicy};
use crate::model::collection::{Collection, CollectionKind, Member, NewCollection};
use crate::model::user::Membership;
use crate::model::{new_entity_id, EntityId};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::EntityRepository;
use crate::store::{Transaction, TransactionManager};
use log::info;

/// Membership orchestration for one collection kind.
pub struct CollectionService<M: TransactionManager> {
    manager: M,
    collections: CollectionRepository,
    users: UserRepository,
    policy: RetryPolicy,
}

impl<M: TransactionManager> CollectionService<M> {
    /// Creates a service with the default retry policy.
    pub fn new(manager: M, kind: CollectionKind) -> Self {
        Self::with_policy(manager, kind, RetryPolicy::default())
    }

    pub fn with_policy(manager: M, kind: CollectionKind, policy: RetryPolicy) -> Self {
        Self {
            manager,
            collections: CollectionRepository::new(kind),
            users: UserRepository::new(),
            policy,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.collections.kind()
    }

    /// Creates a collection with `creator_user_id` as its sole admin member.
    ///
    /// Returns the generated collection id.
    pub fn create_collection(&self, name: &str, creator_user_id: &str) -> ServiceResult<EntityId> {
        require_non_blank(name, "collection name")?;
        require_non_blank(creator_user_id, "creator user id")?;
        let kind = self.kind();

        let collection_id = run_in_transaction(
            &self.manager,
            &self.policy,
            "create_collection",
            |tx| {
                let collection_id = new_entity_id();
                self.collections.create(
                    tx,
                    &collection_id,
                    NewCollection {
                        name: name.to_string(),
                        members: vec![Member::new(creator_user_id, kind.creator_role())],
                    },
                )?;

                let mut creator = self.users.get(tx, creator_user_id)?;
                creator.add_membership(kind, Membership::new(collection_id.as_str(), name));
                self.users.replace(tx, &creator)?;
                Ok(collection_id)
            },
        )?;

        info!(
            "event=collection_create module=service status=ok kind={kind} collection_id={collection_id} creator_id={creator_user_id}"
        );
        Ok(collection_id)
    }

    /// Adds `user_id` to the collection with `role`.
    ///
    /// # Errors
    /// - `AlreadyBelongs` when the user is already a member.
    /// - `NotFound` when the collection or the user does not exist.
    pub fn add_member(&self, collection_id: &str, user_id: &str, role: &str) -> ServiceResult<()> {
        require_non_blank(user_id, "user id")?;
        require_non_blank(role, "role")?;
        let kind = self.kind();

        run_in_transaction(&self.manager, &self.policy, "add_member", |tx| {
            let mut collection = self.collections.get(tx, collection_id)?;
            if collection.has_member(user_id) {
                return Err(ServiceError::AlreadyBelongs {
                    kind,
                    collection_id: collection_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
            collection.members.push(Member::new(user_id, role));
            self.collections.replace(tx, &collection)?;

            let mut user = self.users.get(tx, user_id)?;
            user.add_membership(
                kind,
                Membership::new(collection.id.as_str(), collection.name.as_str()),
            );
            self.users.replace(tx, &user)?;
            Ok(())
        })?;

        info!(
            "event=member_add module=service status=ok kind={kind} collection_id={collection_id} user_id={user_id} role={role}"
        );
        Ok(())
    }

    /// Removes `user_id` from the collection.
    ///
    /// # Errors
    /// - `NotBelonging` when the user is not a member.
    /// - `NotFound` when the collection or the user does not exist.
    pub fn remove_member(&self, collection_id: &str, user_id: &str) -> ServiceResult<()> {
        let kind = self.kind();

        run_in_transaction(&self.manager, &self.policy, "remove_member", |tx| {
            let mut collection = self.collections.get(tx, collection_id)?;
            if !collection.remove_member(user_id) {
                return Err(ServiceError::NotBelonging {
                    kind,
                    collection_id: collection_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
            self.collections.replace(tx, &collection)?;

            let mut user = self.users.get(tx, user_id)?;
            user.remove_membership(kind, collection_id);
            self.users.replace(tx, &user)?;
            Ok(())
        })?;

        info!(
            "event=member_remove module=service status=ok kind={kind} collection_id={collection_id} user_id={user_id}"
        );
        Ok(())
    }

    /// Deletes the collection and strips it from every member's memberships.
    pub fn delete_collection(&self, collection_id: &str) -> ServiceResult<()> {
        let kind = self.kind();

        let cascaded = run_in_transaction(&self.manager, &self.policy, "delete_collection", |tx| {
            let collection = self.collections.get(tx, collection_id)?;
            for member in &collection.members {
                self.strip_membership(tx, &member.user_id, collection_id)?;
            }
            self.collections.delete(tx, collection_id)?;
            Ok(collection.members.len())
        })?;

        info!(
            "event=collection_delete module=service status=ok kind={kind} collection_id={collection_id} cascaded_users={cascaded}"
        );
        Ok(())
    }

    pub fn get_collection(&self, collection_id: &str) -> ServiceResult<Collection> {
        run_in_transaction(&self.manager, &self.policy, "get_collection", |tx| {
            Ok(self.collections.get(tx, collection_id)?)
        })
    }

    pub fn list_collections(&self) -> ServiceResult<Vec<Collection>> {
        run_in_transaction(&self.manager, &self.policy, "list_collections", |tx| {
            Ok(self.collections.list(tx)?)
        })
    }

    /// Lists the members of one collection in insertion order.
    pub fn list_members(&self, collection_id: &str) -> ServiceResult<Vec<Member>> {
        run_in_transaction(&self.manager, &self.policy, "list_members", |tx| {
            Ok(self.collections.get(tx, collection_id)?.members)
        })
    }

    fn strip_membership(
        &self,
        tx: &mut dyn Transaction,
        user_id: &str,
        collection_id: &str,
    ) -> ServiceResult<()> {
        let mut user = self.users.get(tx, user_id)?;
        user.remove_membership(self.kind(), collection_id);
        self.users.replace(tx, &user)?;
        Ok(())
    }
}
