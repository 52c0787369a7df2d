//! User use-case service.
//!
//! # Responsibility
//! - Create, update, read, list and delete users.
//! - Cascade user deletion into the member list of every collection the
//!   user belonged to, for both collection kinds.
//!
//! # Invariants
//! - Users are created with no memberships.
//! - Profile updates never touch membership lists.

use super::error::ServiceResult;
use super::retry::{run_in_transaction, RetryPolicy};
use super::{normalize_profile, require_non_blank};
use crate::model::collection::CollectionKind;
use crate::model::user::{User, UserProfile};
use crate::model::{new_entity_id, EntityId};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::EntityRepository;
use crate::store::TransactionManager;
use log::info;

pub struct UserService<M: TransactionManager> {
    manager: M,
    users: UserRepository,
    policy: RetryPolicy,
}

impl<M: TransactionManager> UserService<M> {
    pub fn new(manager: M) -> Self {
        Self::with_policy(manager, RetryPolicy::default())
    }

    pub fn with_policy(manager: M, policy: RetryPolicy) -> Self {
        Self {
            manager,
            users: UserRepository::new(),
            policy,
        }
    }

    /// Creates a user with no memberships and returns its generated id.
    pub fn create_user(&self, profile: UserProfile) -> ServiceResult<EntityId> {
        let profile = normalize_profile(profile)?;

        let user_id = run_in_transaction(&self.manager, &self.policy, "create_user", |tx| {
            let user_id = new_entity_id();
            self.users.create(tx, &user_id, profile.clone())?;
            Ok(user_id)
        })?;

        info!("event=user_create module=service status=ok user_id={user_id}");
        Ok(user_id)
    }

    /// Replaces the profile fields of an existing user.
    pub fn update_user(&self, user_id: &str, profile: UserProfile) -> ServiceResult<()> {
        require_non_blank(user_id, "user id")?;
        let profile = normalize_profile(profile)?;

        run_in_transaction(&self.manager, &self.policy, "update_user", |tx| {
            let mut user = self.users.get(tx, user_id)?;
            user.apply_profile(profile.clone());
            self.users.replace(tx, &user)?;
            Ok(())
        })?;

        info!("event=user_update module=service status=ok user_id={user_id}");
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> ServiceResult<User> {
        run_in_transaction(&self.manager, &self.policy, "get_user", |tx| {
            Ok(self.users.get(tx, user_id)?)
        })
    }

    pub fn list_users(&self) -> ServiceResult<Vec<User>> {
        run_in_transaction(&self.manager, &self.policy, "list_users", |tx| {
            Ok(self.users.list(tx)?)
        })
    }

    /// Deletes the user and removes it from every collection it belonged to.
    pub fn delete_user(&self, user_id: &str) -> ServiceResult<()> {
        let cascaded = run_in_transaction(&self.manager, &self.policy, "delete_user", |tx| {
            let user = self.users.get(tx, user_id)?;
            let mut cascaded = 0usize;
            for kind in CollectionKind::ALL {
                let collections = CollectionRepository::new(kind);
                for membership in user.memberships(kind) {
                    let mut collection = collections.get(tx, &membership.collection_id)?;
                    collection.remove_member(user_id);
                    collections.replace(tx, &collection)?;
                    cascaded += 1;
                }
            }
            self.users.delete(tx, user_id)?;
            Ok(cascaded)
        })?;

        info!(
            "event=user_delete module=service status=ok user_id={user_id} cascaded_collections={cascaded}"
        );
        Ok(())
    }
}
