//! User row mapping.
//!
//! One row per user in `demo.users`. Both membership lists and the detail
//! block are nested JSON columns.

use super::codec::{
    decode_detail, decode_memberships, encode_detail, encode_memberships,
};
use super::{EntityRepository, RepoResult, COMMON_KEY, NAMESPACE};
use crate::model::collection::CollectionKind;
use crate::model::user::{User, UserProfile};
use crate::model::EntityKind;
use crate::store::{Columns, Row, RowKey, ScanSpec, COMMON_KEY_COLUMN};

pub const USERS_TABLE: &str = "users";

const EMAIL: &str = "email";
const FAMILY_NAME: &str = "family_name";
const GIVEN_NAME: &str = "given_name";
const USER_DETAIL: &str = "user_detail";

/// Repository for `User` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }
}

impl EntityRepository for UserRepository {
    type Entity = User;
    type Fields = UserProfile;

    fn entity_kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn row_key(&self, id: &str) -> RowKey {
        RowKey::new(NAMESPACE, USERS_TABLE, id)
    }

    fn scan_spec(&self) -> ScanSpec {
        ScanSpec::new(NAMESPACE, USERS_TABLE, COMMON_KEY)
    }

    fn entity_id<'a>(&self, entity: &'a User) -> &'a str {
        &entity.id
    }

    fn build(&self, id: &str, fields: UserProfile) -> User {
        User::from_profile(id, fields)
    }

    fn encode(&self, user: &User) -> RepoResult<Columns> {
        let mut columns = Columns::new();
        columns.insert(EMAIL.to_string(), user.email.clone());
        columns.insert(FAMILY_NAME.to_string(), user.family_name.clone());
        columns.insert(GIVEN_NAME.to_string(), user.given_name.clone());
        columns.insert(USER_DETAIL.to_string(), encode_detail(user.detail.as_ref())?);
        for kind in CollectionKind::ALL {
            columns.insert(
                kind.membership_column().to_string(),
                encode_memberships(user.memberships(kind))?,
            );
        }
        columns.insert(COMMON_KEY_COLUMN.to_string(), COMMON_KEY.to_string());
        Ok(columns)
    }

    fn decode(&self, row: &Row) -> RepoResult<User> {
        Ok(User {
            id: row.key.id.clone(),
            email: row.text(EMAIL).to_string(),
            family_name: row.text(FAMILY_NAME).to_string(),
            given_name: row.text(GIVEN_NAME).to_string(),
            detail: decode_detail(row.text(USER_DETAIL))?,
            groups: decode_memberships(row.text(CollectionKind::Group.membership_column()))?,
            movies: decode_memberships(row.text(CollectionKind::Movie.membership_column()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::UserRepository;
    use crate::model::collection::CollectionKind;
    use crate::model::user::{Membership, UserDetail, UserProfile};
    use crate::model::EntityKind;
    use crate::repo::{EntityRepository, RepoError};
    use crate::store::{SqliteStore, TransactionManager};

    #[test]
    fn create_then_get_preserves_every_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = UserRepository::new();
        let mut tx = store.start().unwrap();

        let profile = UserProfile {
            email: "ada@example.com".to_string(),
            family_name: "Lovelace".to_string(),
            given_name: "Ada".to_string(),
            detail: Some(UserDetail {
                preferred_language: Some("en".to_string()),
                phone_number: Some("555-0100".to_string()),
            }),
        };
        let mut created = repo.create(tx.as_mut(), "u1", profile).unwrap();
        created.add_membership(CollectionKind::Movie, Membership::new("m1", "Heat"));
        repo.replace(tx.as_mut(), &created).unwrap();
        tx.commit().unwrap();

        let mut tx = store.start().unwrap();
        let loaded = repo.get(tx.as_mut(), "u1").unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn create_rejects_existing_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = UserRepository::new();
        let mut tx = store.start().unwrap();
        repo.create(tx.as_mut(), "u1", UserProfile::with_email("a@example.com"))
            .unwrap();

        let err = repo
            .create(tx.as_mut(), "u1", UserProfile::with_email("b@example.com"))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::AlreadyExists {
                entity: EntityKind::User,
                ..
            }
        ));
    }

    #[test]
    fn delete_and_replace_require_existing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = UserRepository::new();
        let mut tx = store.start().unwrap();

        assert!(matches!(
            repo.delete(tx.as_mut(), "missing").unwrap_err(),
            RepoError::NotFound { .. }
        ));
        let ghost = repo.build("ghost", UserProfile::default());
        assert!(matches!(
            repo.replace(tx.as_mut(), &ghost).unwrap_err(),
            RepoError::NotFound { .. }
        ));
    }
}
