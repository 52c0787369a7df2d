//! Nested-column codec.
//!
//! Member lists, membership lists and the user detail block are each stored
//! as one JSON text column and re-encoded wholesale on every write.
//!
//! # Invariants
//! - An empty column (or JSON `null`) decodes to an empty list / no detail.
//! - Encoding no detail yields an empty column.

use super::{RepoError, RepoResult};
use crate::model::collection::Member;
use crate::model::user::{Membership, UserDetail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct MemberRecord {
    user_id: String,
    #[serde(rename = "type")]
    role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MembershipRecord {
    collection_id: String,
    collection_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDetailRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
}

pub fn encode_members(members: &[Member]) -> RepoResult<String> {
    let records: Vec<MemberRecord> = members
        .iter()
        .map(|member| MemberRecord {
            user_id: member.user_id.clone(),
            role: member.role.clone(),
        })
        .collect();
    encode_json("members", &records)
}

pub fn decode_members(raw: &str) -> RepoResult<Vec<Member>> {
    let records: Option<Vec<MemberRecord>> = decode_json("members", raw)?;
    Ok(records
        .unwrap_or_default()
        .into_iter()
        .map(|record| Member {
            user_id: record.user_id,
            role: record.role,
        })
        .collect())
}

pub fn encode_memberships(memberships: &[Membership]) -> RepoResult<String> {
    let records: Vec<MembershipRecord> = memberships
        .iter()
        .map(|membership| MembershipRecord {
            collection_id: membership.collection_id.clone(),
            collection_name: membership.collection_name.clone(),
        })
        .collect();
    encode_json("memberships", &records)
}

pub fn decode_memberships(raw: &str) -> RepoResult<Vec<Membership>> {
    let records: Option<Vec<MembershipRecord>> = decode_json("memberships", raw)?;
    Ok(records
        .unwrap_or_default()
        .into_iter()
        .map(|record| Membership {
            collection_id: record.collection_id,
            collection_name: record.collection_name,
        })
        .collect())
}

pub fn encode_detail(detail: Option<&UserDetail>) -> RepoResult<String> {
    match detail {
        Some(detail) => encode_json(
            "user_detail",
            &UserDetailRecord {
                preferred_language: detail.preferred_language.clone(),
                phone_number: detail.phone_number.clone(),
            },
        ),
        None => Ok(String::new()),
    }
}

pub fn decode_detail(raw: &str) -> RepoResult<Option<UserDetail>> {
    let record: Option<UserDetailRecord> = decode_json("user_detail", raw)?;
    Ok(record.map(|record| UserDetail {
        preferred_language: record.preferred_language,
        phone_number: record.phone_number,
    }))
}

fn encode_json<T: Serialize>(what: &str, value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {what}: {err}")))
}

fn decode_json<T: DeserializeOwned>(what: &str, raw: &str) -> RepoResult<Option<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<T>>(trimmed)
        .map_err(|err| RepoError::InvalidData(format!("cannot decode {what}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{
        decode_detail, decode_members, decode_memberships, encode_detail, encode_members,
    };
    use crate::model::collection::Member;
    use crate::model::user::UserDetail;
    use crate::repo::RepoError;

    #[test]
    fn empty_and_null_columns_decode_to_nothing() {
        assert!(decode_members("").unwrap().is_empty());
        assert!(decode_memberships("null").unwrap().is_empty());
        assert_eq!(decode_detail("  ").unwrap(), None);
    }

    #[test]
    fn member_role_is_stored_under_type_key() {
        let encoded = encode_members(&[Member::new("u1", "admin")]).unwrap();
        assert_eq!(encoded, r#"[{"user_id":"u1","type":"admin"}]"#);
        assert_eq!(
            decode_members(&encoded).unwrap(),
            vec![Member::new("u1", "admin")]
        );
    }

    #[test]
    fn detail_omits_unset_fields() {
        let detail = UserDetail {
            preferred_language: Some("ja".to_string()),
            phone_number: None,
        };
        let encoded = encode_detail(Some(&detail)).unwrap();
        assert_eq!(encoded, r#"{"preferred_language":"ja"}"#);
        assert_eq!(encode_detail(None).unwrap(), "");
    }

    #[test]
    fn malformed_blob_is_invalid_data() {
        let err = decode_members("{not json").unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
