//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into multi-entity use cases.
//! - Run every use case as one transaction under the retry coordinator.
//!
//! # Invariants
//! - A membership edge is written on both sides (collection members and
//!   user memberships) inside the same transaction, or not at all.
//! - Services are the only writers of edge state.

pub mod collection_service;
pub mod error;
pub mod retry;
pub mod user_service;

use crate::model::user::UserProfile;
use error::{ServiceError, ServiceResult};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

fn require_non_blank(value: &str, field: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(())
}

fn require_email(value: &str) -> ServiceResult<()> {
    if !EMAIL_RE.is_match(value) {
        return Err(ServiceError::InvalidInput(format!(
            "email `{value}` is not a valid address"
        )));
    }
    Ok(())
}

/// Trims the email and validates it. The trimmed value is what gets stored.
fn normalize_profile(mut profile: UserProfile) -> ServiceResult<UserProfile> {
    profile.email = profile.email.trim().to_string();
    require_email(&profile.email)?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::{normalize_profile, require_email, require_non_blank};
    use crate::model::user::UserProfile;

    #[test]
    fn email_check_accepts_plain_addresses_only() {
        assert!(require_email("ada@example.com").is_ok());
        assert!(require_email("ada@localhost").is_err());
        assert!(require_email("not an email").is_err());
        assert!(require_email("").is_err());
    }

    #[test]
    fn normalize_profile_trims_email() {
        let profile = normalize_profile(UserProfile::with_email("  ada@example.com\n")).unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert!(normalize_profile(UserProfile::with_email("   ")).is_err());
    }

    #[test]
    fn blank_values_are_rejected() {
        assert!(require_non_blank("  ", "name").is_err());
        assert!(require_non_blank("Admins", "name").is_ok());
    }
}
