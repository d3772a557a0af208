//! Username derivation for accounts entering the local system.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use utils::api::directory::Profile;

#[derive(Debug, Error)]
pub enum UsernameError {
    #[error("first name, last name, and email are required to create a username")]
    MissingFields,
    #[error("username '{0}' already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Read side of the local user store. The sync layer only ever checks
/// whether a username is taken; writing records is the caller's job.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn username_exists(&self, username: &str) -> Result<bool>;
}

/// Derives the username for a new user: the email address, lower-cased.
///
/// Validates only, nothing is reserved. Fails when first name, last name, or
/// email is missing or empty, or when the derived username is already taken
/// locally.
pub async fn create_username(
    profile: &Profile,
    users: &dyn UserStore,
) -> Result<String, UsernameError> {
    if profile.get_str("first_name").is_none() || profile.get_str("last_name").is_none() {
        return Err(UsernameError::MissingFields);
    }
    let email = profile.get_str("email").ok_or(UsernameError::MissingFields)?;

    let username = email.to_lowercase();
    if users.username_exists(&username).await? {
        return Err(UsernameError::AlreadyExists(username));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedUsers(Vec<&'static str>);

    #[async_trait]
    impl UserStore for FixedUsers {
        async fn username_exists(&self, username: &str) -> Result<bool> {
            Ok(self.0.contains(&username))
        }
    }

    fn ada() -> Profile {
        let mut profile = Profile::new();
        profile.insert("first_name", "Ada");
        profile.insert("last_name", "Lovelace");
        profile.insert("email", "Ada@Example.com");
        profile
    }

    #[tokio::test]
    async fn username_is_the_email_lower_cased() {
        let users = FixedUsers(vec![]);
        let username = create_username(&ada(), &users).await.unwrap();
        assert_eq!(username, "ada@example.com");
    }

    #[tokio::test]
    async fn taken_username_is_rejected() {
        let users = FixedUsers(vec!["ada@example.com"]);
        let err = create_username(&ada(), &users).await.unwrap_err();
        assert!(matches!(err, UsernameError::AlreadyExists(u) if u == "ada@example.com"));
    }

    #[tokio::test]
    async fn collision_wins_regardless_of_other_fields() {
        let users = FixedUsers(vec!["ada@example.com"]);
        let mut profile = ada();
        profile.insert("title", "Countess");
        profile.insert("roles", serde_json::json!(["reviewer", "applicant"]));

        let err = create_username(&profile, &users).await.unwrap_err();
        assert!(matches!(err, UsernameError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected() {
        let users = FixedUsers(vec![]);
        for field in ["first_name", "last_name", "email"] {
            let mut profile = ada();
            profile.insert(field, serde_json::Value::Null);
            let err = create_username(&profile, &users).await.unwrap_err();
            assert!(matches!(err, UsernameError::MissingFields), "{field}");
        }
    }

    #[tokio::test]
    async fn empty_required_fields_count_as_missing() {
        let users = FixedUsers(vec![]);
        let mut profile = ada();
        profile.insert("first_name", "");
        let err = create_username(&profile, &users).await.unwrap_err();
        assert!(matches!(err, UsernameError::MissingFields));
    }
}
