//! User entity and store trait.
//!
//! Maps to the `Users` table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::infrastructure::database::codec::StringMap;
use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Maximum length of `Users.Username`.
pub const USER_NAME_MAX_LENGTH: u64 = 64;

/// Maximum length of `Users.Email`.
pub const USER_EMAIL_MAX_LENGTH: u64 = 128;

/// A user account.
///
/// A user is a bot when a matching row exists in `Bots`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct User {
    #[validate(length(min = 1, max = 26))]
    pub id: String,

    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,

    /// Lower-case, unique.
    #[validate(length(min = 1, max = 64), custom(function = "validate_username"))]
    pub username: String,

    /// Password hash; never serialized.
    #[serde(skip_serializing, default)]
    #[validate(length(max = 128))]
    pub password: String,

    /// External identity; unique together with `auth_service` when present.
    #[validate(length(max = 128))]
    pub auth_data: Option<String>,

    #[validate(length(max = 32))]
    pub auth_service: String,

    /// Lower-case, unique.
    #[validate(length(min = 1, max = 128), custom(function = "validate_email"))]
    pub email: String,

    pub email_verified: bool,

    #[validate(length(max = 64))]
    pub nickname: String,

    #[validate(length(max = 64))]
    pub first_name: String,

    #[validate(length(max = 64))]
    pub last_name: String,

    #[validate(length(max = 128))]
    pub position: String,

    /// Space-separated role tokens.
    #[validate(length(max = 256))]
    pub roles: String,

    pub allow_marketing: bool,
    pub props: StringMap,
    pub notify_props: StringMap,
    pub last_password_update: i64,
    pub last_picture_update: i64,
    pub failed_attempts: i64,

    #[validate(length(max = 5))]
    pub locale: String,

    pub timezone: StringMap,
    pub mfa_active: bool,

    #[serde(skip_serializing, default)]
    pub mfa_secret: String,
}

impl User {
    /// Fill in id, timestamps and defaults before the first insert.
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
        self.last_password_update = self.create_at;
        self.username = self.username.to_lowercase();
        self.email = self.email.to_lowercase();
        if self.locale.is_empty() {
            self.locale = "en".to_string();
        }
        if self.auth_data.as_deref() == Some("") {
            self.auth_data = None;
        }
    }

    /// Normalize before an update.
    pub fn pre_update(&mut self) {
        self.username = self.username.to_lowercase();
        self.email = self.email.to_lowercase();
        self.update_at = get_millis();
        if self.auth_data.as_deref() == Some("") {
            self.auth_data = None;
        }
    }

    /// Whether an external identity provider manages this account.
    pub fn is_externally_managed(&self) -> bool {
        !self.auth_service.is_empty()
    }

    pub fn role_tokens(&self) -> Vec<&str> {
        self.roles.split_whitespace().collect()
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'));
    let starts_with_letter = username.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    if valid_chars && starts_with_letter {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(ValidationError::new("invalid_email")),
    }
}

/// Result of [`UserStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub old: User,
    pub new: User,
}

/// Limits which users a caller may see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUsersRestrictions {
    pub teams: Vec<String>,
    pub channels: Vec<String>,
}

/// Filters for [`UserStore::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserCountOptions {
    pub include_bot_accounts: bool,
    pub include_deleted: bool,
    pub exclude_regular_users: bool,
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
    pub view_restrictions: Option<ViewUsersRestrictions>,
    /// System role names, matched as substrings of `Roles`.
    pub roles: Vec<String>,
    /// Requires `channel_id`.
    pub channel_roles: Vec<String>,
    /// Requires `team_id`.
    pub team_roles: Vec<String>,
}

/// A user with the ids of its public channels and teams, for search indexing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserForIndexing {
    pub id: String,
    pub username: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: String,
    pub create_at: i64,
    pub delete_at: i64,
    pub team_ids: Vec<String>,
    pub channel_ids: Vec<String>,
}

/// Data access for users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Id and timestamps are generated when missing.
    async fn save(&self, user: &User) -> StoreResult<User>;

    /// Update a user, copying protected fields forward unless `trusted`.
    async fn update(&self, user: &User, trusted: bool) -> StoreResult<UserUpdate>;

    async fn get(&self, id: &str) -> StoreResult<User>;

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<User>>;

    async fn get_by_email(&self, email: &str) -> StoreResult<User>;

    async fn get_by_username(&self, username: &str) -> StoreResult<User>;

    async fn get_by_auth(&self, auth_data: &str, auth_service: &str) -> StoreResult<User>;

    async fn update_password(&self, user_id: &str, hashed_password: &str) -> StoreResult<()>;

    async fn update_failed_password_attempts(&self, user_id: &str, attempts: i64) -> StoreResult<()>;

    async fn update_mfa_secret(&self, user_id: &str, secret: &str) -> StoreResult<()>;

    async fn update_mfa_active(&self, user_id: &str, active: bool) -> StoreResult<()>;

    async fn update_last_picture_update(&self, user_id: &str, time: i64) -> StoreResult<()>;

    /// Switch the user to an external identity. Clears the password and the
    /// failed attempt counter; returns the user id.
    async fn update_auth_data(
        &self,
        user_id: &str,
        service: &str,
        auth_data: Option<String>,
        email: &str,
        reset_mfa: bool,
    ) -> StoreResult<String>;

    /// Deactivate every active user whose roles are exactly `system_guest`.
    async fn deactivate_guests(&self) -> StoreResult<Vec<String>>;

    async fn promote_guest_to_user(&self, user_id: &str) -> StoreResult<()>;

    async fn demote_user_to_guest(&self, user_id: &str) -> StoreResult<User>;

    /// Drop every role token that is not a built-in role.
    async fn clear_all_custom_role_assignments(&self) -> StoreResult<()>;

    async fn count(&self, options: UserCountOptions) -> StoreResult<i64>;

    async fn get_users_batch_for_indexing(
        &self,
        start_time: i64,
        end_time: i64,
        limit: u64,
    ) -> StoreResult<Vec<UserForIndexing>>;

    /// Ids of users sharing at least one channel with `user_id`.
    async fn get_known_users(&self, user_id: &str) -> StoreResult<Vec<String>>;

    async fn permanent_delete(&self, user_id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, email: &str) -> User {
        User {
            username: username.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pre_save_generates_id_and_lowercases() {
        let mut u = user("Bot_1", "B1@X");
        u.pre_save();
        assert_eq!(u.id.len(), 26);
        assert_eq!(u.username, "bot_1");
        assert_eq!(u.email, "b1@x");
        assert_eq!(u.update_at, u.create_at);
        assert_eq!(u.locale, "en");
        assert!(u.validate().is_ok());
    }

    #[test]
    fn test_pre_save_keeps_given_id() {
        let mut u = user("a", "same@x");
        u.id = "u2".into();
        u.pre_save();
        assert_eq!(u.id, "u2");
    }

    #[test]
    fn test_empty_auth_data_becomes_none() {
        let mut u = user("a", "a@x");
        u.auth_data = Some(String::new());
        u.pre_save();
        assert_eq!(u.auth_data, None);
    }

    #[test]
    fn test_validation_rejects_bad_username_and_email() {
        let mut u = user("9lives", "nope");
        u.id = "u1".into();
        let errors = u.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_role_tokens() {
        let mut u = user("a", "a@x");
        u.roles = "system_user  system_admin".into();
        assert_eq!(u.role_tokens(), vec!["system_user", "system_admin"]);
    }

    #[test]
    fn test_password_not_serialized() {
        let mut u = user("a", "a@x");
        u.password = "hash".into();
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("hash"));
    }
}
