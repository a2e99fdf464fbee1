//! Bot entity and store trait.
//!
//! A bot is a user row plus bot-only metadata in `Bots`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::get_millis;

/// Bot metadata joined with its user row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Bot {
    /// Id of the backing user.
    #[validate(length(min = 1, max = 26))]
    pub user_id: String,

    /// From `Users.Username`.
    pub username: String,

    /// From `Users.FirstName`.
    pub display_name: String,

    #[validate(length(max = 1024))]
    pub description: String,

    /// User or plugin id owning the bot.
    #[validate(length(min = 1, max = 190))]
    pub owner_id: String,

    pub last_icon_update: i64,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

impl Bot {
    pub fn pre_save(&mut self) {
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
    }

    pub fn pre_update(&mut self) {
        self.update_at = get_millis();
    }

    /// Copy the patchable fields of `other` onto `self`.
    pub fn patch_from(&mut self, other: &Bot) {
        self.description = other.description.clone();
        self.owner_id = other.owner_id.clone();
        self.last_icon_update = other.last_icon_update;
        self.delete_at = other.delete_at;
    }
}

/// Filters for [`BotStore::get_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotGetOptions {
    pub owner_id: Option<String>,
    pub include_deleted: bool,
    /// Only bots whose owner has been deactivated.
    pub only_orphaned: bool,
    pub page: u64,
    pub per_page: u64,
}

impl Default for BotGetOptions {
    fn default() -> Self {
        Self {
            owner_id: None,
            include_deleted: false,
            only_orphaned: false,
            page: 0,
            per_page: 60,
        }
    }
}

/// Data access for bots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotStore: Send + Sync {
    async fn get(&self, user_id: &str, include_deleted: bool) -> StoreResult<Bot>;

    async fn get_all(&self, options: BotGetOptions) -> StoreResult<Vec<Bot>>;

    /// Insert bot metadata for an existing user.
    async fn save(&self, bot: &Bot) -> StoreResult<Bot>;

    async fn update(&self, bot: &Bot) -> StoreResult<Bot>;

    async fn permanent_delete(&self, user_id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_mutable_fields() {
        let mut stored = Bot {
            user_id: "b".repeat(26),
            username: "helper".into(),
            display_name: "Helper".into(),
            owner_id: "o1".into(),
            create_at: 10,
            ..Default::default()
        };
        let incoming = Bot {
            user_id: "x".repeat(26),
            username: "renamed".into(),
            description: "does things".into(),
            owner_id: "o2".into(),
            last_icon_update: 5,
            create_at: 99,
            delete_at: 7,
            ..Default::default()
        };
        stored.patch_from(&incoming);
        assert_eq!(stored.username, "helper");
        assert_eq!(stored.create_at, 10);
        assert_eq!(stored.owner_id, "o2");
        assert_eq!(stored.description, "does things");
        assert_eq!(stored.last_icon_update, 5);
        assert_eq!(stored.delete_at, 7);
    }

    #[test]
    fn test_validation_requires_owner() {
        let bot = Bot {
            user_id: "b".repeat(26),
            ..Default::default()
        };
        assert!(bot.validate().is_err());
    }

    #[test]
    fn test_default_options_page_size() {
        assert_eq!(BotGetOptions::default().per_page, 60);
    }
}
