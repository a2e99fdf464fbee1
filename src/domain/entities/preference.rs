//! User preferences.
//!
//! Keyed by `(user_id, category, name)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;

/// Channels the user marked as favorite; value `"true"`.
pub const PREFERENCE_CATEGORY_FAVORITE_CHANNEL: &str = "favorite_channel";

/// Posts the user flagged; name is the post id.
pub const PREFERENCE_CATEGORY_FLAGGED_POST: &str = "flagged_post";

pub const PREFERENCE_VALUE_TRUE: &str = "true";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Preference {
    #[validate(length(min = 1, max = 26))]
    pub user_id: String,
    #[validate(length(min = 1, max = 32))]
    pub category: String,
    #[validate(length(max = 32))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub value: String,
}

impl Preference {
    pub fn new(user_id: &str, category: &str, name: &str, value: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether this preference marks a channel as favorite.
    pub fn is_favorite(&self) -> bool {
        self.category == PREFERENCE_CATEGORY_FAVORITE_CHANNEL && self.value == PREFERENCE_VALUE_TRUE
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Upsert all preferences in one transaction. Favorite-channel
    /// preferences are mirrored into the user's favorites categories.
    async fn save(&self, preferences: &[Preference]) -> StoreResult<()>;

    async fn get(&self, user_id: &str, category: &str, name: &str) -> StoreResult<Preference>;

    async fn get_category(&self, user_id: &str, category: &str) -> StoreResult<Vec<Preference>>;

    async fn get_all(&self, user_id: &str) -> StoreResult<Vec<Preference>>;

    async fn delete(&self, user_id: &str, category: &str, name: &str) -> StoreResult<()>;

    async fn delete_category(&self, user_id: &str, category: &str) -> StoreResult<()>;

    async fn delete_category_and_name(&self, category: &str, name: &str) -> StoreResult<()>;

    async fn permanent_delete_by_user(&self, user_id: &str) -> StoreResult<()>;

    /// Remove up to `limit` flagged-post preferences whose post is gone.
    async fn delete_orphaned_rows(&self, limit: u64) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_favorite() {
        assert!(Preference::new("u1", PREFERENCE_CATEGORY_FAVORITE_CHANNEL, "c1", "true").is_favorite());
        assert!(!Preference::new("u1", PREFERENCE_CATEGORY_FAVORITE_CHANNEL, "c1", "false").is_favorite());
        assert!(!Preference::new("u1", PREFERENCE_CATEGORY_FLAGGED_POST, "p1", "true").is_favorite());
    }

    #[test]
    fn test_value_length_cap() {
        let pref = Preference::new("u1", "display", "theme", &"x".repeat(2001));
        assert!(pref.validate().is_err());
    }
}
