//! Sidebar categories.
//!
//! Every `(user, team)` pair owns three built-in categories (favorites,
//! channels, direct messages) plus any number of custom ones. Each channel
//! the user belongs to on the team appears in exactly one category; channels
//! without an explicit assignment are resolved into the built-in channels or
//! direct messages category when read.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::new_id;

/// Distance between consecutive sort orders.
pub const SIDEBAR_SORT_ORDER_STEP: i64 = 10;

/// Maximum length of a custom category name.
pub const SIDEBAR_CATEGORY_NAME_MAX_LENGTH: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SidebarCategoryType {
    Favorites,
    Channels,
    DirectMessages,
    #[default]
    Custom,
}

impl SidebarCategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Channels => "channels",
            Self::DirectMessages => "direct_messages",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "favorites" => Some(Self::Favorites),
            "channels" => Some(Self::Channels),
            "direct_messages" => Some(Self::DirectMessages),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn is_built_in(&self) -> bool {
        !matches!(self, Self::Custom)
    }

    /// Built-ins in their initial display order.
    pub fn built_ins() -> [Self; 3] {
        [Self::Favorites, Self::Channels, Self::DirectMessages]
    }

    /// Name shown for a freshly created built-in.
    pub fn default_display_name(&self) -> &'static str {
        match self {
            Self::Favorites => "Favorites",
            Self::Channels => "Channels",
            Self::DirectMessages => "Direct Messages",
            Self::Custom => "",
        }
    }

    /// Deterministic id of the built-in category for `(user, team)`.
    pub fn built_in_id(&self, user_id: &str, team_id: &str) -> String {
        format!("{}_{}_{}", self.as_str(), user_id, team_id)
    }
}

impl fmt::Display for SidebarCategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How channels inside a category are ordered by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SidebarCategorySorting {
    #[default]
    #[serde(rename = "")]
    Default,
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "recent")]
    Recent,
    #[serde(rename = "alpha")]
    Alphabetical,
}

impl SidebarCategorySorting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Manual => "manual",
            Self::Recent => "recent",
            Self::Alphabetical => "alpha",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "" => Some(Self::Default),
            "manual" => Some(Self::Manual),
            "recent" => Some(Self::Recent),
            "alpha" => Some(Self::Alphabetical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SidebarCategory {
    #[validate(length(max = 128))]
    pub id: String,
    pub user_id: String,
    pub team_id: String,
    pub sort_order: i64,
    pub sorting: SidebarCategorySorting,
    #[serde(rename = "type")]
    pub category_type: SidebarCategoryType,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    pub muted: bool,
    pub collapsed: bool,
}

impl SidebarCategory {
    /// A built-in category with its initial name and position.
    pub fn built_in(kind: SidebarCategoryType, user_id: &str, team_id: &str, sort_order: i64) -> Self {
        Self {
            id: kind.built_in_id(user_id, team_id),
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
            sort_order,
            sorting: SidebarCategorySorting::Default,
            category_type: kind,
            display_name: kind.default_display_name().to_string(),
            muted: false,
            collapsed: false,
        }
    }

    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
    }
}

/// A category with its channel ids in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarCategoryWithChannels {
    #[serde(flatten)]
    pub category: SidebarCategory,
    pub channel_ids: Vec<String>,
}

impl SidebarCategoryWithChannels {
    pub fn id(&self) -> &str {
        &self.category.id
    }

    pub fn category_type(&self) -> SidebarCategoryType {
        self.category.category_type
    }
}

/// All categories of a `(user, team)` pair plus their order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedSidebarCategories {
    pub categories: Vec<SidebarCategoryWithChannels>,
    pub order: Vec<String>,
}

/// Assignment of a channel to a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarChannel {
    pub channel_id: String,
    pub user_id: String,
    pub category_id: String,
    pub sort_order: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SidebarStore: Send + Sync {
    /// Create the built-in categories if missing. Safe under concurrent
    /// calls; every caller sees the same three categories.
    async fn create_initial_sidebar_categories(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<OrderedSidebarCategories>;

    /// Insert a custom category and move the listed channels into it.
    async fn create_sidebar_category(
        &self,
        user_id: &str,
        team_id: &str,
        new_category: &SidebarCategoryWithChannels,
    ) -> StoreResult<SidebarCategoryWithChannels>;

    async fn get_sidebar_category(&self, category_id: &str) -> StoreResult<SidebarCategoryWithChannels>;

    async fn get_sidebar_categories(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<OrderedSidebarCategories>;

    async fn get_sidebar_category_order(&self, user_id: &str, team_id: &str) -> StoreResult<Vec<String>>;

    /// Returns `(updated, originals)`.
    async fn update_sidebar_categories(
        &self,
        user_id: &str,
        team_id: &str,
        categories: &[SidebarCategoryWithChannels],
    ) -> StoreResult<(Vec<SidebarCategoryWithChannels>, Vec<SidebarCategoryWithChannels>)>;

    /// `category_order` must contain exactly the current category ids.
    async fn update_sidebar_category_order(
        &self,
        user_id: &str,
        team_id: &str,
        category_order: &[String],
    ) -> StoreResult<()>;

    /// Custom categories only.
    async fn delete_sidebar_category(&self, category_id: &str) -> StoreResult<()>;

    async fn clear_sidebar_on_team_leave(&self, user_id: &str, team_id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_ids_are_deterministic() {
        assert_eq!(
            SidebarCategoryType::Favorites.built_in_id("u1", "t1"),
            "favorites_u1_t1"
        );
        assert_eq!(
            SidebarCategoryType::DirectMessages.built_in_id("u1", "t1"),
            "direct_messages_u1_t1"
        );
    }

    #[test]
    fn test_built_in_category_defaults() {
        let c = SidebarCategory::built_in(SidebarCategoryType::Channels, "u1", "t1", 10);
        assert_eq!(c.display_name, "Channels");
        assert_eq!(c.sort_order, 10);
        assert!(c.category_type.is_built_in());
    }

    #[test]
    fn test_sorting_round_trip() {
        for s in [
            SidebarCategorySorting::Default,
            SidebarCategorySorting::Manual,
            SidebarCategorySorting::Recent,
            SidebarCategorySorting::Alphabetical,
        ] {
            assert_eq!(SidebarCategorySorting::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_category_with_channels_serializes_flat() {
        let c = SidebarCategoryWithChannels {
            category: SidebarCategory::built_in(SidebarCategoryType::Favorites, "u1", "t1", 0),
            channel_ids: vec!["c1".into()],
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "favorites");
        assert_eq!(json["channel_ids"][0], "c1");
    }
}
