//! Channel entity, channel membership and store trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::infrastructure::database::codec::StringMap;
use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Channel type, stored as a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChannelType {
    #[default]
    Open,
    Private,
    Direct,
    Group,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Private => "P",
            Self::Direct => "D",
            Self::Group => "G",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "O" => Some(Self::Open),
            "P" => Some(Self::Private),
            "D" => Some(Self::Direct),
            "G" => Some(Self::Group),
            _ => None,
        }
    }

    /// Direct and group messages belong to no team.
    pub fn is_direct_or_group(&self) -> bool {
        matches!(self, Self::Direct | Self::Group)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel. `team_id` is empty for direct and group messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Channel {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    #[validate(length(max = 26))]
    pub team_id: String,
    pub channel_type: ChannelType,
    #[validate(length(max = 64))]
    pub display_name: String,
    /// Unique within the team.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 1024))]
    pub header: String,
    #[validate(length(max = 250))]
    pub purpose: String,
    pub last_post_at: i64,
    pub total_msg_count: i64,
    pub creator_id: String,
    pub group_constrained: bool,
}

impl Channel {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
        if self.channel_type.is_direct_or_group() {
            self.team_id.clear();
        }
    }
}

/// A user's membership in a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub channel_id: String,
    pub user_id: String,
    pub roles: String,
    pub last_viewed_at: i64,
    pub msg_count: i64,
    pub mention_count: i64,
    pub notify_props: StringMap,
    pub last_update_at: i64,
    pub scheme_user: bool,
    pub scheme_admin: bool,
    pub scheme_guest: bool,
}

impl ChannelMember {
    pub fn new(channel_id: &str, user_id: &str) -> Self {
        let mut notify_props = StringMap::new();
        notify_props.insert("desktop".into(), "default".into());
        notify_props.insert("mark_unread".into(), "all".into());
        Self {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            notify_props,
            last_update_at: get_millis(),
            scheme_user: true,
            ..Default::default()
        }
    }
}

/// Data access for channels and channel memberships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn save(&self, channel: &Channel) -> StoreResult<Channel>;

    async fn get(&self, id: &str) -> StoreResult<Channel>;

    async fn get_by_name(&self, team_id: &str, name: &str) -> StoreResult<Channel>;

    /// Soft delete.
    async fn delete(&self, id: &str, time: i64) -> StoreResult<()>;

    /// Insert a membership and log the join in the member history.
    async fn save_member(&self, member: &ChannelMember) -> StoreResult<ChannelMember>;

    async fn get_member(&self, channel_id: &str, user_id: &str) -> StoreResult<ChannelMember>;

    /// Delete a membership and log the leave in the member history.
    async fn remove_member(&self, channel_id: &str, user_id: &str) -> StoreResult<()>;

    async fn get_members_for_user(&self, user_id: &str) -> StoreResult<Vec<ChannelMember>>;

    /// Channels of the team plus direct and group messages the user is in.
    async fn get_channels_for_user_on_team(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Channel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_round_trip() {
        for t in [
            ChannelType::Open,
            ChannelType::Private,
            ChannelType::Direct,
            ChannelType::Group,
        ] {
            assert_eq!(ChannelType::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_direct_channel_loses_team() {
        let mut channel = Channel {
            team_id: "t1".into(),
            channel_type: ChannelType::Direct,
            name: "u1__u2".into(),
            ..Default::default()
        };
        channel.pre_save();
        assert!(channel.team_id.is_empty());
        assert!(channel.validate().is_ok());
    }

    #[test]
    fn test_new_member_defaults() {
        let member = ChannelMember::new("c1", "u1");
        assert!(member.scheme_user);
        assert_eq!(member.notify_props.get("mark_unread").map(String::as_str), Some("all"));
    }
}
