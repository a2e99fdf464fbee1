//! User groups and their team/channel syncables.
//!
//! A group mirrors an externally managed set of users (LDAP, custom, ...).
//! Syncables link a group to a team or channel; auto-add syncables drive
//! membership reconciliation.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Where a group's members come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GroupSource {
    #[default]
    Ldap,
    Custom,
}

impl GroupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ldap => "ldap",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ldap" => Some(Self::Ldap),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for GroupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Group {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    /// Mention handle; unique when present.
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(length(max = 1024))]
    pub description: String,
    pub source: GroupSource,
    /// Identifier in the source system; unique per source.
    #[validate(length(min = 1, max = 48))]
    pub remote_id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    /// Whether the group can be mentioned.
    pub allow_reference: bool,
    /// Populated by queries that count members.
    pub member_count: Option<i64>,
}

impl Group {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub create_at: i64,
    pub delete_at: i64,
}

/// Discriminator of a [`GroupSyncable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncableType {
    Team,
    Channel,
}

impl SyncableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "Team",
            Self::Channel => "Channel",
        }
    }

    /// Table holding syncables of this type.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Team => "GroupTeams",
            Self::Channel => "GroupChannels",
        }
    }

    /// Id column of the target in [`table`](Self::table).
    pub fn id_column(&self) -> &'static str {
        match self {
            Self::Team => "TeamId",
            Self::Channel => "ChannelId",
        }
    }
}

impl fmt::Display for SyncableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a syncable links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncableTarget {
    Team { team_id: String },
    Channel { channel_id: String },
}

impl SyncableTarget {
    pub fn syncable_type(&self) -> SyncableType {
        match self {
            Self::Team { .. } => SyncableType::Team,
            Self::Channel { .. } => SyncableType::Channel,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Team { team_id } => team_id,
            Self::Channel { channel_id } => channel_id,
        }
    }
}

/// Link between a group and a team or channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSyncable {
    pub group_id: String,
    pub target: SyncableTarget,
    /// Members of the group are added to the target automatically.
    pub auto_add: bool,
    /// Members get the admin role in the target.
    pub scheme_admin: bool,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

impl GroupSyncable {
    pub fn new(group_id: &str, target: SyncableTarget, auto_add: bool) -> Self {
        Self {
            group_id: group_id.to_string(),
            target,
            auto_add,
            scheme_admin: false,
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }

    pub fn syncable_type(&self) -> SyncableType {
        self.target.syncable_type()
    }

    pub fn syncable_id(&self) -> &str {
        self.target.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserTeamIdPair {
    pub user_id: String,
    pub team_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserChannelIdPair {
    pub user_id: String,
    pub channel_id: String,
}

/// Filters for [`GroupStore::get_groups`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSearchOpts {
    /// Substring of the name or display name.
    pub q: String,
    /// Exclude groups linked to this team.
    pub not_associated_to_team: String,
    /// Exclude groups linked to this channel.
    pub not_associated_to_channel: String,
    /// When the channel's team is group-constrained, only groups linked to
    /// that team are returned.
    pub filter_parent_team_permitted: bool,
    pub filter_allow_reference: bool,
    pub include_member_count: bool,
    /// Only groups updated at or after this time; includes deleted ones.
    pub since: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create(&self, group: &Group) -> StoreResult<Group>;

    async fn get(&self, id: &str) -> StoreResult<Group>;

    async fn get_by_name(&self, name: &str) -> StoreResult<Group>;

    async fn get_by_remote_id(&self, remote_id: &str, source: GroupSource) -> StoreResult<Group>;

    async fn get_all_by_source(&self, source: GroupSource) -> StoreResult<Vec<Group>>;

    async fn get_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Group>>;

    async fn update(&self, group: &Group) -> StoreResult<Group>;

    /// Soft delete.
    async fn delete(&self, id: &str) -> StoreResult<Group>;

    async fn restore(&self, id: &str) -> StoreResult<Group>;

    async fn upsert_member(&self, group_id: &str, user_id: &str) -> StoreResult<GroupMember>;

    /// Soft delete.
    async fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<GroupMember>;

    async fn get_member_users(&self, group_id: &str) -> StoreResult<Vec<String>>;

    async fn get_member_count(&self, group_id: &str) -> StoreResult<i64>;

    /// Insert a syncable after checking its target exists.
    async fn create_group_syncable(&self, syncable: &GroupSyncable) -> StoreResult<GroupSyncable>;

    async fn get_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<GroupSyncable>;

    async fn get_all_group_syncables_by_group_id(
        &self,
        group_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<Vec<GroupSyncable>>;

    async fn update_group_syncable(&self, syncable: &GroupSyncable) -> StoreResult<GroupSyncable>;

    /// Soft delete.
    async fn delete_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<GroupSyncable>;

    /// `(user, team)` pairs implied by auto-add team syncables but missing
    /// from `TeamMembers`.
    async fn team_members_to_add(
        &self,
        since: i64,
        team_id: Option<String>,
        include_removed_members: bool,
    ) -> StoreResult<Vec<UserTeamIdPair>>;

    async fn channel_members_to_add(
        &self,
        since: i64,
        channel_id: Option<String>,
        include_removed_members: bool,
    ) -> StoreResult<Vec<UserChannelIdPair>>;

    /// Members of group-constrained teams not covered by any group.
    async fn team_members_to_remove(&self, team_id: Option<String>) -> StoreResult<Vec<UserTeamIdPair>>;

    async fn channel_members_to_remove(
        &self,
        channel_id: Option<String>,
    ) -> StoreResult<Vec<UserChannelIdPair>>;

    async fn get_member_users_in_team(&self, group_id: &str, team_id: &str) -> StoreResult<Vec<String>>;

    async fn get_member_users_not_in_channel(
        &self,
        group_id: &str,
        channel_id: &str,
    ) -> StoreResult<Vec<String>>;

    async fn get_groups(&self, page: u64, per_page: u64, opts: GroupSearchOpts) -> StoreResult<Vec<Group>>;
}
