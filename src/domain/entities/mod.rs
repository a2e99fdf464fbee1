//! # Domain Entities
//!
//! Rows of the chat server's relational schema and the store traits that
//! read and write them. Every trait is implemented by a `Sql*Store` in the
//! infrastructure layer.
//!
//! ## Accounts and Membership
//!
//! - **User** / **Bot**: accounts; a bot is a user with extra metadata
//! - **Team** / **TeamMember**
//! - **Channel** / **ChannelMember**, with the **ChannelMemberHistory** log
//! - **Group**: externally managed user sets synced onto teams and channels
//!
//! ## Content
//!
//! - **Post** / **Thread**
//! - **FileInfo**: attachments
//! - **Preference**: per-user key/value settings
//! - **SidebarCategory**: per-user, per-team channel grouping
//!
//! ## Administration
//!
//! - **RetentionPolicy**, **Job**, **License**, **TermsOfService**, **System**

mod bot;
mod channel;
mod channel_member_history;
mod file_info;
mod group;
mod job;
mod license;
mod post;
mod preference;
mod retention_policy;
mod sidebar;
mod system;
mod team;
mod terms_of_service;
mod user;

pub use bot::{Bot, BotGetOptions, BotStore};
pub use channel::{Channel, ChannelMember, ChannelStore, ChannelType};
pub use channel_member_history::{
    ChannelMemberHistory, ChannelMemberHistoryResult, ChannelMemberHistoryStore,
};
pub use file_info::{FileInfo, FileInfoStore, NO_USER_CREATOR_ID};
pub use group::{
    Group, GroupMember, GroupSearchOpts, GroupSource, GroupStore, GroupSyncable, SyncableTarget,
    SyncableType, UserChannelIdPair, UserTeamIdPair,
};
pub use job::{Job, JobStatus, JobStore};
pub use license::{License, LicenseStore};
pub use post::{Post, PostStore, Thread, ThreadStore, POST_MESSAGE_MAX_RUNES};
pub use preference::{
    Preference, PreferenceStore, PREFERENCE_CATEGORY_FAVORITE_CHANNEL,
    PREFERENCE_CATEGORY_FLAGGED_POST, PREFERENCE_VALUE_TRUE,
};
pub use retention_policy::{
    RetentionPolicy, RetentionPolicyChannel, RetentionPolicyPatch, RetentionPolicyStore,
    RetentionPolicyTeam, RetentionPolicyWithTeamAndChannelCounts,
    RetentionPolicyWithTeamAndChannelIds,
};
pub use sidebar::{
    OrderedSidebarCategories, SidebarCategory, SidebarCategorySorting, SidebarCategoryType,
    SidebarCategoryWithChannels, SidebarChannel, SidebarStore, SIDEBAR_CATEGORY_NAME_MAX_LENGTH,
    SIDEBAR_SORT_ORDER_STEP,
};
pub use system::{System, SystemStore, SYSTEM_ACTIVE_LICENSE_ID, SYSTEM_AT_REST_ENCRYPT_KEY};
pub use team::{Team, TeamMember, TeamStore, TeamType};
pub use terms_of_service::{TermsOfService, TermsOfServiceStore};
pub use user::{
    User, UserCountOptions, UserForIndexing, UserStore, UserUpdate, ViewUsersRestrictions,
    USER_EMAIL_MAX_LENGTH, USER_NAME_MAX_LENGTH,
};

#[cfg(test)]
pub use bot::MockBotStore;
#[cfg(test)]
pub use license::MockLicenseStore;
#[cfg(test)]
pub use system::MockSystemStore;
