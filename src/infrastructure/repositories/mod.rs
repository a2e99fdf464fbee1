//! Repository Implementations
//!
//! SQL implementations of the domain store traits. Every store holds the
//! shared [`PoolRouter`](crate::infrastructure::database::PoolRouter):
//! writes go to the master, reads to a replica unless read-your-write is
//! needed.
//!
//! ## Available Stores
//!
//! - **SqlUserStore** / **SqlBotStore** - accounts
//! - **SqlTeamStore** / **SqlChannelStore** - teams, channels and memberships
//! - **SqlChannelMemberHistoryStore** - join/leave log
//! - **SqlPostStore** / **SqlThreadStore** - posts and thread counters
//! - **SqlFileInfoStore** - attachments
//! - **SqlPreferenceStore** - per-user settings, mirrored into favorites
//! - **SqlGroupStore** - groups, syncables and membership reconciliation
//! - **SqlSidebarStore** - sidebar categories
//! - **SqlRetentionPolicyStore**, **SqlJobStore**, **SqlLicenseStore**,
//!   **SqlTermsOfServiceStore**, **SqlSystemStore** - administration
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crate::infrastructure::repositories::{SqlChannelStore, SqlUserStore};
//!
//! fn setup(router: Arc<PoolRouter>) {
//!     let users = SqlUserStore::new(router.clone());
//!     let channels = SqlChannelStore::new(router);
//! }
//! ```

mod favorites;
pub mod helpers;

pub mod bot_repository;
pub mod channel_member_history_repository;
pub mod channel_repository;
pub mod file_info_repository;
pub mod group_repository;
pub mod job_repository;
pub mod license_repository;
pub mod post_repository;
pub mod preference_repository;
pub mod retention_policy_repository;
pub mod sidebar_repository;
pub mod system_repository;
pub mod team_repository;
pub mod terms_of_service_repository;
pub mod thread_repository;
pub mod user_repository;

pub use bot_repository::SqlBotStore;
pub use channel_member_history_repository::SqlChannelMemberHistoryStore;
pub use channel_repository::SqlChannelStore;
pub use file_info_repository::SqlFileInfoStore;
pub use group_repository::SqlGroupStore;
pub use job_repository::SqlJobStore;
pub use license_repository::SqlLicenseStore;
pub use post_repository::SqlPostStore;
pub use preference_repository::SqlPreferenceStore;
pub use retention_policy_repository::SqlRetentionPolicyStore;
pub use sidebar_repository::SqlSidebarStore;
pub use system_repository::SqlSystemStore;
pub use team_repository::SqlTeamStore;
pub use terms_of_service_repository::SqlTermsOfServiceStore;
pub use thread_repository::SqlThreadStore;
pub use user_repository::SqlUserStore;
