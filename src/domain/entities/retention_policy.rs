//! Data retention policies.
//!
//! A policy applies a post duration to a set of teams and channels. A team
//! or channel belongs to at most one policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::new_id;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetentionPolicy {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    /// Days to keep posts; negative means forever.
    pub post_duration: i64,
}

/// A policy with the ids it should be linked to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyWithTeamAndChannelIds {
    pub policy: RetentionPolicy,
    pub team_ids: Vec<String>,
    pub channel_ids: Vec<String>,
}

impl RetentionPolicyWithTeamAndChannelIds {
    pub fn pre_save(&mut self) {
        if self.policy.id.is_empty() {
            self.policy.id = new_id();
        }
    }
}

/// A policy with link counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyWithTeamAndChannelCounts {
    pub policy: RetentionPolicy,
    pub team_count: i64,
    pub channel_count: i64,
}

/// Partial update. `None` leaves the field or link set untouched; `Some`
/// replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyPatch {
    pub id: String,
    pub display_name: Option<String>,
    pub post_duration: Option<i64>,
    pub team_ids: Option<Vec<String>>,
    pub channel_ids: Option<Vec<String>>,
}

impl RetentionPolicyPatch {
    pub fn touches_policy_row(&self) -> bool {
        self.display_name.is_some() || self.post_duration.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyChannel {
    pub policy_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyTeam {
    pub policy_id: String,
    pub team_id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetentionPolicyStore: Send + Sync {
    /// Verify the targets exist, then insert the policy and its links.
    async fn save(
        &self,
        policy: &RetentionPolicyWithTeamAndChannelIds,
    ) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts>;

    async fn patch(
        &self,
        patch: &RetentionPolicyPatch,
    ) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts>;

    async fn get(&self, id: &str) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts>;

    /// Ordered by display name then id.
    async fn get_all(
        &self,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<RetentionPolicyWithTeamAndChannelCounts>>;

    async fn get_count(&self) -> StoreResult<i64>;

    /// Deletes the policy; links go with it.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn get_channels(&self, policy_id: &str, offset: u64, limit: u64) -> StoreResult<Vec<String>>;

    async fn get_teams(&self, policy_id: &str, offset: u64, limit: u64) -> StoreResult<Vec<String>>;

    async fn add_channels(&self, policy_id: &str, channel_ids: &[String]) -> StoreResult<()>;

    async fn remove_channels(&self, policy_id: &str, channel_ids: &[String]) -> StoreResult<()>;

    async fn add_teams(&self, policy_id: &str, team_ids: &[String]) -> StoreResult<()>;

    async fn remove_teams(&self, policy_id: &str, team_ids: &[String]) -> StoreResult<()>;

    /// Remove up to `limit` links whose team or channel is gone.
    async fn delete_orphaned_rows(&self, limit: u64) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_without_fields_does_not_touch_row() {
        let patch = RetentionPolicyPatch {
            id: "p1".into(),
            team_ids: Some(vec![]),
            ..Default::default()
        };
        assert!(!patch.touches_policy_row());
    }

    #[test]
    fn test_pre_save_generates_id() {
        let mut p = RetentionPolicyWithTeamAndChannelIds {
            policy: RetentionPolicy {
                display_name: "Short".into(),
                post_duration: 30,
                ..Default::default()
            },
            ..Default::default()
        };
        p.pre_save();
        assert_eq!(p.policy.id.len(), 26);
        assert!(p.policy.validate().is_ok());
    }
}
