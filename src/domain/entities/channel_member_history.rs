//! Channel membership history.
//!
//! Append-only log of join and leave events, used for compliance exports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::StoreResult;

/// One membership interval. `leave_time` is `None` while the user is still
/// in the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMemberHistory {
    pub channel_id: String,
    pub user_id: String,
    pub join_time: i64,
    pub leave_time: Option<i64>,
}

/// A history interval joined with user details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMemberHistoryResult {
    pub channel_id: String,
    pub user_id: String,
    pub join_time: i64,
    pub leave_time: Option<i64>,
    pub user_email: String,
    pub username: String,
    pub is_bot: bool,
}

impl ChannelMemberHistoryResult {
    /// Whether the interval intersects `[start, end]`.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.join_time <= end && self.leave_time.map_or(true, |leave| leave >= start)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelMemberHistoryStore: Send + Sync {
    async fn log_join_event(&self, user_id: &str, channel_id: &str, join_time: i64) -> StoreResult<()>;

    /// Close the open interval. A missing open interval is logged, not an error.
    async fn log_leave_event(&self, user_id: &str, channel_id: &str, leave_time: i64) -> StoreResult<()>;

    /// Intervals overlapping `[start_time, end_time]`. Channels without any
    /// history fall back to the current members, reported as present for
    /// the whole window.
    async fn get_users_in_channel_during(
        &self,
        start_time: i64,
        end_time: i64,
        channel_id: &str,
    ) -> StoreResult<Vec<ChannelMemberHistoryResult>>;

    /// Hard-delete closed intervals that ended at or before `end_time`.
    async fn permanent_delete_batch(&self, end_time: i64, limit: u64) -> StoreResult<u64>;

    async fn delete_for_user(&self, user_id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(join: i64, leave: Option<i64>) -> ChannelMemberHistoryResult {
        ChannelMemberHistoryResult {
            join_time: join,
            leave_time: leave,
            ..Default::default()
        }
    }

    #[test]
    fn test_overlaps() {
        assert!(interval(10, Some(20)).overlaps(15, 30));
        assert!(interval(10, None).overlaps(100, 200));
        assert!(!interval(10, Some(20)).overlaps(21, 30));
        assert!(!interval(40, None).overlaps(21, 30));
        assert!(interval(10, Some(20)).overlaps(20, 30));
    }
}
