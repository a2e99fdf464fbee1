//! Channel member history repository.
//!
//! Join and leave events form intervals. Channels that never logged any
//! history are answered from the current membership instead.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;

use super::helpers::limited_delete;
use crate::domain::entities::{ChannelMemberHistoryResult, ChannelMemberHistoryStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::{
    Arg, DbError, Dialect, Expr, PoolRouter, QueryBuilder, RowExt, SelectBuilder, Statement,
};
use crate::shared::error::StoreResult;

fn history_result(row: &AnyRow) -> Result<ChannelMemberHistoryResult, DbError> {
    Ok(ChannelMemberHistoryResult {
        channel_id: row.text("ChannelId")?,
        user_id: row.text("UserId")?,
        join_time: row.int("JoinTime")?,
        leave_time: row.opt_int("LeaveTime")?,
        user_email: row.text("Email")?,
        username: row.text("Username")?,
        is_bot: row.opt_text("BotUserId")?.is_some(),
    })
}

/// Intervals of `channel_id` overlapping `[start_time, end_time]`, open
/// intervals included.
fn history_window_query(qb: &QueryBuilder, start_time: i64, end_time: i64, channel_id: &str) -> SelectBuilder {
    qb.select(&[
        "cmh.ChannelId",
        "cmh.UserId",
        "cmh.JoinTime",
        "cmh.LeaveTime",
        "u.Email",
        "u.Username",
        "b.UserId AS BotUserId",
    ])
    .from("ChannelMemberHistory cmh")
    .join("Users u ON u.Id = cmh.UserId")
    .left_join("Bots b ON b.UserId = cmh.UserId")
    .where_(Expr::eq("cmh.ChannelId", channel_id))
    .where_(Expr::lte("cmh.JoinTime", end_time))
    .where_(Expr::or(vec![
        Expr::is_null("cmh.LeaveTime"),
        Expr::gte("cmh.LeaveTime", start_time),
    ]))
    .order_by("cmh.JoinTime")
}

/// Removes up to `limit` closed intervals that ended by `end_time`.
fn closed_intervals_delete(dialect: Dialect, end_time: i64, limit: u64) -> Statement {
    limited_delete(
        dialect,
        "ChannelMemberHistory",
        "LeaveTime IS NOT NULL AND LeaveTime <= ?",
        vec![Arg::Int(end_time)],
        limit,
    )
}

/// SQL channel member history store.
#[derive(Clone)]
pub struct SqlChannelMemberHistoryStore {
    router: Arc<PoolRouter>,
}

impl SqlChannelMemberHistoryStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn has_history(&self, channel_id: &str) -> StoreResult<bool> {
        let stmt = self
            .qb()
            .select(&["ChannelId"])
            .from("ChannelMemberHistory")
            .where_(Expr::eq("ChannelId", channel_id))
            .limit(1)
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to check channel member history"))?;
        Ok(row.is_some())
    }

    async fn history_during(
        &self,
        start_time: i64,
        end_time: i64,
        channel_id: &str,
    ) -> StoreResult<Vec<ChannelMemberHistoryResult>> {
        let stmt = history_window_query(&self.qb(), start_time, end_time, channel_id).to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get channel member history"))?;
        Ok(rows.iter().map(history_result).collect::<Result<_, _>>()?)
    }

    async fn current_members_as_history(
        &self,
        start_time: i64,
        end_time: i64,
        channel_id: &str,
    ) -> StoreResult<Vec<ChannelMemberHistoryResult>> {
        let stmt = self
            .qb()
            .select(&[
                "cm.ChannelId",
                "cm.UserId",
                "u.Email",
                "u.Username",
                "b.UserId AS BotUserId",
            ])
            .from("ChannelMembers cm")
            .join("Users u ON u.Id = cm.UserId")
            .left_join("Bots b ON b.UserId = cm.UserId")
            .where_(Expr::eq("cm.ChannelId", channel_id))
            .order_by("cm.UserId")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get channel members"))?;

        rows.iter()
            .map(|row| {
                Ok(ChannelMemberHistoryResult {
                    channel_id: row.text("ChannelId")?,
                    user_id: row.text("UserId")?,
                    join_time: start_time,
                    leave_time: Some(end_time),
                    user_email: row.text("Email")?,
                    username: row.text("Username")?,
                    is_bot: row.opt_text("BotUserId")?.is_some(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChannelMemberHistoryStore for SqlChannelMemberHistoryStore {
    async fn log_join_event(&self, user_id: &str, channel_id: &str, join_time: i64) -> StoreResult<()> {
        let stmt = self
            .qb()
            .insert("ChannelMemberHistory")
            .columns(&["ChannelId", "UserId", "JoinTime"])
            .values(vec![channel_id.into(), user_id.into(), join_time.into()])
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to log join event"))?;
        Ok(())
    }

    async fn log_leave_event(&self, user_id: &str, channel_id: &str, leave_time: i64) -> StoreResult<()> {
        let stmt = self
            .qb()
            .update("ChannelMemberHistory")
            .set("LeaveTime", leave_time)
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("ChannelId", channel_id))
            .where_(Expr::is_null("LeaveTime"))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to log leave event"))?;
        if count == 0 {
            tracing::warn!(
                user_id,
                channel_id,
                leave_time,
                "Channel leave event without an open join interval"
            );
        }
        Ok(())
    }

    async fn get_users_in_channel_during(
        &self,
        start_time: i64,
        end_time: i64,
        channel_id: &str,
    ) -> StoreResult<Vec<ChannelMemberHistoryResult>> {
        if self.has_history(channel_id).await? {
            self.history_during(start_time, end_time, channel_id).await
        } else {
            self.current_members_as_history(start_time, end_time, channel_id)
                .await
        }
    }

    async fn permanent_delete_batch(&self, end_time: i64, limit: u64) -> StoreResult<u64> {
        let stmt = closed_intervals_delete(self.router.dialect(), end_time, limit);
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete channel member history"))
    }

    async fn delete_for_user(&self, user_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("ChannelMemberHistory")
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete channel member history for user"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_window_includes_open_intervals() {
        let qb = QueryBuilder::new(Dialect::Postgres);
        let stmt = history_window_query(&qb, 100, 200, "c1").to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT cmh.ChannelId, cmh.UserId, cmh.JoinTime, cmh.LeaveTime, u.Email, u.Username, \
             b.UserId AS BotUserId FROM ChannelMemberHistory cmh \
             JOIN Users u ON u.Id = cmh.UserId LEFT JOIN Bots b ON b.UserId = cmh.UserId \
             WHERE cmh.ChannelId = $1 AND cmh.JoinTime <= $2 \
             AND (cmh.LeaveTime IS NULL OR cmh.LeaveTime >= $3) ORDER BY cmh.JoinTime"
        );
        assert_eq!(stmt.args, vec![Arg::from("c1"), Arg::Int(200), Arg::Int(100)]);
    }

    #[test]
    fn test_purge_skips_open_intervals() {
        let stmt = closed_intervals_delete(Dialect::MySql, 500, 25);
        assert_eq!(
            stmt.sql,
            "DELETE FROM ChannelMemberHistory WHERE LeaveTime IS NOT NULL AND LeaveTime <= ? LIMIT ?"
        );
        assert_eq!(stmt.args, vec![Arg::Int(500), Arg::Int(25)]);
    }
}
