//! Thread repository.
//!
//! Threads are written by the post store inside its transactions; this
//! store covers reads and maintenance.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;

use super::helpers::array_arg;
use crate::domain::entities::{Thread, ThreadStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder, Tx,
};
use crate::shared::error::{StoreError, StoreResult};

pub(crate) const THREAD_COLUMNS: &[&str] =
    &["PostId", "ChannelId", "ReplyCount", "LastReplyAt", "Participants"];

impl FromAnyRow for Thread {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            post_id: row.text("PostId")?,
            channel_id: row.text("ChannelId")?,
            reply_count: row.int("ReplyCount")?,
            last_reply_at: row.int("LastReplyAt")?,
            participants: row.json("Participants")?,
        })
    }
}

/// `SELECT ... FROM Threads WHERE PostId = ? FOR UPDATE`
pub(crate) fn locked_thread_query(qb: &QueryBuilder, post_id: &str) -> SelectBuilder {
    qb.select(THREAD_COLUMNS)
        .from("Threads")
        .where_(Expr::eq("PostId", post_id))
        .suffix("FOR UPDATE")
}

/// Write the counters and participants of an existing thread.
pub(crate) async fn write_thread(qb: &QueryBuilder, tx: &mut Tx, thread: &Thread) -> StoreResult<()> {
    let stmt = qb
        .update("Threads")
        .set("ReplyCount", thread.reply_count)
        .set("LastReplyAt", thread.last_reply_at)
        .set("Participants", array_arg(&thread.participants)?)
        .where_(Expr::eq("PostId", thread.post_id.as_str()))
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to update thread"))?;
    Ok(())
}

/// Insert `thread` unless a concurrent writer created it first. Returns
/// whether this call inserted the row.
pub(crate) async fn insert_thread(qb: &QueryBuilder, tx: &mut Tx, thread: &Thread) -> StoreResult<bool> {
    let stmt = qb
        .insert("Threads")
        .columns(THREAD_COLUMNS)
        .values(vec![
            thread.post_id.as_str().into(),
            thread.channel_id.as_str().into(),
            thread.reply_count.into(),
            thread.last_reply_at.into(),
            array_arg(&thread.participants)?,
        ])
        .ignore_duplicates()
        .to_statement();
    let count = tx
        .execute(&stmt)
        .await
        .map_err(internal("failed to insert thread"))?;
    Ok(count > 0)
}

/// SQL thread store.
#[derive(Clone)]
pub struct SqlThreadStore {
    router: Arc<PoolRouter>,
}

impl SqlThreadStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }
}

#[async_trait]
impl ThreadStore for SqlThreadStore {
    async fn get(&self, post_id: &str) -> StoreResult<Thread> {
        let stmt = self
            .qb()
            .select(THREAD_COLUMNS)
            .from("Threads")
            .where_(Expr::eq("PostId", post_id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get thread"))?
            .ok_or_else(|| StoreError::not_found("Thread", post_id))?;
        Ok(Thread::from_row(&row)?)
    }

    async fn get_for_channel(&self, channel_id: &str) -> StoreResult<Vec<Thread>> {
        let stmt = self
            .qb()
            .select(THREAD_COLUMNS)
            .from("Threads")
            .where_(Expr::eq("ChannelId", channel_id))
            .order_by("LastReplyAt DESC")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get threads for channel"))?;
        Ok(decode_all(&rows)?)
    }

    async fn delete(&self, post_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("Threads")
            .where_(Expr::eq("PostId", post_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete thread"))?;
        Ok(())
    }

    async fn update_participants(&self, post_id: &str, participants: &[String]) -> StoreResult<()> {
        let stmt = self
            .qb()
            .update("Threads")
            .set("Participants", array_arg(&participants.to_vec())?)
            .where_(Expr::eq("PostId", post_id))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to update thread participants"))?;
        if count == 0 {
            return Err(StoreError::not_found("Thread", post_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Dialect;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_locked_thread_query() {
        let qb = QueryBuilder::new(Dialect::Postgres);
        let stmt = locked_thread_query(&qb, "r1").to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT PostId, ChannelId, ReplyCount, LastReplyAt, Participants FROM Threads \
             WHERE PostId = $1 FOR UPDATE"
        );
    }
}
