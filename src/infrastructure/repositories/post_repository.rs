//! Post Repository Implementation
//!
//! Posts and their thread bookkeeping. A reply locks the root's thread row
//! (`FOR UPDATE`) so concurrent replies serialize their counter updates.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::helpers::{array_arg, interface_arg};
use super::thread_repository::{insert_thread, locked_thread_query, write_thread};
use crate::domain::entities::{Post, PostStore, Thread, PREFERENCE_CATEGORY_FLAGGED_POST};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::strings;
use crate::infrastructure::database::{
    finish, DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder, Tx,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const POST_COLUMNS: &[&str] = &[
    "Id",
    "CreateAt",
    "UpdateAt",
    "EditAt",
    "DeleteAt",
    "IsPinned",
    "UserId",
    "ChannelId",
    "RootId",
    "Message",
    "Type",
    "Props",
    "Hashtags",
    "FileIds",
];

impl FromAnyRow for Post {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            edit_at: row.int("EditAt")?,
            delete_at: row.int("DeleteAt")?,
            is_pinned: row.boolean("IsPinned")?,
            user_id: row.text("UserId")?,
            channel_id: row.text("ChannelId")?,
            root_id: row.text("RootId")?,
            message: row.text("Message")?,
            post_type: row.text("Type")?,
            props: row.json("Props")?,
            hashtags: row.text("Hashtags")?,
            file_ids: row.json("FileIds")?,
        })
    }
}

/// The live post a reply points at, locked until the transaction ends.
fn locked_root_query(qb: &QueryBuilder, root_id: &str) -> SelectBuilder {
    qb.select(POST_COLUMNS)
        .from("Posts")
        .where_(Expr::eq("Id", root_id))
        .where_(Expr::eq("DeleteAt", 0_i64))
        .suffix("FOR UPDATE")
}

/// A reply must hang off a live top-level post in its own channel.
fn check_reply_root(reply: &Post, root: Option<&Post>) -> StoreResult<()> {
    match root {
        Some(root) if !root.is_reply() && root.channel_id == reply.channel_id => Ok(()),
        _ => Err(StoreError::invalid_input("Post", "root_id", &reply.root_id)),
    }
}

/// SQL post store.
#[derive(Clone)]
pub struct SqlPostStore {
    router: Arc<PoolRouter>,
}

impl SqlPostStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn save_tx(&self, tx: &mut Tx, post: &Post) -> StoreResult<()> {
        let qb = self.qb();
        if post.is_reply() {
            let stmt = locked_root_query(&qb, &post.root_id).to_statement();
            let root = tx
                .fetch_optional(&stmt)
                .await
                .map_err(internal("failed to lock root post"))?
                .map(|row| Post::from_row(&row))
                .transpose()?;
            check_reply_root(post, root.as_ref())?;
        }

        let stmt = qb
            .insert("Posts")
            .columns(POST_COLUMNS)
            .values(vec![
                post.id.as_str().into(),
                post.create_at.into(),
                post.update_at.into(),
                post.edit_at.into(),
                post.delete_at.into(),
                post.is_pinned.into(),
                post.user_id.as_str().into(),
                post.channel_id.as_str().into(),
                post.root_id.as_str().into(),
                post.message.as_str().into(),
                post.post_type.as_str().into(),
                interface_arg(&post.props)?,
                post.hashtags.as_str().into(),
                array_arg(&post.file_ids)?,
            ])
            .to_statement();
        tx.execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("Post", "id", &post.id)
            } else {
                internal("failed to save post")(e)
            }
        })?;

        let stmt = qb
            .update("Channels")
            .set_raw("LastPostAt", "GREATEST(LastPostAt, ?)", [post.create_at])
            .set_raw("TotalMsgCount", "TotalMsgCount + 1", Vec::<i64>::new())
            .where_(Expr::eq("Id", post.channel_id.as_str()))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to update channel post counters"))?;

        if post.is_reply() {
            self.record_reply(tx, post).await?;
        }
        Ok(())
    }

    async fn record_reply(&self, tx: &mut Tx, reply: &Post) -> StoreResult<()> {
        let qb = self.qb();
        let lock = locked_thread_query(&qb, &reply.root_id).to_statement();

        let existing = tx
            .fetch_optional(&lock)
            .await
            .map_err(internal("failed to lock thread"))?;
        if let Some(row) = existing {
            let mut thread = Thread::from_row(&row)?;
            thread.add_reply(reply);
            return write_thread(&qb, tx, &thread).await;
        }

        let thread = Thread::for_reply(&reply.root_id, &reply.channel_id, reply);
        if insert_thread(&qb, tx, &thread).await? {
            return Ok(());
        }

        // Another reply created the thread between our lock and insert.
        let row = tx
            .fetch_optional(&lock)
            .await
            .map_err(internal("failed to lock thread"))?
            .ok_or_else(|| StoreError::internal(format!("thread vanished: post_id={}", reply.root_id)))?;
        let mut thread = Thread::from_row(&row)?;
        thread.add_reply(reply);
        write_thread(&qb, tx, &thread).await
    }

    async fn delete_tx(&self, tx: &mut Tx, id: &str, time: i64) -> StoreResult<()> {
        let qb = self.qb();
        let stmt = qb
            .select(POST_COLUMNS)
            .from("Posts")
            .where_(Expr::eq("Id", id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        let row = tx
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to load post"))?
            .ok_or_else(|| StoreError::not_found("Post", id))?;
        let post = Post::from_row(&row)?;

        let stmt = qb
            .update("Posts")
            .set("DeleteAt", time)
            .set("UpdateAt", time)
            .where_(Expr::eq("Id", id))
            .to_statement();
        tx.execute(&stmt).await.map_err(internal("failed to delete post"))?;

        let stmt = qb
            .update("FileInfo")
            .set("DeleteAt", time)
            .set("UpdateAt", time)
            .where_(Expr::eq("PostId", id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to delete post files"))?;

        if post.is_reply() {
            let stmt = qb
                .update("Threads")
                .set_raw("ReplyCount", "ReplyCount - 1", Vec::<i64>::new())
                .where_(Expr::eq("PostId", post.root_id.as_str()))
                .where_(Expr::gt("ReplyCount", 0_i64))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to decrement thread replies"))?;
            return Ok(());
        }

        let stmt = qb
            .update("Posts")
            .set("DeleteAt", time)
            .set("UpdateAt", time)
            .where_(Expr::eq("RootId", id))
            .where_(Expr::not_eq("Id", id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to delete thread replies"))?;

        let stmt = qb
            .delete("Threads")
            .where_(Expr::eq("PostId", id))
            .to_statement();
        tx.execute(&stmt).await.map_err(internal("failed to delete thread"))?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for SqlPostStore {
    async fn save(&self, post: &Post) -> StoreResult<Post> {
        let mut post = post.clone();
        post.pre_save();
        post.validate().map_err(|e| validation_error("Post", e))?;

        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.save_tx(&mut tx, &post).await;
        finish(tx, result).await?;

        tracing::debug!(post_id = %post.id, root_id = %post.root_id, "Post saved");
        Ok(post)
    }

    async fn get(&self, id: &str) -> StoreResult<Post> {
        let stmt = self
            .qb()
            .select(POST_COLUMNS)
            .from("Posts")
            .where_(Expr::eq("Id", id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get post id={id}")))?
            .ok_or_else(|| StoreError::not_found("Post", id))?;
        Ok(Post::from_row(&row)?)
    }

    async fn update(&self, post: &Post) -> StoreResult<Post> {
        let mut post = post.clone();
        post.update_at = get_millis();
        post.validate().map_err(|e| validation_error("Post", e))?;

        let stmt = self
            .qb()
            .update("Posts")
            .set("UpdateAt", post.update_at)
            .set("EditAt", post.edit_at)
            .set("IsPinned", post.is_pinned)
            .set("Message", post.message.as_str())
            .set("Type", post.post_type.as_str())
            .set("Props", interface_arg(&post.props)?)
            .set("Hashtags", post.hashtags.as_str())
            .set("FileIds", array_arg(&post.file_ids)?)
            .where_(Expr::eq("Id", post.id.as_str()))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to update post"))?;
        if count == 0 {
            return Err(StoreError::not_found("Post", &post.id));
        }
        Ok(post)
    }

    async fn delete(&self, id: &str, time: i64) -> StoreResult<()> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.delete_tx(&mut tx, id, time).await;
        finish(tx, result).await
    }

    async fn permanent_delete_by_channel(&self, channel_id: &str) -> StoreResult<()> {
        let qb = self.qb();
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result: StoreResult<()> = async {
            for table in ["Threads", "Posts"] {
                let stmt = qb
                    .delete(table)
                    .where_(Expr::eq("ChannelId", channel_id))
                    .to_statement();
                tx.execute(&stmt)
                    .await
                    .map_err(internal(format!("failed to delete {table} for channel")))?;
            }
            Ok(())
        }
        .await;
        finish(tx, result).await
    }

    async fn get_flagged_post_ids(&self, user_id: &str, channel_id: &str) -> StoreResult<Vec<String>> {
        let stmt = self
            .qb()
            .select(&["p.Id"])
            .from("Posts p")
            .join("Preferences pr ON pr.Name = p.Id")
            .where_(Expr::eq("pr.UserId", user_id))
            .where_(Expr::eq("pr.Category", PREFERENCE_CATEGORY_FLAGGED_POST))
            .where_(Expr::eq("p.ChannelId", channel_id))
            .where_(Expr::eq("p.DeleteAt", 0_i64))
            .order_by("p.CreateAt")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get flagged posts"))?;
        Ok(strings(&rows, "Id")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{Arg, Dialect};
    use pretty_assertions::assert_eq;

    fn post(id: &str, channel_id: &str, root_id: &str) -> Post {
        Post {
            id: id.into(),
            channel_id: channel_id.into(),
            root_id: root_id.into(),
            ..Default::default()
        }
    }

    fn assert_rejects_root(err: StoreError) {
        match err {
            StoreError::InvalidInput { entity, field, value } => {
                assert_eq!(entity, "Post");
                assert_eq!(field, "root_id");
                assert_eq!(value, "root");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reply_to_top_level_post() {
        let root = post("root", "c1", "root");
        let reply = post("r1", "c1", "root");
        assert!(check_reply_root(&reply, Some(&root)).is_ok());
    }

    #[test]
    fn test_reply_to_missing_root() {
        let reply = post("r1", "c1", "root");
        assert_rejects_root(check_reply_root(&reply, None).unwrap_err());
    }

    #[test]
    fn test_reply_to_reply_rejected() {
        let root = post("root", "c1", "other");
        let reply = post("r1", "c1", "root");
        assert_rejects_root(check_reply_root(&reply, Some(&root)).unwrap_err());
    }

    #[test]
    fn test_reply_across_channels_rejected() {
        let root = post("root", "c2", "root");
        let reply = post("r1", "c1", "root");
        assert_rejects_root(check_reply_root(&reply, Some(&root)).unwrap_err());
    }

    #[test]
    fn test_locked_root_query_postgres() {
        let qb = QueryBuilder::new(Dialect::Postgres);
        let stmt = locked_root_query(&qb, "root").to_statement();
        assert!(stmt.sql.starts_with("SELECT Id, CreateAt, UpdateAt"));
        assert!(stmt.sql.ends_with("FROM Posts WHERE Id = $1 AND DeleteAt = $2 FOR UPDATE"));
        assert_eq!(stmt.args, vec![Arg::Text("root".into()), Arg::Int(0)]);
    }
}
