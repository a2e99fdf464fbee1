//! Channel Repository Implementation
//!
//! Channels and memberships. Membership changes are mirrored into the
//! member history log.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::channel_member_history_repository::SqlChannelMemberHistoryStore;
use super::helpers::map_arg;
use crate::domain::entities::{
    Channel, ChannelMember, ChannelMemberHistoryStore, ChannelStore, ChannelType,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    finish, DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const CHANNEL_COLUMNS: &[&str] = &[
    "Id",
    "CreateAt",
    "UpdateAt",
    "DeleteAt",
    "TeamId",
    "Type",
    "DisplayName",
    "Name",
    "Header",
    "Purpose",
    "LastPostAt",
    "TotalMsgCount",
    "CreatorId",
    "GroupConstrained",
];

const CHANNEL_MEMBER_COLUMNS: &[&str] = &[
    "ChannelId",
    "UserId",
    "Roles",
    "LastViewedAt",
    "MsgCount",
    "MentionCount",
    "NotifyProps",
    "LastUpdateAt",
    "SchemeUser",
    "SchemeAdmin",
    "SchemeGuest",
];

impl FromAnyRow for Channel {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        let channel_type = row.text("Type")?;
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
            team_id: row.text("TeamId")?,
            channel_type: ChannelType::from_str(&channel_type).ok_or_else(|| {
                DbError::decode("Type", format!("unknown channel type {channel_type:?}"))
            })?,
            display_name: row.text("DisplayName")?,
            name: row.text("Name")?,
            header: row.text("Header")?,
            purpose: row.text("Purpose")?,
            last_post_at: row.int("LastPostAt")?,
            total_msg_count: row.int("TotalMsgCount")?,
            creator_id: row.text("CreatorId")?,
            group_constrained: row.boolean("GroupConstrained")?,
        })
    }
}

impl FromAnyRow for ChannelMember {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            channel_id: row.text("ChannelId")?,
            user_id: row.text("UserId")?,
            roles: row.text("Roles")?,
            last_viewed_at: row.int("LastViewedAt")?,
            msg_count: row.int("MsgCount")?,
            mention_count: row.int("MentionCount")?,
            notify_props: row.json("NotifyProps")?,
            last_update_at: row.int("LastUpdateAt")?,
            scheme_user: row.boolean("SchemeUser")?,
            scheme_admin: row.boolean("SchemeAdmin")?,
            scheme_guest: row.boolean("SchemeGuest")?,
        })
    }
}

fn prefixed(alias: &str, columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| format!("{alias}.{c}")).collect()
}

/// SQL channel store.
#[derive(Clone)]
pub struct SqlChannelStore {
    router: Arc<PoolRouter>,
    history: SqlChannelMemberHistoryStore,
}

impl SqlChannelStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        let history = SqlChannelMemberHistoryStore::new(Arc::clone(&router));
        Self { router, history }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }
}

#[async_trait]
impl ChannelStore for SqlChannelStore {
    async fn save(&self, channel: &Channel) -> StoreResult<Channel> {
        let mut channel = channel.clone();
        channel.pre_save();
        channel.validate().map_err(|e| validation_error("Channel", e))?;

        let stmt = self
            .qb()
            .insert("Channels")
            .columns(CHANNEL_COLUMNS)
            .values(vec![
                channel.id.as_str().into(),
                channel.create_at.into(),
                channel.update_at.into(),
                channel.delete_at.into(),
                channel.team_id.as_str().into(),
                channel.channel_type.as_str().into(),
                channel.display_name.as_str().into(),
                channel.name.as_str().into(),
                channel.header.as_str().into(),
                channel.purpose.as_str().into(),
                channel.last_post_at.into(),
                channel.total_msg_count.into(),
                channel.creator_id.as_str().into(),
                channel.group_constrained.into(),
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() && e.constraint_mentions("name") {
                StoreError::invalid_input("Channel", "name", &channel.name)
            } else if e.is_unique_violation() {
                StoreError::invalid_input("Channel", "id", &channel.id)
            } else {
                internal("failed to save channel")(e)
            }
        })?;

        tracing::debug!(channel_id = %channel.id, "Channel saved");
        Ok(channel)
    }

    async fn get(&self, id: &str) -> StoreResult<Channel> {
        let stmt = self
            .qb()
            .select(CHANNEL_COLUMNS)
            .from("Channels")
            .where_(Expr::eq("Id", id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get channel id={id}")))?
            .ok_or_else(|| StoreError::not_found("Channel", id))?;
        Ok(Channel::from_row(&row)?)
    }

    async fn get_by_name(&self, team_id: &str, name: &str) -> StoreResult<Channel> {
        let stmt = self
            .qb()
            .select(CHANNEL_COLUMNS)
            .from("Channels")
            .where_(Expr::eq("TeamId", team_id))
            .where_(Expr::eq("Name", name))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get channel by name"))?
            .ok_or_else(|| StoreError::not_found("Channel", format!("team_id={team_id}, name={name}")))?;
        Ok(Channel::from_row(&row)?)
    }

    async fn delete(&self, id: &str, time: i64) -> StoreResult<()> {
        let stmt = self
            .qb()
            .update("Channels")
            .set("DeleteAt", time)
            .set("UpdateAt", time)
            .where_(Expr::eq("Id", id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal(format!("failed to delete channel id={id}")))?;
        Ok(())
    }

    async fn save_member(&self, member: &ChannelMember) -> StoreResult<ChannelMember> {
        let mut member = member.clone();
        member.last_update_at = get_millis();

        let stmt = self
            .qb()
            .insert("ChannelMembers")
            .columns(CHANNEL_MEMBER_COLUMNS)
            .values(vec![
                member.channel_id.as_str().into(),
                member.user_id.as_str().into(),
                member.roles.as_str().into(),
                member.last_viewed_at.into(),
                member.msg_count.into(),
                member.mention_count.into(),
                map_arg(&member.notify_props)?,
                member.last_update_at.into(),
                member.scheme_user.into(),
                member.scheme_admin.into(),
                member.scheme_guest.into(),
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input(
                    "ChannelMember",
                    "channel_id",
                    format!("{} user_id={}", member.channel_id, member.user_id),
                )
            } else {
                internal("failed to save channel member")(e)
            }
        })?;

        self.history
            .log_join_event(&member.user_id, &member.channel_id, member.last_update_at)
            .await?;
        Ok(member)
    }

    async fn get_member(&self, channel_id: &str, user_id: &str) -> StoreResult<ChannelMember> {
        let stmt = self
            .qb()
            .select(CHANNEL_MEMBER_COLUMNS)
            .from("ChannelMembers")
            .where_(Expr::eq("ChannelId", channel_id))
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get channel member"))?
            .ok_or_else(|| {
                StoreError::not_found("ChannelMember", format!("channel_id={channel_id}, user_id={user_id}"))
            })?;
        Ok(ChannelMember::from_row(&row)?)
    }

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> StoreResult<()> {
        let qb = self.qb();
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;

        let result: StoreResult<()> = async {
            for table in ["ChannelMembers", "SidebarChannels"] {
                let stmt = qb
                    .delete(table)
                    .where_(Expr::eq("ChannelId", channel_id))
                    .where_(Expr::eq("UserId", user_id))
                    .to_statement();
                tx.execute(&stmt)
                    .await
                    .map_err(internal(format!("failed to delete from {table}")))?;
            }
            Ok(())
        }
        .await;
        finish(tx, result).await?;

        self.history
            .log_leave_event(user_id, channel_id, get_millis())
            .await
    }

    async fn get_members_for_user(&self, user_id: &str) -> StoreResult<Vec<ChannelMember>> {
        let stmt = self
            .qb()
            .select(CHANNEL_MEMBER_COLUMNS)
            .from("ChannelMembers")
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get channel members for user"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_channels_for_user_on_team(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Channel>> {
        let columns = prefixed("c", CHANNEL_COLUMNS);
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        let stmt = self
            .qb()
            .select(&columns)
            .from("Channels c")
            .join("ChannelMembers cm ON cm.ChannelId = c.Id")
            .where_(Expr::eq("cm.UserId", user_id))
            .where_(Expr::or(vec![
                Expr::eq("c.TeamId", team_id),
                Expr::eq("c.TeamId", ""),
            ]))
            .where_(Expr::eq("c.DeleteAt", 0_i64))
            .order_by("c.DisplayName")
            .order_by("c.Id")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get channels for user"))?;
        Ok(decode_all(&rows)?)
    }
}
