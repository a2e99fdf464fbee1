//! Group Repository Implementation
//!
//! Groups, their members and the polymorphic team/channel syncables, plus
//! the reconciliation queries that compare group membership with team and
//! channel membership.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use crate::domain::entities::{
    Group, GroupMember, GroupSearchOpts, GroupSource, GroupStore, GroupSyncable, SyncableTarget,
    SyncableType, UserChannelIdPair, UserTeamIdPair,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::{decode_all, strings};
use crate::infrastructure::database::{
    DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::{get_millis, ID_LENGTH};
use crate::shared::validation::{sanitize_search_term, validation_error};

const GROUP_COLUMNS: &[&str] = &[
    "ug.Id",
    "ug.Name",
    "ug.DisplayName",
    "ug.Description",
    "ug.Source",
    "ug.RemoteId",
    "ug.CreateAt",
    "ug.UpdateAt",
    "ug.DeleteAt",
    "ug.AllowReference",
];

const SYNCABLE_COLUMNS: &[&str] = &["AutoAdd", "SchemeAdmin", "CreateAt", "UpdateAt", "DeleteAt"];

impl FromAnyRow for Group {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        let source = row.text("Source")?;
        Ok(Self {
            id: row.text("Id")?,
            name: row.opt_text("Name")?,
            display_name: row.text("DisplayName")?,
            description: row.text("Description")?,
            source: GroupSource::from_str(&source)
                .ok_or_else(|| DbError::decode("Source", format!("unknown group source {source:?}")))?,
            remote_id: row.text("RemoteId")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
            allow_reference: row.boolean("AllowReference")?,
            member_count: None,
        })
    }
}

impl FromAnyRow for GroupMember {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            group_id: row.text("GroupId")?,
            user_id: row.text("UserId")?,
            create_at: row.int("CreateAt")?,
            delete_at: row.int("DeleteAt")?,
        })
    }
}

fn syncable_from_row(row: &AnyRow, kind: SyncableType) -> Result<GroupSyncable, DbError> {
    let id = row.text(kind.id_column())?;
    let target = match kind {
        SyncableType::Team => SyncableTarget::Team { team_id: id },
        SyncableType::Channel => SyncableTarget::Channel { channel_id: id },
    };
    Ok(GroupSyncable {
        group_id: row.text("GroupId")?,
        target,
        auto_add: row.boolean("AutoAdd")?,
        scheme_admin: row.boolean("SchemeAdmin")?,
        create_at: row.int("CreateAt")?,
        update_at: row.int("UpdateAt")?,
        delete_at: row.int("DeleteAt")?,
    })
}

fn group_write_error(group: &Group, context: &str, err: DbError) -> StoreError {
    if !err.is_unique_violation() {
        return internal(context)(err);
    }
    if err.constraint_mentions("remoteid") || err.constraint_mentions("source") {
        StoreError::invalid_input("Group", "remote_id", &group.remote_id)
    } else if err.constraint_mentions("name") {
        StoreError::invalid_input("Group", "name", group.name.as_deref().unwrap_or_default())
    } else {
        StoreError::invalid_input("Group", "id", &group.id)
    }
}

/// SQL group store.
#[derive(Clone)]
pub struct SqlGroupStore {
    router: Arc<PoolRouter>,
}

impl SqlGroupStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    fn groups(&self) -> SelectBuilder {
        self.qb().select(GROUP_COLUMNS).from("UserGroups ug")
    }

    async fn get_group_by(&self, db: &DbHandle, expr: Expr, key: String) -> StoreResult<Group> {
        let stmt = self.groups().where_(expr).to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get group"))?
            .ok_or_else(|| StoreError::not_found("Group", key))?;
        Ok(Group::from_row(&row)?)
    }

    async fn set_group_delete_at(&self, id: &str, deleted: bool) -> StoreResult<Group> {
        let master = self.router.master();
        let mut group = self
            .get_group_by(&master, Expr::eq("ug.Id", id), id.to_string())
            .await?;
        if (group.delete_at != 0) == deleted {
            return Err(StoreError::not_found("Group", id));
        }

        let now = get_millis();
        group.delete_at = if deleted { now } else { 0 };
        group.update_at = now;
        let stmt = self
            .qb()
            .update("UserGroups")
            .set("DeleteAt", group.delete_at)
            .set("UpdateAt", group.update_at)
            .where_(Expr::eq("Id", id))
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to change group deletion"))?;
        Ok(group)
    }

    async fn get_syncable_from(
        &self,
        db: &DbHandle,
        group_id: &str,
        syncable_id: &str,
        kind: SyncableType,
    ) -> StoreResult<GroupSyncable> {
        let stmt = self
            .qb()
            .select(&["GroupId", kind.id_column()])
            .columns(SYNCABLE_COLUMNS)
            .from(kind.table())
            .where_(Expr::eq("GroupId", group_id))
            .where_(Expr::eq(kind.id_column(), syncable_id))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get group syncable"))?
            .ok_or_else(|| {
                StoreError::not_found("GroupSyncable", format!("group_id={group_id}, {kind}={syncable_id}"))
            })?;
        Ok(syncable_from_row(&row, kind)?)
    }

    async fn user_team_pairs(&self, query: SelectBuilder) -> StoreResult<Vec<UserTeamIdPair>> {
        let rows = self
            .router
            .replica()
            .fetch_all(&query.to_statement())
            .await
            .map_err(internal("failed to compute team membership changes"))?;
        rows.iter()
            .map(|row| {
                Ok(UserTeamIdPair {
                    user_id: row.text("UserId")?,
                    team_id: row.text("TeamId")?,
                })
            })
            .collect()
    }

    async fn user_channel_pairs(&self, query: SelectBuilder) -> StoreResult<Vec<UserChannelIdPair>> {
        let rows = self
            .router
            .replica()
            .fetch_all(&query.to_statement())
            .await
            .map_err(internal("failed to compute channel membership changes"))?;
        rows.iter()
            .map(|row| {
                Ok(UserChannelIdPair {
                    user_id: row.text("UserId")?,
                    channel_id: row.text("ChannelId")?,
                })
            })
            .collect()
    }

    async fn user_ids(&self, query: SelectBuilder, context: &str) -> StoreResult<Vec<String>> {
        let rows = self
            .router
            .replica()
            .fetch_all(&query.to_statement())
            .await
            .map_err(internal(context))?;
        Ok(strings(&rows, "UserId")?)
    }

    /// Active members of groups with an active auto-add link to a team.
    fn auto_add_team_members(&self) -> SelectBuilder {
        self.qb()
            .select(&["gm.UserId", "gt.TeamId"])
            .distinct()
            .from("GroupMembers gm")
            .join("GroupTeams gt ON gt.GroupId = gm.GroupId")
            .join("UserGroups ug ON ug.Id = gm.GroupId")
            .join("Teams t ON t.Id = gt.TeamId")
            .where_(Expr::eq("ug.DeleteAt", 0_i64))
            .where_(Expr::eq("gt.DeleteAt", 0_i64))
            .where_(Expr::eq("gt.AutoAdd", true))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::eq("t.DeleteAt", 0_i64))
    }

    fn auto_add_channel_members(&self) -> SelectBuilder {
        self.qb()
            .select(&["gm.UserId", "gc.ChannelId"])
            .distinct()
            .from("GroupMembers gm")
            .join("GroupChannels gc ON gc.GroupId = gm.GroupId")
            .join("UserGroups ug ON ug.Id = gm.GroupId")
            .join("Channels c ON c.Id = gc.ChannelId")
            .where_(Expr::eq("ug.DeleteAt", 0_i64))
            .where_(Expr::eq("gc.DeleteAt", 0_i64))
            .where_(Expr::eq("gc.AutoAdd", true))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::eq("c.DeleteAt", 0_i64))
    }

    /// Active group memberships covering `(user, syncable)` for the outer row.
    fn covering_memberships(&self, kind: SyncableType, outer: &str) -> SelectBuilder {
        let id_column = kind.id_column();
        self.qb()
            .select(&["1"])
            .from(&format!("{} gs", kind.table()))
            .join("GroupMembers cgm ON cgm.GroupId = gs.GroupId")
            .join("UserGroups cug ON cug.Id = gs.GroupId")
            .where_(Expr::raw(&format!("gs.{id_column} = {outer}.{id_column}")))
            .where_(Expr::raw(&format!("cgm.UserId = {outer}.UserId")))
            .where_(Expr::eq("gs.DeleteAt", 0_i64))
            .where_(Expr::eq("cgm.DeleteAt", 0_i64))
            .where_(Expr::eq("cug.DeleteAt", 0_i64))
    }
}

#[async_trait]
impl GroupStore for SqlGroupStore {
    async fn create(&self, group: &Group) -> StoreResult<Group> {
        let mut group = group.clone();
        group.pre_save();
        group.validate().map_err(|e| validation_error("Group", e))?;

        let stmt = self
            .qb()
            .insert("UserGroups")
            .columns(&[
                "Id",
                "Name",
                "DisplayName",
                "Description",
                "Source",
                "RemoteId",
                "CreateAt",
                "UpdateAt",
                "DeleteAt",
                "AllowReference",
            ])
            .values(vec![
                group.id.as_str().into(),
                group.name.clone().into(),
                group.display_name.as_str().into(),
                group.description.as_str().into(),
                group.source.as_str().into(),
                group.remote_id.as_str().into(),
                group.create_at.into(),
                group.update_at.into(),
                group.delete_at.into(),
                group.allow_reference.into(),
            ])
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(|e| group_write_error(&group, "failed to create group", e))?;
        Ok(group)
    }

    async fn get(&self, id: &str) -> StoreResult<Group> {
        self.get_group_by(&self.router.replica(), Expr::eq("ug.Id", id), id.to_string())
            .await
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Group> {
        self.get_group_by(
            &self.router.replica(),
            Expr::eq("ug.Name", name),
            format!("name={name}"),
        )
        .await
    }

    async fn get_by_remote_id(&self, remote_id: &str, source: GroupSource) -> StoreResult<Group> {
        self.get_group_by(
            &self.router.replica(),
            Expr::and(vec![
                Expr::eq("ug.RemoteId", remote_id),
                Expr::eq("ug.Source", source.as_str()),
            ]),
            format!("remote_id={remote_id}, source={source}"),
        )
        .await
    }

    async fn get_all_by_source(&self, source: GroupSource) -> StoreResult<Vec<Group>> {
        let stmt = self
            .groups()
            .where_(Expr::eq("ug.Source", source.as_str()))
            .where_(Expr::eq("ug.DeleteAt", 0_i64))
            .order_by("ug.DisplayName")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get groups by source"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Group>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = self.groups().where_(Expr::in_list("ug.Id", ids)).to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get groups by ids"))?;
        Ok(decode_all(&rows)?)
    }

    async fn update(&self, group: &Group) -> StoreResult<Group> {
        let mut group = group.clone();
        group.update_at = get_millis();
        group.validate().map_err(|e| validation_error("Group", e))?;

        let master = self.router.master();
        let stored = self
            .get_group_by(&master, Expr::eq("ug.Id", group.id.as_str()), group.id.clone())
            .await?;
        group.create_at = stored.create_at;

        let stmt = self
            .qb()
            .update("UserGroups")
            .set("Name", group.name.clone())
            .set("DisplayName", group.display_name.as_str())
            .set("Description", group.description.as_str())
            .set("Source", group.source.as_str())
            .set("RemoteId", group.remote_id.as_str())
            .set("UpdateAt", group.update_at)
            .set("DeleteAt", group.delete_at)
            .set("AllowReference", group.allow_reference)
            .where_(Expr::eq("Id", group.id.as_str()))
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(|e| group_write_error(&group, "failed to update group", e))?;
        Ok(group)
    }

    async fn delete(&self, id: &str) -> StoreResult<Group> {
        self.set_group_delete_at(id, true).await
    }

    async fn restore(&self, id: &str) -> StoreResult<Group> {
        self.set_group_delete_at(id, false).await
    }

    async fn upsert_member(&self, group_id: &str, user_id: &str) -> StoreResult<GroupMember> {
        let master = self.router.master();
        self.get_group_by(
            &master,
            Expr::and(vec![Expr::eq("ug.Id", group_id), Expr::eq("ug.DeleteAt", 0_i64)]),
            group_id.to_string(),
        )
        .await?;

        let member = GroupMember {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            create_at: get_millis(),
            delete_at: 0,
        };
        let stmt = self
            .qb()
            .insert("GroupMembers")
            .columns(&["GroupId", "UserId", "CreateAt", "DeleteAt"])
            .values(vec![
                member.group_id.as_str().into(),
                member.user_id.as_str().into(),
                member.create_at.into(),
                member.delete_at.into(),
            ])
            .upsert(&["GroupId", "UserId"], &["CreateAt", "DeleteAt"])
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to upsert group member"))?;
        Ok(member)
    }

    async fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<GroupMember> {
        let master = self.router.master();
        let stmt = self
            .qb()
            .select(&["GroupId", "UserId", "CreateAt", "DeleteAt"])
            .from("GroupMembers")
            .where_(Expr::eq("GroupId", group_id))
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        let row = master
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get group member"))?
            .ok_or_else(|| StoreError::not_found("GroupMember", format!("group_id={group_id}, user_id={user_id}")))?;
        let mut member = GroupMember::from_row(&row)?;

        member.delete_at = get_millis();
        let stmt = self
            .qb()
            .update("GroupMembers")
            .set("DeleteAt", member.delete_at)
            .where_(Expr::eq("GroupId", group_id))
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete group member"))?;
        Ok(member)
    }

    async fn get_member_users(&self, group_id: &str) -> StoreResult<Vec<String>> {
        let query = self
            .qb()
            .select(&["u.Id AS UserId"])
            .from("Users u")
            .join("GroupMembers gm ON gm.UserId = u.Id")
            .where_(Expr::eq("gm.GroupId", group_id))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::eq("u.DeleteAt", 0_i64))
            .order_by("u.Id");
        self.user_ids(query, "failed to get group members").await
    }

    async fn get_member_count(&self, group_id: &str) -> StoreResult<i64> {
        let stmt = self
            .qb()
            .select(&["COUNT(DISTINCT u.Id)"])
            .from("Users u")
            .join("GroupMembers gm ON gm.UserId = u.Id")
            .where_(Expr::eq("gm.GroupId", group_id))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::eq("u.DeleteAt", 0_i64))
            .to_statement();
        self.router
            .replica()
            .fetch_count(&stmt)
            .await
            .map_err(internal("failed to count group members"))
    }

    async fn create_group_syncable(&self, syncable: &GroupSyncable) -> StoreResult<GroupSyncable> {
        let kind = syncable.syncable_type();
        let master = self.router.master();

        let (table, entity) = match kind {
            SyncableType::Team => ("Teams", "Team"),
            SyncableType::Channel => ("Channels", "Channel"),
        };
        let exists = self
            .qb()
            .select(&["Id"])
            .from(table)
            .where_(Expr::eq("Id", syncable.syncable_id()))
            .to_statement();
        if master
            .fetch_optional(&exists)
            .await
            .map_err(internal("failed to check syncable target"))?
            .is_none()
        {
            return Err(StoreError::not_found(entity, syncable.syncable_id()));
        }

        let mut syncable = syncable.clone();
        let now = get_millis();
        if syncable.create_at == 0 {
            syncable.create_at = now;
        }
        syncable.update_at = syncable.create_at;

        let stmt = self
            .qb()
            .insert(kind.table())
            .columns(&[
                "GroupId",
                kind.id_column(),
                "AutoAdd",
                "SchemeAdmin",
                "CreateAt",
                "UpdateAt",
                "DeleteAt",
            ])
            .values(vec![
                syncable.group_id.as_str().into(),
                syncable.syncable_id().into(),
                syncable.auto_add.into(),
                syncable.scheme_admin.into(),
                syncable.create_at.into(),
                syncable.update_at.into(),
                syncable.delete_at.into(),
            ])
            .to_statement();
        master.execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("GroupSyncable", "group_id", &syncable.group_id)
            } else {
                internal("failed to create group syncable")(e)
            }
        })?;
        Ok(syncable)
    }

    async fn get_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<GroupSyncable> {
        self.get_syncable_from(&self.router.replica(), group_id, syncable_id, syncable_type)
            .await
    }

    async fn get_all_group_syncables_by_group_id(
        &self,
        group_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<Vec<GroupSyncable>> {
        let stmt = self
            .qb()
            .select(&["GroupId", syncable_type.id_column()])
            .columns(SYNCABLE_COLUMNS)
            .from(syncable_type.table())
            .where_(Expr::eq("GroupId", group_id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get group syncables"))?;
        rows.iter()
            .map(|row| Ok(syncable_from_row(row, syncable_type)?))
            .collect()
    }

    async fn update_group_syncable(&self, syncable: &GroupSyncable) -> StoreResult<GroupSyncable> {
        let kind = syncable.syncable_type();
        let mut syncable = syncable.clone();
        syncable.update_at = get_millis();

        let stmt = self
            .qb()
            .update(kind.table())
            .set("AutoAdd", syncable.auto_add)
            .set("SchemeAdmin", syncable.scheme_admin)
            .set("UpdateAt", syncable.update_at)
            .set("DeleteAt", syncable.delete_at)
            .where_(Expr::eq("GroupId", syncable.group_id.as_str()))
            .where_(Expr::eq(kind.id_column(), syncable.syncable_id()))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to update group syncable"))?;
        if count == 0 {
            return Err(StoreError::not_found(
                "GroupSyncable",
                format!("group_id={}, {kind}={}", syncable.group_id, syncable.syncable_id()),
            ));
        }
        Ok(syncable)
    }

    async fn delete_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> StoreResult<GroupSyncable> {
        let master = self.router.master();
        let mut syncable = self
            .get_syncable_from(&master, group_id, syncable_id, syncable_type)
            .await?;
        if syncable.delete_at != 0 {
            return Err(StoreError::invalid_input(
                "GroupSyncable",
                "delete_at",
                syncable.delete_at,
            ));
        }

        let now = get_millis();
        syncable.delete_at = now;
        syncable.update_at = now;
        let stmt = self
            .qb()
            .update(syncable_type.table())
            .set("DeleteAt", now)
            .set("UpdateAt", now)
            .where_(Expr::eq("GroupId", group_id))
            .where_(Expr::eq(syncable_type.id_column(), syncable_id))
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete group syncable"))?;
        Ok(syncable)
    }

    async fn team_members_to_add(
        &self,
        since: i64,
        team_id: Option<String>,
        include_removed_members: bool,
    ) -> StoreResult<Vec<UserTeamIdPair>> {
        let mut query = self
            .auto_add_team_members()
            .left_join("TeamMembers tm ON tm.TeamId = gt.TeamId AND tm.UserId = gm.UserId");
        if include_removed_members {
            query = query.where_(Expr::or(vec![
                Expr::is_null("tm.UserId"),
                Expr::not_eq("tm.DeleteAt", 0_i64),
            ]));
        } else {
            query = query.where_(Expr::is_null("tm.UserId")).where_(Expr::or(vec![
                Expr::gte("gm.CreateAt", since),
                Expr::gte("gt.UpdateAt", since),
            ]));
        }
        if let Some(team_id) = &team_id {
            query = query.where_(Expr::eq("gt.TeamId", team_id));
        }
        self.user_team_pairs(query).await
    }

    async fn channel_members_to_add(
        &self,
        since: i64,
        channel_id: Option<String>,
        include_removed_members: bool,
    ) -> StoreResult<Vec<UserChannelIdPair>> {
        let mut query = self
            .auto_add_channel_members()
            .left_join("ChannelMembers cm ON cm.ChannelId = gc.ChannelId AND cm.UserId = gm.UserId")
            .where_(Expr::is_null("cm.UserId"));
        if !include_removed_members {
            let history = self
                .qb()
                .select(&["1"])
                .from("ChannelMemberHistory cmh")
                .where_(Expr::raw("cmh.ChannelId = gc.ChannelId"))
                .where_(Expr::raw("cmh.UserId = gm.UserId"));
            query = query.where_(Expr::not_exists(&history)).where_(Expr::or(vec![
                Expr::gte("gm.CreateAt", since),
                Expr::gte("gc.UpdateAt", since),
            ]));
        }
        if let Some(channel_id) = &channel_id {
            query = query.where_(Expr::eq("gc.ChannelId", channel_id));
        }
        self.user_channel_pairs(query).await
    }

    async fn team_members_to_remove(&self, team_id: Option<String>) -> StoreResult<Vec<UserTeamIdPair>> {
        let covered = self.covering_memberships(SyncableType::Team, "tm");
        let mut query = self
            .qb()
            .select(&["tm.UserId", "tm.TeamId"])
            .from("TeamMembers tm")
            .join("Teams t ON t.Id = tm.TeamId")
            .left_join("Bots b ON b.UserId = tm.UserId")
            .where_(Expr::eq("tm.DeleteAt", 0_i64))
            .where_(Expr::eq("t.DeleteAt", 0_i64))
            .where_(Expr::eq("t.GroupConstrained", true))
            .where_(Expr::is_null("b.UserId"))
            .where_(Expr::not_exists(&covered));
        if let Some(team_id) = &team_id {
            query = query.where_(Expr::eq("tm.TeamId", team_id));
        }
        self.user_team_pairs(query).await
    }

    async fn channel_members_to_remove(
        &self,
        channel_id: Option<String>,
    ) -> StoreResult<Vec<UserChannelIdPair>> {
        let covered = self.covering_memberships(SyncableType::Channel, "cm");
        let mut query = self
            .qb()
            .select(&["cm.UserId", "cm.ChannelId"])
            .from("ChannelMembers cm")
            .join("Channels c ON c.Id = cm.ChannelId")
            .left_join("Bots b ON b.UserId = cm.UserId")
            .where_(Expr::eq("c.DeleteAt", 0_i64))
            .where_(Expr::eq("c.GroupConstrained", true))
            .where_(Expr::is_null("b.UserId"))
            .where_(Expr::not_exists(&covered));
        if let Some(channel_id) = &channel_id {
            query = query.where_(Expr::eq("cm.ChannelId", channel_id));
        }
        self.user_channel_pairs(query).await
    }

    async fn get_member_users_in_team(&self, group_id: &str, team_id: &str) -> StoreResult<Vec<String>> {
        let query = self
            .qb()
            .select(&["gm.UserId"])
            .from("GroupMembers gm")
            .join("TeamMembers tm ON tm.UserId = gm.UserId")
            .where_(Expr::eq("gm.GroupId", group_id))
            .where_(Expr::eq("tm.TeamId", team_id))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::eq("tm.DeleteAt", 0_i64))
            .order_by("gm.UserId");
        self.user_ids(query, "failed to get group members in team").await
    }

    async fn get_member_users_not_in_channel(
        &self,
        group_id: &str,
        channel_id: &str,
    ) -> StoreResult<Vec<String>> {
        let in_channel = self
            .qb()
            .select(&["1"])
            .from("ChannelMembers cm")
            .where_(Expr::raw("cm.ChannelId = c.Id"))
            .where_(Expr::raw("cm.UserId = gm.UserId"));
        let query = self
            .qb()
            .select(&["gm.UserId"])
            .distinct()
            .from("GroupMembers gm")
            .join("TeamMembers tm ON tm.UserId = gm.UserId AND tm.DeleteAt = 0")
            .join("Channels c ON c.TeamId = tm.TeamId")
            .where_(Expr::eq("c.Id", channel_id))
            .where_(Expr::eq("gm.GroupId", group_id))
            .where_(Expr::eq("gm.DeleteAt", 0_i64))
            .where_(Expr::not_exists(&in_channel))
            .order_by("gm.UserId");
        self.user_ids(query, "failed to get group members not in channel")
            .await
    }

    async fn get_groups(&self, page: u64, per_page: u64, opts: GroupSearchOpts) -> StoreResult<Vec<Group>> {
        let qb = self.qb();
        let mut query = self
            .groups()
            .where_if(opts.since == 0, || Expr::eq("ug.DeleteAt", 0_i64));

        if opts.include_member_count {
            let counts = qb
                .select(&["gm.GroupId", "COUNT(*) AS MemberCount"])
                .from("GroupMembers gm")
                .join("Users u ON u.Id = gm.UserId")
                .where_(Expr::eq("gm.DeleteAt", 0_i64))
                .where_(Expr::eq("u.DeleteAt", 0_i64))
                .group_by(&["gm.GroupId"]);
            query = query
                .column("COALESCE(mc.MemberCount, 0) AS MemberCount")
                .left_join_subquery(&counts, "mc", "mc.GroupId = ug.Id");
        }

        let term = sanitize_search_term(opts.q.trim(), '\\');
        if !term.is_empty() {
            let pattern = format!("%{term}%");
            query = query.where_(Expr::or(vec![
                Expr::ilike("ug.Name", &pattern),
                Expr::ilike("ug.DisplayName", &pattern),
            ]));
        }

        if opts.since > 0 {
            query = query.where_(Expr::gte("ug.UpdateAt", opts.since));
        }
        if opts.filter_allow_reference {
            query = query.where_(Expr::eq("ug.AllowReference", true));
        }

        if opts.not_associated_to_team.len() == ID_LENGTH {
            let linked = qb
                .select(&["GroupId"])
                .from("GroupTeams")
                .where_(Expr::eq("TeamId", opts.not_associated_to_team.as_str()))
                .where_(Expr::eq("DeleteAt", 0_i64));
            query = query.where_(Expr::not_in_subquery("ug.Id", &linked));
        }

        if opts.not_associated_to_channel.len() == ID_LENGTH {
            let channel_id = opts.not_associated_to_channel.as_str();
            let linked = qb
                .select(&["GroupId"])
                .from("GroupChannels")
                .where_(Expr::eq("ChannelId", channel_id))
                .where_(Expr::eq("DeleteAt", 0_i64));
            query = query.where_(Expr::not_in_subquery("ug.Id", &linked));

            if opts.filter_parent_team_permitted {
                let constrained_parent = qb
                    .select(&["1"])
                    .from("Teams pt")
                    .join("Channels pc ON pc.TeamId = pt.Id")
                    .where_(Expr::eq("pc.Id", channel_id))
                    .where_(Expr::eq("pt.GroupConstrained", true));
                let linked_to_parent = qb
                    .select(&["1"])
                    .from("GroupTeams pgt")
                    .join("Channels pgc ON pgc.TeamId = pgt.TeamId")
                    .where_(Expr::eq("pgc.Id", channel_id))
                    .where_(Expr::raw("pgt.GroupId = ug.Id"))
                    .where_(Expr::eq("pgt.DeleteAt", 0_i64));
                query = query.where_(Expr::or(vec![
                    Expr::not_exists(&constrained_parent),
                    Expr::exists(&linked_to_parent),
                ]));
            }
        }

        let stmt = query
            .order_by("ug.DisplayName")
            .order_by("ug.Id")
            .limit(per_page)
            .offset(page.saturating_mul(per_page))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get groups"))?;

        rows.iter()
            .map(|row| {
                let mut group = Group::from_row(row)?;
                if opts.include_member_count {
                    group.member_count = Some(row.int("MemberCount")?);
                }
                Ok(group)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{Dialect, ErrorClass};

    fn store_qb() -> QueryBuilder {
        QueryBuilder::new(Dialect::Postgres)
    }

    #[test]
    fn test_unique_violation_on_remote_id() {
        let group = Group {
            id: "g1".into(),
            remote_id: "cn=eng".into(),
            ..Default::default()
        };
        let err = DbError::Sql {
            class: ErrorClass::UniqueConstraint,
            constraint: Some("usergroups_source_remoteid_key".into()),
            source: sqlx::Error::RowNotFound,
        };
        match group_write_error(&group, "create", err) {
            StoreError::InvalidInput { field, .. } => assert_eq!(field, "remote_id"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_subquery_placeholders_are_numbered_in_order() {
        let qb = store_qb();
        let linked = qb
            .select(&["GroupId"])
            .from("GroupTeams")
            .where_(Expr::eq("TeamId", "t1"));
        let stmt = qb
            .select(&["ug.Id"])
            .from("UserGroups ug")
            .where_(Expr::eq("ug.DeleteAt", 0_i64))
            .where_(Expr::not_in_subquery("ug.Id", &linked))
            .to_statement();
        assert!(stmt.sql.contains("ug.DeleteAt = $1"));
        assert!(stmt.sql.contains("TeamId = $2"));
    }
}
