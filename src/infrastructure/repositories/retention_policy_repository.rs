//! Retention Policy Repository Implementation
//!
//! Policies and their team/channel links. Saving and patching run in one
//! transaction that checks the targets, writes the links and re-reads the
//! policy with its counts.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::helpers::limited_delete;
use crate::domain::entities::{
    RetentionPolicy, RetentionPolicyPatch, RetentionPolicyStore, RetentionPolicyWithTeamAndChannelCounts,
    RetentionPolicyWithTeamAndChannelIds,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::{decode_all, strings};
use crate::infrastructure::database::{
    finish, DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder, Tx,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::validation_error;

impl FromAnyRow for RetentionPolicyWithTeamAndChannelCounts {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            policy: RetentionPolicy {
                id: row.text("Id")?,
                display_name: row.text("DisplayName")?,
                post_duration: row.int("PostDuration")?,
            },
            channel_count: row.int("ChannelCount")?,
            team_count: row.int("TeamCount")?,
        })
    }
}

/// Which side of a policy a link table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Team,
    Channel,
}

impl LinkKind {
    fn table(self) -> &'static str {
        match self {
            Self::Team => "RetentionPoliciesTeams",
            Self::Channel => "RetentionPoliciesChannels",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Self::Team => "TeamId",
            Self::Channel => "ChannelId",
        }
    }

    /// Table the linked ids point into, and its entity name.
    fn target(self) -> (&'static str, &'static str) {
        match self {
            Self::Team => ("Teams", "Team"),
            Self::Channel => ("Channels", "Channel"),
        }
    }

    fn field(self) -> &'static str {
        match self {
            Self::Team => "team_ids",
            Self::Channel => "channel_ids",
        }
    }
}

fn link_write_error(kind: LinkKind, policy_id: &str, ids: &[String], err: DbError) -> StoreError {
    if err.is_foreign_key_violation() {
        StoreError::not_found("RetentionPolicy", policy_id)
    } else if err.is_unique_violation() {
        StoreError::invalid_input("RetentionPolicy", kind.field(), ids.join(","))
    } else {
        internal(format!("failed to insert {}", kind.table()))(err)
    }
}

/// Policies with their link counts.
fn policies_with_counts(qb: &QueryBuilder) -> SelectBuilder {
    let channels = qb
        .select(&["PolicyId", "COUNT(*) AS ChannelCount"])
        .from("RetentionPoliciesChannels")
        .group_by(&["PolicyId"]);
    let teams = qb
        .select(&["PolicyId", "COUNT(*) AS TeamCount"])
        .from("RetentionPoliciesTeams")
        .group_by(&["PolicyId"]);
    qb.select(&[
        "rp.Id",
        "rp.DisplayName",
        "rp.PostDuration",
        "COALESCE(cc.ChannelCount, 0) AS ChannelCount",
        "COALESCE(tc.TeamCount, 0) AS TeamCount",
    ])
    .from("RetentionPolicies rp")
    .left_join_subquery(&channels, "cc", "cc.PolicyId = rp.Id")
    .left_join_subquery(&teams, "tc", "tc.PolicyId = rp.Id")
}

/// SQL retention policy store.
#[derive(Clone)]
pub struct SqlRetentionPolicyStore {
    router: Arc<PoolRouter>,
}

impl SqlRetentionPolicyStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    /// Fails with `NotFound` naming the first id missing from the target table.
    async fn verify_targets_exist(&self, tx: &mut Tx, kind: LinkKind, ids: &[String]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let (table, entity) = kind.target();
        let stmt = self
            .qb()
            .select(&["Id"])
            .from(table)
            .where_(Expr::in_list("Id", ids))
            .to_statement();
        let rows = tx
            .fetch_all(&stmt)
            .await
            .map_err(internal(format!("failed to check {table}")))?;
        let found: HashSet<String> = strings(&rows, "Id")?.into_iter().collect();
        match ids.iter().find(|id| !found.contains(*id)) {
            Some(missing) => Err(StoreError::not_found(entity, missing)),
            None => Ok(()),
        }
    }

    async fn insert_links(&self, tx: &mut Tx, kind: LinkKind, policy_id: &str, ids: &[String]) -> StoreResult<()> {
        let mut insert = self.qb().insert(kind.table()).columns(&["PolicyId", kind.id_column()]);
        for id in ids {
            insert = insert.values(vec![policy_id.into(), id.into()]);
        }
        if insert.is_empty() {
            return Ok(());
        }
        tx.execute(&insert.to_statement())
            .await
            .map_err(|e| link_write_error(kind, policy_id, ids, e))?;
        Ok(())
    }

    async fn replace_links(&self, tx: &mut Tx, kind: LinkKind, policy_id: &str, ids: &[String]) -> StoreResult<()> {
        self.verify_targets_exist(tx, kind, ids).await?;
        let stmt = self
            .qb()
            .delete(kind.table())
            .where_(Expr::eq("PolicyId", policy_id))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal(format!("failed to clear {}", kind.table())))?;
        self.insert_links(tx, kind, policy_id, ids).await
    }

    async fn get_in_tx(&self, tx: &mut Tx, id: &str) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        let stmt = policies_with_counts(&self.qb())
            .where_(Expr::eq("rp.Id", id))
            .to_statement();
        let row = tx
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get retention policy"))?
            .ok_or_else(|| StoreError::not_found("RetentionPolicy", id))?;
        Ok(RetentionPolicyWithTeamAndChannelCounts::from_row(&row)?)
    }

    async fn save_tx(
        &self,
        tx: &mut Tx,
        policy: &RetentionPolicyWithTeamAndChannelIds,
    ) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        self.verify_targets_exist(tx, LinkKind::Team, &policy.team_ids).await?;
        self.verify_targets_exist(tx, LinkKind::Channel, &policy.channel_ids)
            .await?;

        let id = policy.policy.id.as_str();
        let stmt = self
            .qb()
            .insert("RetentionPolicies")
            .columns(&["Id", "DisplayName", "PostDuration"])
            .values(vec![
                id.into(),
                policy.policy.display_name.as_str().into(),
                policy.policy.post_duration.into(),
            ])
            .to_statement();
        tx.execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("RetentionPolicy", "id", id)
            } else {
                internal("failed to insert retention policy")(e)
            }
        })?;

        self.insert_links(tx, LinkKind::Channel, id, &policy.channel_ids)
            .await?;
        self.insert_links(tx, LinkKind::Team, id, &policy.team_ids).await?;
        self.get_in_tx(tx, id).await
    }

    async fn patch_tx(
        &self,
        tx: &mut Tx,
        patch: &RetentionPolicyPatch,
    ) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        let id = patch.id.as_str();
        let current = self.get_in_tx(tx, id).await?;

        if patch.touches_policy_row() {
            let updated = RetentionPolicy {
                id: id.to_string(),
                display_name: patch
                    .display_name
                    .clone()
                    .unwrap_or(current.policy.display_name),
                post_duration: patch.post_duration.unwrap_or(current.policy.post_duration),
            };
            updated
                .validate()
                .map_err(|e| validation_error("RetentionPolicy", e))?;
            let stmt = self
                .qb()
                .update("RetentionPolicies")
                .set("DisplayName", updated.display_name.as_str())
                .set("PostDuration", updated.post_duration)
                .where_(Expr::eq("Id", id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to update retention policy"))?;
        }

        if let Some(team_ids) = &patch.team_ids {
            self.replace_links(tx, LinkKind::Team, id, team_ids).await?;
        }
        if let Some(channel_ids) = &patch.channel_ids {
            self.replace_links(tx, LinkKind::Channel, id, channel_ids).await?;
        }
        self.get_in_tx(tx, id).await
    }

    async fn add_links(&self, kind: LinkKind, policy_id: &str, ids: &[String]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result: StoreResult<()> = async {
            self.verify_targets_exist(&mut tx, kind, ids).await?;
            self.insert_links(&mut tx, kind, policy_id, ids).await
        }
        .await;
        finish(tx, result).await
    }

    async fn remove_links(&self, kind: LinkKind, policy_id: &str, ids: &[String]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let stmt = self
            .qb()
            .delete(kind.table())
            .where_(Expr::eq("PolicyId", policy_id))
            .where_(Expr::in_list(kind.id_column(), ids))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal(format!("failed to remove {}", kind.table())))?;
        Ok(())
    }

    async fn linked_ids(&self, kind: LinkKind, policy_id: &str, offset: u64, limit: u64) -> StoreResult<Vec<String>> {
        let stmt = self
            .qb()
            .select(&[kind.id_column()])
            .from(kind.table())
            .where_(Expr::eq("PolicyId", policy_id))
            .order_by(kind.id_column())
            .limit(limit)
            .offset(offset)
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal(format!("failed to get {}", kind.table())))?;
        Ok(strings(&rows, kind.id_column())?)
    }
}

#[async_trait]
impl RetentionPolicyStore for SqlRetentionPolicyStore {
    async fn save(
        &self,
        policy: &RetentionPolicyWithTeamAndChannelIds,
    ) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        let mut policy = policy.clone();
        policy.pre_save();
        policy
            .policy
            .validate()
            .map_err(|e| validation_error("RetentionPolicy", e))?;

        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.save_tx(&mut tx, &policy).await;
        finish(tx, result).await
    }

    async fn patch(&self, patch: &RetentionPolicyPatch) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.patch_tx(&mut tx, patch).await;
        finish(tx, result).await
    }

    async fn get(&self, id: &str) -> StoreResult<RetentionPolicyWithTeamAndChannelCounts> {
        let stmt = policies_with_counts(&self.qb())
            .where_(Expr::eq("rp.Id", id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get retention policy"))?
            .ok_or_else(|| StoreError::not_found("RetentionPolicy", id))?;
        Ok(RetentionPolicyWithTeamAndChannelCounts::from_row(&row)?)
    }

    async fn get_all(&self, offset: u64, limit: u64) -> StoreResult<Vec<RetentionPolicyWithTeamAndChannelCounts>> {
        let stmt = policies_with_counts(&self.qb())
            .order_by("rp.DisplayName")
            .order_by("rp.Id")
            .limit(limit)
            .offset(offset)
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get retention policies"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_count(&self) -> StoreResult<i64> {
        let stmt = self
            .qb()
            .select(&["COUNT(*)"])
            .from("RetentionPolicies")
            .to_statement();
        self.router
            .replica()
            .fetch_count(&stmt)
            .await
            .map_err(internal("failed to count retention policies"))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("RetentionPolicies")
            .where_(Expr::eq("Id", id))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete retention policy"))?;
        if count == 0 {
            return Err(StoreError::not_found("RetentionPolicy", id));
        }
        Ok(())
    }

    async fn get_channels(&self, policy_id: &str, offset: u64, limit: u64) -> StoreResult<Vec<String>> {
        self.linked_ids(LinkKind::Channel, policy_id, offset, limit).await
    }

    async fn get_teams(&self, policy_id: &str, offset: u64, limit: u64) -> StoreResult<Vec<String>> {
        self.linked_ids(LinkKind::Team, policy_id, offset, limit).await
    }

    async fn add_channels(&self, policy_id: &str, channel_ids: &[String]) -> StoreResult<()> {
        self.add_links(LinkKind::Channel, policy_id, channel_ids).await
    }

    async fn remove_channels(&self, policy_id: &str, channel_ids: &[String]) -> StoreResult<()> {
        self.remove_links(LinkKind::Channel, policy_id, channel_ids).await
    }

    async fn add_teams(&self, policy_id: &str, team_ids: &[String]) -> StoreResult<()> {
        self.add_links(LinkKind::Team, policy_id, team_ids).await
    }

    async fn remove_teams(&self, policy_id: &str, team_ids: &[String]) -> StoreResult<()> {
        self.remove_links(LinkKind::Team, policy_id, team_ids).await
    }

    async fn delete_orphaned_rows(&self, limit: u64) -> StoreResult<u64> {
        let dialect = self.router.dialect();
        let master = self.router.master();
        let mut deleted = 0;
        for kind in [LinkKind::Channel, LinkKind::Team] {
            let remaining = limit.saturating_sub(deleted);
            if remaining == 0 {
                break;
            }
            let (table, _) = kind.target();
            let condition = format!("{} NOT IN (SELECT Id FROM {table})", kind.id_column());
            let stmt = limited_delete(dialect, kind.table(), &condition, Vec::new(), remaining);
            deleted += master
                .execute(&stmt)
                .await
                .map_err(internal(format!("failed to delete orphaned {}", kind.table())))?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{Dialect, ErrorClass};

    fn sql_error(class: ErrorClass) -> DbError {
        DbError::Sql {
            class,
            constraint: None,
            source: sqlx::Error::RowNotFound,
        }
    }

    #[test]
    fn test_missing_policy_on_link_insert() {
        let err = link_write_error(
            LinkKind::Channel,
            "p1",
            &["c1".to_string()],
            sql_error(ErrorClass::ForeignKeyViolation),
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("p1"));
    }

    #[test]
    fn test_already_linked_target_is_invalid_input() {
        let err = link_write_error(
            LinkKind::Team,
            "p1",
            &["t1".to_string(), "t2".to_string()],
            sql_error(ErrorClass::Duplicate),
        );
        match err {
            StoreError::InvalidInput { field, value, .. } => {
                assert_eq!(field, "team_ids");
                assert_eq!(value, "t1,t2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_counts_come_from_grouped_subqueries() {
        let (sql, args) = policies_with_counts(&QueryBuilder::new(Dialect::MySql)).to_parts();
        assert!(sql.contains("LEFT JOIN (SELECT PolicyId, COUNT(*) AS ChannelCount"));
        assert!(sql.contains("GROUP BY PolicyId) AS tc ON tc.PolicyId = rp.Id"));
        assert!(args.is_empty());
    }
}
