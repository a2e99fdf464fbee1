//! Relational integrity checker.
//!
//! Scans parent/child table pairs for child rows whose reference no longer
//! resolves and streams one result per pair over a channel. Every query runs
//! against a read replica; nothing is modified.

use std::sync::Arc;

use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::{DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder};
use crate::shared::error::StoreError;

/// A child row whose parent reference is dangling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedRecord {
    pub parent_id: Option<String>,
    pub child_id: String,
}

impl FromAnyRow for OrphanedRecord {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            parent_id: row.opt_text("ParentId")?,
            child_id: row.text("ChildId")?,
        })
    }
}

/// Orphans found for one parent/child pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalIntegrityCheckData {
    pub parent_name: &'static str,
    pub child_name: &'static str,
    pub parent_id_attr: &'static str,
    pub child_id_attr: &'static str,
    pub records: Vec<OrphanedRecord>,
}

/// Outcome of one check. `err` is set when the scan itself failed, in which
/// case `data.records` is empty.
#[derive(Debug)]
pub struct IntegrityCheckResult {
    pub data: RelationalIntegrityCheckData,
    pub err: Option<StoreError>,
}

/// One parent/child relation to verify.
#[derive(Debug, Clone, Copy)]
struct Relation {
    parent_table: &'static str,
    parent_name: &'static str,
    child_table: &'static str,
    child_name: &'static str,
    /// Child column referencing `parent_table.Id`.
    parent_id_attr: &'static str,
    /// Child column reported as the orphan's identity.
    child_id_attr: &'static str,
}

const fn relation(
    parent_table: &'static str,
    parent_name: &'static str,
    child_table: &'static str,
    child_name: &'static str,
    parent_id_attr: &'static str,
    child_id_attr: &'static str,
) -> Relation {
    Relation {
        parent_table,
        parent_name,
        child_table,
        child_name,
        parent_id_attr,
        child_id_attr,
    }
}

const RELATIONS: &[Relation] = &[
    relation("Channels", "channels", "Posts", "posts", "ChannelId", "Id"),
    relation("Channels", "channels", "ChannelMembers", "channel_members", "ChannelId", "UserId"),
    relation("Channels", "channels", "SidebarChannels", "sidebar_channels", "ChannelId", "CategoryId"),
    relation("Channels", "channels", "ChannelMemberHistory", "channel_member_history", "ChannelId", "UserId"),
    relation("Posts", "posts", "Threads", "threads", "PostId", "PostId"),
    relation("Posts", "posts", "FileInfo", "file_infos", "PostId", "Id"),
    relation("Teams", "teams", "Channels", "channels", "TeamId", "Id"),
    relation("Teams", "teams", "TeamMembers", "team_members", "TeamId", "UserId"),
    relation("Teams", "teams", "SidebarCategories", "sidebar_categories", "TeamId", "Id"),
    relation("Users", "users", "Posts", "posts", "UserId", "Id"),
    relation("Users", "users", "ChannelMembers", "channel_members", "UserId", "ChannelId"),
    relation("Users", "users", "TeamMembers", "team_members", "UserId", "TeamId"),
    relation("Users", "users", "Bots", "bots", "UserId", "UserId"),
    relation("Users", "users", "Preferences", "preferences", "UserId", "Name"),
    relation("Users", "users", "SidebarCategories", "sidebar_categories", "UserId", "Id"),
    relation("UserGroups", "groups", "GroupMembers", "group_members", "GroupId", "UserId"),
    relation("RetentionPolicies", "retention_policies", "RetentionPoliciesChannels", "retention_policies_channels", "PolicyId", "ChannelId"),
    relation("RetentionPolicies", "retention_policies", "RetentionPoliciesTeams", "retention_policies_teams", "PolicyId", "TeamId"),
];

impl Relation {
    /// Child rows whose non-empty reference has no parent row.
    fn orphan_query(&self, qb: &QueryBuilder) -> SelectBuilder {
        let parent_ref = format!("c.{} AS ParentId", self.parent_id_attr);
        let child_ref = format!("c.{} AS ChildId", self.child_id_attr);
        qb.select(&[parent_ref.as_str(), child_ref.as_str()])
            .from(&format!("{} c", self.child_table))
            .left_join(&format!("{} p ON c.{} = p.Id", self.parent_table, self.parent_id_attr))
            .where_(Expr::is_null("p.Id"))
            .where_(Expr::not_eq(&format!("c.{}", self.parent_id_attr), ""))
            .order_by(&format!("c.{}", self.child_id_attr))
    }

    fn data(&self, records: Vec<OrphanedRecord>) -> RelationalIntegrityCheckData {
        RelationalIntegrityCheckData {
            parent_name: self.parent_name,
            child_name: self.child_name,
            parent_id_attr: self.parent_id_attr,
            child_id_attr: self.child_id_attr,
            records,
        }
    }
}

/// Number of relations the checker walks.
pub fn check_count() -> usize {
    RELATIONS.len()
}

async fn run_check(router: &PoolRouter, relation: &Relation) -> IntegrityCheckResult {
    let stmt = relation
        .orphan_query(&QueryBuilder::new(router.dialect()))
        .to_statement();
    let outcome = match router.replica().fetch_all(&stmt).await {
        Ok(rows) => rows
            .iter()
            .map(OrphanedRecord::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from),
        Err(e) => Err(internal(format!(
            "failed to check {} -> {} integrity",
            relation.parent_name, relation.child_name
        ))(e)),
    };
    match outcome {
        Ok(records) => IntegrityCheckResult {
            data: relation.data(records),
            err: None,
        },
        Err(err) => IntegrityCheckResult {
            data: relation.data(Vec::new()),
            err: Some(err),
        },
    }
}

/// Walk every relation, sending one result per check.
///
/// Returns early once the receiver is gone.
pub async fn check_relational_integrity(router: Arc<PoolRouter>, results: mpsc::Sender<IntegrityCheckResult>) {
    tracing::info!(checks = RELATIONS.len(), "Starting relational integrity checks");
    for relation in RELATIONS {
        if results.is_closed() {
            tracing::info!("Integrity check stopped by consumer");
            return;
        }
        let result = run_check(&router, relation).await;
        match &result.err {
            Some(err) => tracing::warn!(
                parent = relation.parent_name,
                child = relation.child_name,
                error = %err,
                "Integrity check failed"
            ),
            None if !result.data.records.is_empty() => tracing::warn!(
                parent = relation.parent_name,
                child = relation.child_name,
                orphans = result.data.records.len(),
                "Found orphaned records"
            ),
            None => tracing::debug!(
                parent = relation.parent_name,
                child = relation.child_name,
                "Integrity check passed"
            ),
        }
        if results.send(result).await.is_err() {
            tracing::info!("Integrity check stopped by consumer");
            return;
        }
    }
    tracing::info!("Relational integrity checks finished");
}

/// Start the checker on its own task. The receiver yields one result per
/// relation and ends when the scan is over; dropping it cancels the scan.
pub fn spawn_integrity_check(router: Arc<PoolRouter>) -> (mpsc::Receiver<IntegrityCheckResult>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = tokio::spawn(check_relational_integrity(router, tx));
    (rx, handle)
}
