//! Sidebar Repository Implementation
//!
//! Categories and their channel assignments for each `(user, team)` pair.
//! Channels the user belongs to but that no category claims are resolved
//! into the built-in channels or direct messages category on every read.
//!
//! Writers lock the pair's category rows (`FOR UPDATE`, in id order) before
//! touching assignments, and whole updates are retried when the database
//! reports a deadlock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::favorites::{
    add_to_favorite_categories, delete_favorite_preference, favorite_channel_ids,
    remove_from_favorite_categories, set_favorite_preference,
};
use crate::domain::entities::{
    ChannelType, OrderedSidebarCategories, SidebarCategory, SidebarCategorySorting, SidebarCategoryType,
    SidebarCategoryWithChannels, SidebarStore,
};
use crate::domain::services::sidebar::{
    apply_update, favorites_diff, initial_categories, is_same_category_set, merge_orphans,
    new_category_position, renumber, retain_known_channels,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::strings;
use crate::infrastructure::database::{
    finish, retry_on_deadlock, DbError, Exec, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, Tx,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::validation_error;

const CATEGORY_COLUMNS: &[&str] = &[
    "Id",
    "UserId",
    "TeamId",
    "SortOrder",
    "Sorting",
    "Type",
    "DisplayName",
    "Muted",
    "Collapsed",
];

impl FromAnyRow for SidebarCategory {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        let sorting = row.text("Sorting")?;
        let kind = row.text("Type")?;
        Ok(Self {
            id: row.text("Id")?,
            user_id: row.text("UserId")?,
            team_id: row.text("TeamId")?,
            sort_order: row.int("SortOrder")?,
            sorting: SidebarCategorySorting::from_str(&sorting)
                .ok_or_else(|| DbError::decode("Sorting", format!("unknown sorting {sorting:?}")))?,
            category_type: SidebarCategoryType::from_str(&kind)
                .ok_or_else(|| DbError::decode("Type", format!("unknown category type {kind:?}")))?,
            display_name: row.text("DisplayName")?,
            muted: row.boolean("Muted")?,
            collapsed: row.boolean("Collapsed")?,
        })
    }
}

fn team_channel_types() -> [&'static str; 2] {
    [ChannelType::Open.as_str(), ChannelType::Private.as_str()]
}

fn direct_channel_types() -> [&'static str; 2] {
    [ChannelType::Direct.as_str(), ChannelType::Group.as_str()]
}

fn pair_key(user_id: &str, team_id: &str) -> String {
    format!("user_id={user_id}, team_id={team_id}")
}

/// Channels an update drops from a built-in that nothing else in the batch
/// claims. They go back to the end of the built-in.
fn omitted_channels(
    original: &SidebarCategoryWithChannels,
    next: &SidebarCategoryWithChannels,
    batch: &[SidebarCategoryWithChannels],
) -> Vec<String> {
    let kept: HashSet<&str> = next.channel_ids.iter().map(String::as_str).collect();
    original
        .channel_ids
        .iter()
        .filter(|id| !kept.contains(id.as_str()))
        .filter(|id| {
            !batch
                .iter()
                .any(|other| other.id() != original.id() && other.channel_ids.contains(id))
        })
        .cloned()
        .collect()
}

/// SQL sidebar store.
#[derive(Clone)]
pub struct SqlSidebarStore {
    router: Arc<PoolRouter>,
}

impl SqlSidebarStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    /// Categories of the pair in display order. `lock` takes row locks in
    /// id order so concurrent writers queue instead of deadlocking.
    async fn categories<E: Exec>(
        &self,
        db: &mut E,
        user_id: &str,
        team_id: &str,
        lock: bool,
    ) -> StoreResult<Vec<SidebarCategory>> {
        let mut query = self
            .qb()
            .select(CATEGORY_COLUMNS)
            .from("SidebarCategories")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("TeamId", team_id));
        query = if lock {
            query.order_by("Id").suffix("FOR UPDATE")
        } else {
            query.order_by("SortOrder").order_by("Id")
        };
        let rows = db
            .fetch_all(&query.to_statement())
            .await
            .map_err(internal("failed to get sidebar categories"))?;
        let mut categories = rows
            .iter()
            .map(SidebarCategory::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if lock {
            categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        }
        Ok(categories)
    }

    async fn category<E: Exec>(&self, db: &mut E, category_id: &str, lock: bool) -> StoreResult<SidebarCategory> {
        let mut query = self
            .qb()
            .select(CATEGORY_COLUMNS)
            .from("SidebarCategories")
            .where_(Expr::eq("Id", category_id));
        if lock {
            query = query.suffix("FOR UPDATE");
        }
        let row = db
            .fetch_optional(&query.to_statement())
            .await
            .map_err(internal("failed to get sidebar category"))?
            .ok_or_else(|| StoreError::not_found("SidebarCategory", category_id))?;
        Ok(SidebarCategory::from_row(&row)?)
    }

    /// Explicitly assigned channels per category, in stored order.
    async fn assigned_channels<E: Exec>(
        &self,
        db: &mut E,
        category_ids: &[String],
    ) -> StoreResult<HashMap<String, Vec<String>>> {
        let mut assigned: HashMap<String, Vec<String>> = HashMap::new();
        if category_ids.is_empty() {
            return Ok(assigned);
        }
        let stmt = self
            .qb()
            .select(&["CategoryId", "ChannelId"])
            .from("SidebarChannels")
            .where_(Expr::in_list("CategoryId", category_ids))
            .order_by("SortOrder")
            .order_by("ChannelId")
            .to_statement();
        let rows = db
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get sidebar channels"))?;
        for row in &rows {
            assigned
                .entry(row.text("CategoryId")?)
                .or_default()
                .push(row.text("ChannelId")?);
        }
        Ok(assigned)
    }

    /// Member channels of the kind a built-in collects that no category of
    /// the pair claims, alphabetically. Team channels are limited to the
    /// team; direct and group channels are not.
    async fn orphans<E: Exec>(
        &self,
        db: &mut E,
        user_id: &str,
        team_id: &str,
        kind: SidebarCategoryType,
    ) -> StoreResult<Vec<String>> {
        let qb = self.qb();
        let claimed = qb
            .select(&["sc.ChannelId"])
            .from("SidebarChannels sc")
            .join("SidebarCategories scat ON scat.Id = sc.CategoryId")
            .where_(Expr::eq("scat.UserId", user_id))
            .where_(Expr::eq("scat.TeamId", team_id));
        let query = qb
            .select(&["c.Id"])
            .from("Channels c")
            .join("ChannelMembers cm ON cm.ChannelId = c.Id")
            .where_(Expr::eq("cm.UserId", user_id))
            .where_(Expr::not_in_subquery("c.Id", &claimed));
        let query = match kind {
            SidebarCategoryType::Channels => query
                .where_(Expr::eq("c.TeamId", team_id))
                .where_(Expr::in_list("c.Type", team_channel_types())),
            SidebarCategoryType::DirectMessages => {
                query.where_(Expr::in_list("c.Type", direct_channel_types()))
            }
            _ => return Ok(Vec::new()),
        };
        let stmt = query.order_by("c.DisplayName").order_by("c.Id").to_statement();
        let rows = db
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to resolve orphaned channels"))?;
        Ok(strings(&rows, "Id")?)
    }

    async fn with_channels<E: Exec>(
        &self,
        db: &mut E,
        category: SidebarCategory,
        assigned: Vec<String>,
    ) -> StoreResult<SidebarCategoryWithChannels> {
        let channel_ids = match category.category_type {
            SidebarCategoryType::Channels | SidebarCategoryType::DirectMessages => {
                let orphans = self
                    .orphans(db, &category.user_id, &category.team_id, category.category_type)
                    .await?;
                merge_orphans(&assigned, &orphans)
            }
            _ => assigned,
        };
        Ok(SidebarCategoryWithChannels { category, channel_ids })
    }

    async fn ordered<E: Exec>(&self, db: &mut E, categories: Vec<SidebarCategory>) -> StoreResult<OrderedSidebarCategories> {
        let ids: Vec<String> = categories.iter().map(|c| c.id.clone()).collect();
        let mut assigned = self.assigned_channels(db, &ids).await?;
        let mut result = Vec::with_capacity(categories.len());
        for category in categories {
            let channels = assigned.remove(&category.id).unwrap_or_default();
            result.push(self.with_channels(db, category, channels).await?);
        }
        Ok(OrderedSidebarCategories {
            categories: result,
            order: ids,
        })
    }

    /// User's direct and group channel ids.
    async fn direct_channel_ids(&self, tx: &mut Tx, user_id: &str) -> StoreResult<HashSet<String>> {
        let stmt = self
            .qb()
            .select(&["c.Id"])
            .from("Channels c")
            .join("ChannelMembers cm ON cm.ChannelId = c.Id")
            .where_(Expr::eq("cm.UserId", user_id))
            .where_(Expr::in_list("c.Type", direct_channel_types()))
            .to_statement();
        let rows = tx
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get direct channels"))?;
        Ok(strings(&rows, "Id")?.into_iter().collect())
    }

    async fn insert_category(&self, tx: &mut Tx, category: &SidebarCategory) -> Result<u64, DbError> {
        let stmt = self
            .qb()
            .insert("SidebarCategories")
            .columns(CATEGORY_COLUMNS)
            .values(vec![
                category.id.as_str().into(),
                category.user_id.as_str().into(),
                category.team_id.as_str().into(),
                category.sort_order.into(),
                category.sorting.as_str().into(),
                category.category_type.as_str().into(),
                category.display_name.as_str().into(),
                category.muted.into(),
                category.collapsed.into(),
            ])
            .to_statement();
        tx.execute(&stmt).await
    }

    /// Replace the channel rows of `category_id` with `channel_ids`.
    async fn write_channels(
        &self,
        tx: &mut Tx,
        user_id: &str,
        category_id: &str,
        channel_ids: &[String],
    ) -> StoreResult<()> {
        let qb = self.qb();
        let stmt = qb
            .delete("SidebarChannels")
            .where_(Expr::eq("CategoryId", category_id))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to clear sidebar channels"))?;

        let mut insert = qb
            .insert("SidebarChannels")
            .columns(&["ChannelId", "UserId", "CategoryId", "SortOrder"]);
        for (channel_id, sort_order) in renumber(channel_ids) {
            insert = insert.values(vec![
                channel_id.into(),
                user_id.into(),
                category_id.into(),
                sort_order.into(),
            ]);
        }
        if insert.is_empty() {
            return Ok(());
        }
        tx.execute(&insert.to_statement())
            .await
            .map_err(internal("failed to save sidebar channels"))?;
        Ok(())
    }

    /// Remove `channel_ids` from every category of the pair except `keep`.
    async fn detach_channels(
        &self,
        tx: &mut Tx,
        user_id: &str,
        team_id: &str,
        channel_ids: &[String],
        keep: &str,
    ) -> StoreResult<()> {
        if channel_ids.is_empty() {
            return Ok(());
        }
        let qb = self.qb();
        let team_categories = qb
            .select(&["Id"])
            .from("SidebarCategories")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("TeamId", team_id))
            .where_(Expr::not_eq("Id", keep));
        let stmt = qb
            .delete("SidebarChannels")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::in_list("ChannelId", channel_ids))
            .where_(Expr::in_subquery("CategoryId", &team_categories))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to move sidebar channels"))?;
        Ok(())
    }

    async fn set_sort_orders(&self, tx: &mut Tx, user_id: &str, ids: &[String]) -> StoreResult<()> {
        let qb = self.qb();
        for (id, sort_order) in renumber(ids) {
            let stmt = qb
                .update("SidebarCategories")
                .set("SortOrder", sort_order)
                .where_(Expr::eq("Id", id.as_str()))
                .where_(Expr::eq("UserId", user_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to reorder sidebar categories"))?;
        }
        Ok(())
    }

    /// Mirror a change of the pair's favorites into preferences and the
    /// favorites categories of the user's other teams.
    async fn mirror_favorites(&self, tx: &mut Tx, user_id: &str, before: &[String], after: &[String]) -> StoreResult<()> {
        let qb = self.qb();
        let (added, removed) = favorites_diff(before, after);
        for channel_id in &added {
            set_favorite_preference(&qb, tx, user_id, channel_id).await?;
            add_to_favorite_categories(&qb, tx, user_id, channel_id).await?;
        }
        for channel_id in &removed {
            delete_favorite_preference(&qb, tx, user_id, channel_id).await?;
            remove_from_favorite_categories(&qb, tx, user_id, channel_id).await?;
        }
        Ok(())
    }

    /// Insert the missing built-ins. `Ok(false)` means another caller won
    /// the race and the transaction must be rolled back.
    async fn create_initial_tx(&self, tx: &mut Tx, user_id: &str, team_id: &str) -> StoreResult<bool> {
        let existing: HashSet<SidebarCategoryType> = self
            .categories(tx, user_id, team_id, false)
            .await?
            .iter()
            .map(|c| c.category_type)
            .collect();

        for category in initial_categories(user_id, team_id) {
            if existing.contains(&category.category_type) {
                continue;
            }
            match self.insert_category(tx, &category).await {
                Ok(_) => {}
                Err(e) if e.is_unique_violation() => return Ok(false),
                Err(e) => return Err(internal("failed to create sidebar category")(e)),
            }
            if category.category_type == SidebarCategoryType::Favorites {
                self.populate_favorites(tx, user_id, team_id, &category.id).await?;
            }
        }
        Ok(true)
    }

    /// Fill a new favorites category from the user's favorite preferences.
    async fn populate_favorites(&self, tx: &mut Tx, user_id: &str, team_id: &str, category_id: &str) -> StoreResult<()> {
        let qb = self.qb();
        let favorites = favorite_channel_ids(&qb, tx, user_id).await?;
        if favorites.is_empty() {
            return Ok(());
        }
        let stmt = qb
            .select(&["c.Id"])
            .from("Channels c")
            .join("ChannelMembers cm ON cm.ChannelId = c.Id")
            .where_(Expr::eq("cm.UserId", user_id))
            .where_(Expr::in_list("c.Id", &favorites))
            .where_(Expr::or(vec![
                Expr::eq("c.TeamId", team_id),
                Expr::in_list("c.Type", direct_channel_types()),
            ]))
            .order_by("c.DisplayName")
            .order_by("c.Id")
            .to_statement();
        let rows = tx
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to load favorite channels"))?;
        let channel_ids = strings(&rows, "Id")?;
        self.write_channels(tx, user_id, category_id, &channel_ids).await
    }

    async fn create_category_tx(
        &self,
        tx: &mut Tx,
        user_id: &str,
        team_id: &str,
        new_category: &SidebarCategoryWithChannels,
    ) -> StoreResult<SidebarCategoryWithChannels> {
        let existing = self.categories(tx, user_id, team_id, true).await?;
        let Some(favorites) = existing
            .iter()
            .find(|c| c.category_type == SidebarCategoryType::Favorites)
        else {
            return Err(StoreError::not_found("SidebarCategory", pair_key(user_id, team_id)));
        };

        let mut category = SidebarCategory {
            id: String::new(),
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
            sort_order: 0,
            sorting: new_category.category.sorting,
            category_type: SidebarCategoryType::Custom,
            display_name: new_category.category.display_name.clone(),
            muted: new_category.category.muted,
            collapsed: new_category.category.collapsed,
        };
        category.pre_save();
        category
            .validate()
            .map_err(|e| validation_error("SidebarCategory", e))?;

        let mut order: Vec<String> = existing.iter().map(|c| c.id.clone()).collect();
        order.insert(new_category_position(&existing), category.id.clone());
        if let Some((_, sort_order)) = renumber(&order).into_iter().find(|(id, _)| *id == category.id) {
            category.sort_order = sort_order;
        }
        self.insert_category(tx, &category)
            .await
            .map_err(internal("failed to create sidebar category"))?;
        self.set_sort_orders(tx, user_id, &order).await?;

        let mut seen = HashSet::new();
        let channel_ids: Vec<String> = new_category
            .channel_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let favorites_id = favorites.id.clone();
        let before = self
            .assigned_channels(tx, std::slice::from_ref(&favorites_id))
            .await?
            .remove(&favorites_id)
            .unwrap_or_default();
        self.detach_channels(tx, user_id, team_id, &channel_ids, &category.id)
            .await?;
        self.write_channels(tx, user_id, &category.id, &channel_ids).await?;
        let after = self
            .assigned_channels(tx, std::slice::from_ref(&favorites_id))
            .await?
            .remove(&favorites_id)
            .unwrap_or_default();
        self.mirror_favorites(tx, user_id, &before, &after).await?;

        Ok(SidebarCategoryWithChannels { category, channel_ids })
    }

    async fn update_categories_tx(
        &self,
        tx: &mut Tx,
        user_id: &str,
        team_id: &str,
        updates: &[SidebarCategoryWithChannels],
    ) -> StoreResult<(Vec<SidebarCategoryWithChannels>, Vec<SidebarCategoryWithChannels>)> {
        let locked = self.categories(tx, user_id, team_id, true).await?;
        let favorites_id = locked
            .iter()
            .find(|c| c.category_type == SidebarCategoryType::Favorites)
            .map(|c| c.id.clone());
        let by_id: HashMap<String, SidebarCategory> = locked.into_iter().map(|c| (c.id.clone(), c)).collect();

        let ids: Vec<String> = by_id.keys().cloned().collect();
        let mut assigned = self.assigned_channels(tx, &ids).await?;
        let favorites_before = favorites_id
            .as_ref()
            .and_then(|id| assigned.get(id).cloned())
            .unwrap_or_default();

        let known_direct = if updates
            .iter()
            .any(|u| by_id.get(u.id()).map(|c| c.category_type) == Some(SidebarCategoryType::DirectMessages))
        {
            self.direct_channel_ids(tx, user_id).await?
        } else {
            HashSet::new()
        };

        let qb = self.qb();
        let mut updated = Vec::with_capacity(updates.len());
        let mut originals = Vec::with_capacity(updates.len());
        for update in updates {
            let Some(stored) = by_id.get(update.id()) else {
                return Err(StoreError::not_found("SidebarCategory", update.id()));
            };
            let current = assigned.remove(update.id()).unwrap_or_default();
            let original = self.with_channels(tx, stored.clone(), current).await?;

            let mut next = apply_update(&original, update);
            match next.category_type() {
                SidebarCategoryType::DirectMessages => {
                    next.channel_ids = retain_known_channels(&next.channel_ids, &known_direct);
                    next.channel_ids = merge_orphans(&next.channel_ids, &omitted_channels(&original, &next, updates));
                }
                SidebarCategoryType::Channels => {
                    next.channel_ids = merge_orphans(&next.channel_ids, &omitted_channels(&original, &next, updates));
                }
                _ => {}
            }
            next.category
                .validate()
                .map_err(|e| validation_error("SidebarCategory", e))?;

            let stmt = qb
                .update("SidebarCategories")
                .set("Sorting", next.category.sorting.as_str())
                .set("Muted", next.category.muted)
                .set("Collapsed", next.category.collapsed)
                .set("DisplayName", next.category.display_name.as_str())
                .where_(Expr::eq("Id", next.id()))
                .where_(Expr::eq("UserId", user_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to update sidebar category"))?;

            self.detach_channels(tx, user_id, team_id, &next.channel_ids, next.id())
                .await?;
            self.write_channels(tx, user_id, next.id(), &next.channel_ids)
                .await?;

            originals.push(original);
            updated.push(next);
        }

        if let Some(favorites_id) = favorites_id {
            let favorites_after = self
                .assigned_channels(tx, std::slice::from_ref(&favorites_id))
                .await?
                .remove(&favorites_id)
                .unwrap_or_default();
            self.mirror_favorites(tx, user_id, &favorites_before, &favorites_after)
                .await?;
        }
        Ok((updated, originals))
    }

    async fn update_categories_once(
        &self,
        user_id: &str,
        team_id: &str,
        updates: &[SidebarCategoryWithChannels],
    ) -> StoreResult<(Vec<SidebarCategoryWithChannels>, Vec<SidebarCategoryWithChannels>)> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.update_categories_tx(&mut tx, user_id, team_id, updates).await;
        finish(tx, result).await
    }

    async fn delete_category_once(&self, category_id: &str) -> StoreResult<()> {
        let qb = self.qb();
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result: StoreResult<()> = async {
            let category = self.category(&mut tx, category_id, true).await?;
            if category.category_type.is_built_in() {
                return Err(StoreError::invalid_input(
                    "SidebarCategory",
                    "type",
                    category.category_type,
                ));
            }
            let stmt = qb
                .delete("SidebarChannels")
                .where_(Expr::eq("CategoryId", category_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to delete sidebar channels"))?;
            let stmt = qb
                .delete("SidebarCategories")
                .where_(Expr::eq("Id", category_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to delete sidebar category"))?;
            Ok(())
        }
        .await;
        finish(tx, result).await
    }
}

#[async_trait]
impl SidebarStore for SqlSidebarStore {
    async fn create_initial_sidebar_categories(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<OrderedSidebarCategories> {
        let mut master = self.router.master();
        let mut tx = master
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        match self.create_initial_tx(&mut tx, user_id, team_id).await {
            Ok(true) => finish(tx, Ok(())).await?,
            Ok(false) => {
                tracing::debug!(user_id, team_id, "Sidebar categories created concurrently, reading winner");
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(error = %e, "Failed to roll back transaction");
                }
            }
            Err(e) => return finish(tx, Err(e)).await,
        }

        let categories = self.categories(&mut master, user_id, team_id, false).await?;
        self.ordered(&mut master, categories).await
    }

    async fn create_sidebar_category(
        &self,
        user_id: &str,
        team_id: &str,
        new_category: &SidebarCategoryWithChannels,
    ) -> StoreResult<SidebarCategoryWithChannels> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.create_category_tx(&mut tx, user_id, team_id, new_category).await;
        finish(tx, result).await
    }

    async fn get_sidebar_category(&self, category_id: &str) -> StoreResult<SidebarCategoryWithChannels> {
        let mut db = self.router.replica();
        let category = self.category(&mut db, category_id, false).await?;
        let assigned = self
            .assigned_channels(&mut db, std::slice::from_ref(&category.id))
            .await?
            .remove(category_id)
            .unwrap_or_default();
        self.with_channels(&mut db, category, assigned).await
    }

    async fn get_sidebar_categories(&self, user_id: &str, team_id: &str) -> StoreResult<OrderedSidebarCategories> {
        let mut db = self.router.replica();
        let categories = self.categories(&mut db, user_id, team_id, false).await?;
        self.ordered(&mut db, categories).await
    }

    async fn get_sidebar_category_order(&self, user_id: &str, team_id: &str) -> StoreResult<Vec<String>> {
        let stmt = self
            .qb()
            .select(&["Id"])
            .from("SidebarCategories")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("TeamId", team_id))
            .order_by("SortOrder")
            .order_by("Id")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get sidebar category order"))?;
        Ok(strings(&rows, "Id")?)
    }

    async fn update_sidebar_categories(
        &self,
        user_id: &str,
        team_id: &str,
        categories: &[SidebarCategoryWithChannels],
    ) -> StoreResult<(Vec<SidebarCategoryWithChannels>, Vec<SidebarCategoryWithChannels>)> {
        if categories.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        retry_on_deadlock("SidebarCategory", move || {
            self.update_categories_once(user_id, team_id, categories)
        })
        .await
    }

    async fn update_sidebar_category_order(
        &self,
        user_id: &str,
        team_id: &str,
        category_order: &[String],
    ) -> StoreResult<()> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result: StoreResult<()> = async {
            let current: Vec<String> = self
                .categories(&mut tx, user_id, team_id, true)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            if !is_same_category_set(&current, category_order) {
                return Err(StoreError::invalid_input(
                    "SidebarCategory",
                    "category_order",
                    category_order.join(","),
                ));
            }
            self.set_sort_orders(&mut tx, user_id, category_order).await
        }
        .await;
        finish(tx, result).await
    }

    async fn delete_sidebar_category(&self, category_id: &str) -> StoreResult<()> {
        retry_on_deadlock("SidebarCategory", move || self.delete_category_once(category_id)).await
    }

    async fn clear_sidebar_on_team_leave(&self, user_id: &str, team_id: &str) -> StoreResult<()> {
        let qb = self.qb();
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result: StoreResult<()> = async {
            let team_categories = qb
                .select(&["Id"])
                .from("SidebarCategories")
                .where_(Expr::eq("UserId", user_id))
                .where_(Expr::eq("TeamId", team_id));
            let stmt = qb
                .delete("SidebarChannels")
                .where_(Expr::eq("UserId", user_id))
                .where_(Expr::in_subquery("CategoryId", &team_categories))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to clear sidebar channels"))?;
            let stmt = qb
                .delete("SidebarCategories")
                .where_(Expr::eq("UserId", user_id))
                .where_(Expr::eq("TeamId", team_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to clear sidebar categories"))?;
            Ok(())
        }
        .await;
        finish(tx, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn category(id: &str, kind: SidebarCategoryType, channels: &[&str]) -> SidebarCategoryWithChannels {
        SidebarCategoryWithChannels {
            category: SidebarCategory {
                id: id.into(),
                user_id: "u1".into(),
                team_id: "t1".into(),
                category_type: kind,
                display_name: "x".into(),
                ..Default::default()
            },
            channel_ids: ids(channels),
        }
    }

    #[test]
    fn test_omitted_channels_return_to_built_in() {
        let original = category("channels_u1_t1", SidebarCategoryType::Channels, &["a", "b", "c"]);
        let next = category("channels_u1_t1", SidebarCategoryType::Channels, &["a"]);
        let batch = vec![next.clone()];
        assert_eq!(omitted_channels(&original, &next, &batch), ids(&["b", "c"]));
    }

    #[test]
    fn test_channels_moved_in_same_batch_are_not_restored() {
        let original = category("channels_u1_t1", SidebarCategoryType::Channels, &["a", "b"]);
        let next = category("channels_u1_t1", SidebarCategoryType::Channels, &["a"]);
        let favorites = category("favorites_u1_t1", SidebarCategoryType::Favorites, &["b"]);
        let batch = vec![next.clone(), favorites];
        assert!(omitted_channels(&original, &next, &batch).is_empty());
    }

    #[test]
    fn test_pair_key() {
        assert_eq!(pair_key("u1", "t1"), "user_id=u1, team_id=t1");
    }
}
