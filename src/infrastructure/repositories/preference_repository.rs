//! Preference repository.
//!
//! Favorite-channel preferences are mirrored into the favorites sidebar
//! categories in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::favorites::{
    add_to_favorite_categories, clear_favorite_categories, remove_channel_from_all_favorites,
    remove_from_favorite_categories,
};
use crate::domain::entities::{
    Preference, PreferenceStore, PREFERENCE_CATEGORY_FAVORITE_CHANNEL, PREFERENCE_CATEGORY_FLAGGED_POST,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    finish, DbError, Dialect, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, Statement, Tx,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::validation_error;

const PREFERENCE_COLUMNS: &[&str] = &["UserId", "Category", "Name", "Value"];

impl FromAnyRow for Preference {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            user_id: row.text("UserId")?,
            category: row.text("Category")?,
            name: row.text("Name")?,
            value: row.text("Value")?,
        })
    }
}

/// Flagged-post preferences whose post no longer exists, capped at `limit`.
///
/// MySQL refuses a subquery on the DELETE target unless it is wrapped in a
/// derived table.
fn orphaned_flags_delete(dialect: Dialect, limit: u64) -> Statement {
    let sql = match dialect {
        Dialect::Postgres => {
            "DELETE FROM Preferences WHERE ctid IN (\
             SELECT Preferences.ctid FROM Preferences \
             LEFT JOIN Posts ON Preferences.Name = Posts.Id \
             WHERE Preferences.Category = ? AND Posts.Id IS NULL LIMIT ?)"
        }
        Dialect::MySql => {
            "DELETE FROM Preferences WHERE Category = ? AND Name IN (\
             SELECT Name FROM (\
             SELECT Preferences.Name FROM Preferences \
             LEFT JOIN Posts ON Preferences.Name = Posts.Id \
             WHERE Preferences.Category = ? AND Posts.Id IS NULL LIMIT ?) AS orphans)"
        }
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let stmt = Statement::new(dialect, sql).bind(PREFERENCE_CATEGORY_FLAGGED_POST);
    match dialect {
        Dialect::Postgres => stmt.bind(limit),
        Dialect::MySql => stmt.bind(PREFERENCE_CATEGORY_FLAGGED_POST).bind(limit),
    }
}

/// SQL preference store.
#[derive(Clone)]
pub struct SqlPreferenceStore {
    router: Arc<PoolRouter>,
}

impl SqlPreferenceStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn save_tx(&self, tx: &mut Tx, preferences: &[Preference]) -> StoreResult<()> {
        let qb = self.qb();
        for preference in preferences {
            let stmt = qb
                .insert("Preferences")
                .columns(PREFERENCE_COLUMNS)
                .values(vec![
                    preference.user_id.as_str().into(),
                    preference.category.as_str().into(),
                    preference.name.as_str().into(),
                    preference.value.as_str().into(),
                ])
                .upsert(&["UserId", "Category", "Name"], &["Value"])
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to save preference"))?;

            if preference.category == PREFERENCE_CATEGORY_FAVORITE_CHANNEL {
                if preference.is_favorite() {
                    add_to_favorite_categories(&qb, tx, &preference.user_id, &preference.name).await?;
                } else {
                    remove_from_favorite_categories(&qb, tx, &preference.user_id, &preference.name)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn delete_tx(
        &self,
        tx: &mut Tx,
        user_id: Option<&str>,
        category: &str,
        name: Option<&str>,
    ) -> StoreResult<()> {
        let qb = self.qb();
        let mut delete = qb.delete("Preferences").where_(Expr::eq("Category", category));
        if let Some(user_id) = user_id {
            delete = delete.where_(Expr::eq("UserId", user_id));
        }
        if let Some(name) = name {
            delete = delete.where_(Expr::eq("Name", name));
        }
        tx.execute(&delete.to_statement())
            .await
            .map_err(internal("failed to delete preferences"))?;

        if category != PREFERENCE_CATEGORY_FAVORITE_CHANNEL {
            return Ok(());
        }
        match (user_id, name) {
            (Some(user_id), Some(name)) => remove_from_favorite_categories(&qb, tx, user_id, name).await,
            (Some(user_id), None) => clear_favorite_categories(&qb, tx, user_id).await,
            (None, Some(name)) => remove_channel_from_all_favorites(&qb, tx, name).await,
            (None, None) => Ok(()),
        }
    }

    async fn delete_in_tx(&self, user_id: Option<&str>, category: &str, name: Option<&str>) -> StoreResult<()> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.delete_tx(&mut tx, user_id, category, name).await;
        finish(tx, result).await
    }
}

#[async_trait]
impl PreferenceStore for SqlPreferenceStore {
    async fn save(&self, preferences: &[Preference]) -> StoreResult<()> {
        for preference in preferences {
            preference
                .validate()
                .map_err(|e| validation_error("Preference", e))?;
        }
        if preferences.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.save_tx(&mut tx, preferences).await;
        finish(tx, result).await
    }

    async fn get(&self, user_id: &str, category: &str, name: &str) -> StoreResult<Preference> {
        let stmt = self
            .qb()
            .select(PREFERENCE_COLUMNS)
            .from("Preferences")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("Category", category))
            .where_(Expr::eq("Name", name))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get preference"))?
            .ok_or_else(|| {
                StoreError::not_found("Preference", format!("user_id={user_id}, category={category}, name={name}"))
            })?;
        Ok(Preference::from_row(&row)?)
    }

    async fn get_category(&self, user_id: &str, category: &str) -> StoreResult<Vec<Preference>> {
        let stmt = self
            .qb()
            .select(PREFERENCE_COLUMNS)
            .from("Preferences")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("Category", category))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get preference category"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_all(&self, user_id: &str) -> StoreResult<Vec<Preference>> {
        let stmt = self
            .qb()
            .select(PREFERENCE_COLUMNS)
            .from("Preferences")
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get preferences"))?;
        Ok(decode_all(&rows)?)
    }

    async fn delete(&self, user_id: &str, category: &str, name: &str) -> StoreResult<()> {
        self.delete_in_tx(Some(user_id), category, Some(name)).await
    }

    async fn delete_category(&self, user_id: &str, category: &str) -> StoreResult<()> {
        self.delete_in_tx(Some(user_id), category, None).await
    }

    async fn delete_category_and_name(&self, category: &str, name: &str) -> StoreResult<()> {
        self.delete_in_tx(None, category, Some(name)).await
    }

    async fn permanent_delete_by_user(&self, user_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("Preferences")
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete preferences for user"))?;
        Ok(())
    }

    async fn delete_orphaned_rows(&self, limit: u64) -> StoreResult<u64> {
        let stmt = orphaned_flags_delete(self.router.dialect(), limit);
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete orphaned preferences"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Arg;

    #[test]
    fn test_orphan_delete_nests_for_mysql() {
        let stmt = orphaned_flags_delete(Dialect::MySql, 100);
        assert!(stmt.sql.contains("AS orphans"));
        assert_eq!(
            stmt.args,
            vec![
                Arg::Text("flagged_post".into()),
                Arg::Text("flagged_post".into()),
                Arg::Int(100)
            ]
        );
    }

    #[test]
    fn test_orphan_delete_uses_ctid_for_postgres() {
        let stmt = orphaned_flags_delete(Dialect::Postgres, 5);
        assert!(stmt.sql.starts_with("DELETE FROM Preferences WHERE ctid IN ("));
        assert!(stmt.sql.ends_with("LIMIT $2)"));
    }
}
