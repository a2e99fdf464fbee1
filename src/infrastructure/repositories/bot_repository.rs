//! Bot Repository Implementation
//!
//! Only bot-specific columns live in `Bots`; reads always join the backing
//! user for the username and display name.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use crate::domain::entities::{Bot, BotGetOptions, BotStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::validation_error;

const BOT_COLUMNS: &[&str] = &[
    "b.UserId",
    "u.Username",
    "u.FirstName AS DisplayName",
    "b.Description",
    "b.OwnerId",
    "b.LastIconUpdate",
    "b.CreateAt",
    "b.UpdateAt",
    "b.DeleteAt",
];

impl FromAnyRow for Bot {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            user_id: row.text("UserId")?,
            username: row.text("Username")?,
            display_name: row.text("DisplayName")?,
            description: row.text("Description")?,
            owner_id: row.text("OwnerId")?,
            last_icon_update: row.int("LastIconUpdate")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
        })
    }
}

/// SQL bot store.
#[derive(Clone)]
pub struct SqlBotStore {
    router: Arc<PoolRouter>,
}

impl SqlBotStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    fn base_query(&self) -> SelectBuilder {
        self.qb()
            .select(BOT_COLUMNS)
            .from("Bots b")
            .join("Users u ON u.Id = b.UserId")
    }

    async fn get_from(&self, db: &DbHandle, user_id: &str, include_deleted: bool) -> StoreResult<Bot> {
        let stmt = self
            .base_query()
            .where_(Expr::eq("b.UserId", user_id))
            .where_if(!include_deleted, || Expr::eq("b.DeleteAt", 0_i64))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get bot user_id={user_id}")))?
            .ok_or_else(|| StoreError::not_found("Bot", user_id))?;
        Ok(Bot::from_row(&row)?)
    }
}

#[async_trait]
impl BotStore for SqlBotStore {
    async fn get(&self, user_id: &str, include_deleted: bool) -> StoreResult<Bot> {
        self.get_from(&self.router.replica(), user_id, include_deleted)
            .await
    }

    async fn get_all(&self, options: BotGetOptions) -> StoreResult<Vec<Bot>> {
        let mut query = self.base_query();
        if !options.include_deleted {
            query = query.where_(Expr::eq("b.DeleteAt", 0_i64));
        }
        if let Some(owner_id) = &options.owner_id {
            query = query.where_(Expr::eq("b.OwnerId", owner_id));
        }
        if options.only_orphaned {
            query = query
                .join("Users o ON o.Id = b.OwnerId")
                .where_(Expr::not_eq("o.DeleteAt", 0_i64));
        }
        let stmt = query
            .order_by("b.CreateAt")
            .order_by("u.Username")
            .limit(options.per_page)
            .offset(options.page.saturating_mul(options.per_page))
            .to_statement();

        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get bots"))?;
        Ok(decode_all(&rows)?)
    }

    async fn save(&self, bot: &Bot) -> StoreResult<Bot> {
        let mut bot = bot.clone();
        bot.pre_save();
        bot.validate().map_err(|e| validation_error("Bot", e))?;

        let stmt = self
            .qb()
            .insert("Bots")
            .columns(&[
                "UserId",
                "Description",
                "OwnerId",
                "LastIconUpdate",
                "CreateAt",
                "UpdateAt",
                "DeleteAt",
            ])
            .values(vec![
                bot.user_id.as_str().into(),
                bot.description.as_str().into(),
                bot.owner_id.as_str().into(),
                bot.last_icon_update.into(),
                bot.create_at.into(),
                bot.update_at.into(),
                bot.delete_at.into(),
            ])
            .to_statement();

        let master = self.router.master();
        master.execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("Bot", "user_id", &bot.user_id)
            } else if e.is_foreign_key_violation() {
                StoreError::not_found("User", &bot.user_id)
            } else {
                internal("failed to save bot")(e)
            }
        })?;

        self.get_from(&master, &bot.user_id, true).await
    }

    async fn update(&self, bot: &Bot) -> StoreResult<Bot> {
        let master = self.router.master();
        let mut stored = self.get_from(&master, &bot.user_id, true).await?;
        stored.patch_from(bot);
        stored.pre_update();
        stored.validate().map_err(|e| validation_error("Bot", e))?;

        let stmt = self
            .qb()
            .update("Bots")
            .set("Description", stored.description.as_str())
            .set("OwnerId", stored.owner_id.as_str())
            .set("LastIconUpdate", stored.last_icon_update)
            .set("UpdateAt", stored.update_at)
            .set("DeleteAt", stored.delete_at)
            .where_(Expr::eq("UserId", stored.user_id.as_str()))
            .to_statement();
        let count = master
            .execute(&stmt)
            .await
            .map_err(internal("failed to update bot"))?;
        if count != 1 {
            return Err(StoreError::internal(format!(
                "unexpected bot update count: user_id={}, count={count}",
                stored.user_id
            )));
        }
        Ok(stored)
    }

    async fn permanent_delete(&self, user_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("Bots")
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal(format!("failed to delete bot user_id={user_id}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Dialect;

    #[test]
    fn test_orphan_filter_joins_owner() {
        let query = QueryBuilder::new(Dialect::Postgres)
            .select(BOT_COLUMNS)
            .from("Bots b")
            .join("Users u ON u.Id = b.UserId")
            .join("Users o ON o.Id = b.OwnerId")
            .where_(Expr::not_eq("o.DeleteAt", 0_i64));
        let (sql, args) = query.to_parts();
        assert!(sql.contains("JOIN Users o ON o.Id = b.OwnerId"));
        assert!(sql.contains("u.FirstName AS DisplayName"));
        assert_eq!(args.len(), 1);
    }
}
