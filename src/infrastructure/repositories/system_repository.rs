//! System key/value repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;

use crate::domain::entities::{System, SystemStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt};
use crate::shared::error::{StoreError, StoreResult};

impl FromAnyRow for System {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            name: row.text("Name")?,
            value: row.text("Value")?,
        })
    }
}

/// SQL system store.
#[derive(Clone)]
pub struct SqlSystemStore {
    router: Arc<PoolRouter>,
}

impl SqlSystemStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn get_from(&self, db: &DbHandle, name: &str) -> StoreResult<System> {
        let stmt = self
            .qb()
            .select(&["Name", "Value"])
            .from("Systems")
            .where_(Expr::eq("Name", name))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get system value"))?
            .ok_or_else(|| StoreError::not_found("System", name))?;
        Ok(System::from_row(&row)?)
    }
}

#[async_trait]
impl SystemStore for SqlSystemStore {
    async fn save(&self, system: &System) -> StoreResult<()> {
        let stmt = self
            .qb()
            .insert("Systems")
            .columns(&["Name", "Value"])
            .values(vec![system.name.as_str().into(), system.value.as_str().into()])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("System", "name", &system.name)
            } else {
                internal("failed to save system value")(e)
            }
        })?;
        Ok(())
    }

    async fn save_or_update(&self, system: &System) -> StoreResult<()> {
        let stmt = self
            .qb()
            .insert("Systems")
            .columns(&["Name", "Value"])
            .values(vec![system.name.as_str().into(), system.value.as_str().into()])
            .upsert(&["Name"], &["Value"])
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to save system value"))?;
        Ok(())
    }

    async fn get(&self) -> StoreResult<HashMap<String, String>> {
        let stmt = self.qb().select(&["Name", "Value"]).from("Systems").to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get system values"))?;
        let systems: Vec<System> = decode_all(&rows)?;
        Ok(systems.into_iter().map(|s| (s.name, s.value)).collect())
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<System> {
        self.get_from(&self.router.master(), name).await
    }

    async fn permanent_delete_by_name(&self, name: &str) -> StoreResult<System> {
        let master = self.router.master();
        let system = self.get_from(&master, name).await?;
        let stmt = self
            .qb()
            .delete("Systems")
            .where_(Expr::eq("Name", name))
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete system value"))?;
        Ok(system)
    }

    async fn insert_if_exists(&self, system: &System) -> StoreResult<System> {
        let master = self.router.master();
        let stmt = self
            .qb()
            .insert("Systems")
            .columns(&["Name", "Value"])
            .values(vec![system.name.as_str().into(), system.value.as_str().into()])
            .ignore_duplicates()
            .to_statement();
        let inserted = master
            .execute(&stmt)
            .await
            .map_err(internal("failed to insert system value"))?;
        if inserted > 0 {
            return Ok(system.clone());
        }
        tracing::debug!(name = %system.name, "System key already set, reading stored value");
        self.get_from(&master, &system.name).await
    }
}
