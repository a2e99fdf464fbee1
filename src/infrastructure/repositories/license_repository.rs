//! License repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;

use crate::domain::entities::{License, LicenseStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;

const LICENSE_COLUMNS: &[&str] = &["Id", "CreateAt", "Bytes"];

impl FromAnyRow for License {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            bytes: row.text("Bytes")?,
        })
    }
}

/// SQL license store.
#[derive(Clone)]
pub struct SqlLicenseStore {
    router: Arc<PoolRouter>,
}

impl SqlLicenseStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn get_from(&self, db: &DbHandle, id: &str) -> StoreResult<License> {
        let stmt = self
            .qb()
            .select(LICENSE_COLUMNS)
            .from("Licenses")
            .where_(Expr::eq("Id", id))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get license"))?
            .ok_or_else(|| StoreError::not_found("License", id))?;
        Ok(License::from_row(&row)?)
    }
}

#[async_trait]
impl LicenseStore for SqlLicenseStore {
    async fn save(&self, license: &License) -> StoreResult<License> {
        if license.id.is_empty() {
            return Err(StoreError::invalid_input("License", "id", ""));
        }
        let create_at = if license.create_at == 0 {
            get_millis()
        } else {
            license.create_at
        };

        let master = self.router.master();
        let stmt = self
            .qb()
            .insert("Licenses")
            .columns(LICENSE_COLUMNS)
            .values(vec![
                license.id.as_str().into(),
                create_at.into(),
                license.bytes.as_str().into(),
            ])
            .ignore_duplicates()
            .to_statement();
        master
            .execute(&stmt)
            .await
            .map_err(internal("failed to save license"))?;
        self.get_from(&master, &license.id).await
    }

    async fn get(&self, id: &str) -> StoreResult<License> {
        self.get_from(&self.router.replica(), id).await
    }

    async fn get_all(&self) -> StoreResult<Vec<License>> {
        let stmt = self
            .qb()
            .select(LICENSE_COLUMNS)
            .from("Licenses")
            .order_by("CreateAt")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get licenses"))?;
        Ok(decode_all(&rows)?)
    }
}
