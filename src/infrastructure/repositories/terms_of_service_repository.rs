//! Terms of service repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use crate::domain::entities::{TermsOfService, TermsOfServiceStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::{DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::validation_error;

const TERMS_COLUMNS: &[&str] = &["Id", "CreateAt", "UserId", "Text"];

impl FromAnyRow for TermsOfService {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            user_id: row.text("UserId")?,
            text: row.text("Text")?,
        })
    }
}

/// SQL terms of service store.
#[derive(Clone)]
pub struct SqlTermsOfServiceStore {
    router: Arc<PoolRouter>,
}

impl SqlTermsOfServiceStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn fetch_one(&self, query: SelectBuilder, key: &str) -> StoreResult<TermsOfService> {
        let row = self
            .router
            .replica()
            .fetch_optional(&query.to_statement())
            .await
            .map_err(internal("failed to get terms of service"))?
            .ok_or_else(|| StoreError::not_found("TermsOfService", key))?;
        Ok(TermsOfService::from_row(&row)?)
    }
}

#[async_trait]
impl TermsOfServiceStore for SqlTermsOfServiceStore {
    async fn save(&self, terms: &TermsOfService) -> StoreResult<TermsOfService> {
        let mut terms = terms.clone();
        terms.pre_save();
        terms
            .validate()
            .map_err(|e| validation_error("TermsOfService", e))?;

        let stmt = self
            .qb()
            .insert("TermsOfService")
            .columns(TERMS_COLUMNS)
            .values(vec![
                terms.id.as_str().into(),
                terms.create_at.into(),
                terms.user_id.as_str().into(),
                terms.text.as_str().into(),
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("TermsOfService", "id", &terms.id)
            } else {
                internal("failed to save terms of service")(e)
            }
        })?;
        Ok(terms)
    }

    async fn get(&self, id: &str) -> StoreResult<TermsOfService> {
        let query = self
            .qb()
            .select(TERMS_COLUMNS)
            .from("TermsOfService")
            .where_(Expr::eq("Id", id));
        self.fetch_one(query, id).await
    }

    async fn get_latest(&self) -> StoreResult<TermsOfService> {
        let query = self
            .qb()
            .select(TERMS_COLUMNS)
            .from("TermsOfService")
            .order_by("CreateAt DESC")
            .limit(1);
        self.fetch_one(query, "latest").await
    }
}
