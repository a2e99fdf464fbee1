//! Installed license records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::StoreResult;

/// A signed license blob. Whether a license is installed gates replica
/// routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub create_at: i64,
    /// Signed license payload.
    pub bytes: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Insert unless a row with the same id exists; either way the stored
    /// row is returned.
    async fn save(&self, license: &License) -> StoreResult<License>;

    async fn get(&self, id: &str) -> StoreResult<License>;

    async fn get_all(&self) -> StoreResult<Vec<License>>;
}
