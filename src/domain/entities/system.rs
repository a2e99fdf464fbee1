//! Process-wide key/value settings stored in `Systems`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::StoreResult;

/// Key naming the active license id.
pub const SYSTEM_ACTIVE_LICENSE_ID: &str = "ActiveLicenseId";

/// Key holding the elected at-rest encryption key.
pub const SYSTEM_AT_REST_ENCRYPT_KEY: &str = "AtRestEncryptKey";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub name: String,
    pub value: String,
}

impl System {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SystemStore: Send + Sync {
    async fn save(&self, system: &System) -> StoreResult<()>;

    async fn save_or_update(&self, system: &System) -> StoreResult<()>;

    /// Every stored key.
    async fn get(&self) -> StoreResult<HashMap<String, String>>;

    async fn get_by_name(&self, name: &str) -> StoreResult<System>;

    async fn permanent_delete_by_name(&self, name: &str) -> StoreResult<System>;

    /// Insert `system` unless the key exists; returns whichever value is
    /// stored afterwards. Concurrent callers all observe the winner.
    async fn insert_if_exists(&self, system: &System) -> StoreResult<System>;
}
