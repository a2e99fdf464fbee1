//! File attachment metadata.
//!
//! A file info is uploaded unattached (`post_id` empty) and attached to a
//! post at most once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Creator id used for files uploaded by the system itself.
pub const NO_USER_CREATOR_ID: &str = "nouser";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FileInfo {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    #[validate(length(min = 1, max = 26))]
    pub creator_id: String,
    /// Empty until attached.
    #[validate(length(max = 26))]
    pub post_id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    #[validate(length(min = 1, max = 512))]
    pub path: String,
    #[validate(length(max = 512))]
    pub thumbnail_path: String,
    #[validate(length(max = 512))]
    pub preview_path: String,
    #[validate(length(max = 256))]
    pub name: String,
    #[validate(length(max = 64))]
    pub extension: String,
    pub size: i64,
    #[validate(length(max = 256))]
    pub mime_type: String,
    pub width: i64,
    pub height: i64,
    pub has_preview_image: bool,
}

impl FileInfo {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        if self.update_at < self.create_at {
            self.update_at = self.create_at;
        }
    }

    pub fn is_attached(&self) -> bool {
        !self.post_id.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileInfoStore: Send + Sync {
    async fn save(&self, info: &FileInfo) -> StoreResult<FileInfo>;

    async fn get(&self, id: &str) -> StoreResult<FileInfo>;

    async fn get_by_path(&self, path: &str) -> StoreResult<FileInfo>;

    async fn get_for_post(&self, post_id: &str, include_deleted: bool) -> StoreResult<Vec<FileInfo>>;

    async fn get_for_user(&self, user_id: &str) -> StoreResult<Vec<FileInfo>>;

    /// Attach an unattached file to a post on behalf of `creator_id`.
    ///
    /// Fails with `NotFound` when the file does not exist, `Conflict` when
    /// it is already attached and `InvalidInput` when the creator differs.
    async fn attach_to_post(&self, file_id: &str, post_id: &str, creator_id: &str) -> StoreResult<()>;

    /// Soft-delete every file of the post; returns the post id.
    async fn delete_for_post(&self, post_id: &str) -> StoreResult<String>;

    async fn permanent_delete(&self, file_id: &str) -> StoreResult<()>;

    /// Hard-delete up to `limit` rows created before `end_time`.
    async fn permanent_delete_batch(&self, end_time: i64, limit: u64) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_save_sets_timestamps() {
        let mut info = FileInfo {
            creator_id: "u1".into(),
            path: "data/a.png".into(),
            ..Default::default()
        };
        info.pre_save();
        assert_eq!(info.id.len(), 26);
        assert_eq!(info.update_at, info.create_at);
        assert!(!info.is_attached());
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_path_is_required() {
        let info = FileInfo {
            id: "f1".into(),
            creator_id: "u1".into(),
            ..Default::default()
        };
        assert!(info.validate().is_err());
    }
}
