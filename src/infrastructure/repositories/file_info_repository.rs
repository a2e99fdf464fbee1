//! File info repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::helpers::limited_delete;
use crate::domain::entities::{FileInfo, FileInfoStore, NO_USER_CREATOR_ID};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    Arg, DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const FILE_INFO_COLUMNS: &[&str] = &[
    "Id",
    "CreatorId",
    "PostId",
    "CreateAt",
    "UpdateAt",
    "DeleteAt",
    "Path",
    "ThumbnailPath",
    "PreviewPath",
    "Name",
    "Extension",
    "Size",
    "MimeType",
    "Width",
    "Height",
    "HasPreviewImage",
];

impl FromAnyRow for FileInfo {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text("Id")?,
            creator_id: row.text("CreatorId")?,
            post_id: row.text("PostId")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
            path: row.text("Path")?,
            thumbnail_path: row.text("ThumbnailPath")?,
            preview_path: row.text("PreviewPath")?,
            name: row.text("Name")?,
            extension: row.text("Extension")?,
            size: row.int("Size")?,
            mime_type: row.text("MimeType")?,
            width: row.int("Width")?,
            height: row.int("Height")?,
            has_preview_image: row.boolean("HasPreviewImage")?,
        })
    }
}

/// Why an attach changed no row, given the file as it is now.
fn attach_failure(current: Option<&FileInfo>, file_id: &str, creator_id: &str) -> StoreError {
    match current {
        None => StoreError::not_found("FileInfo", file_id),
        Some(info) if info.is_attached() => StoreError::conflict(
            "FileInfo",
            format!("file {file_id} is already attached to post {}", info.post_id),
        ),
        Some(_) => StoreError::invalid_input("FileInfo", "creator_id", creator_id),
    }
}

/// SQL file info store.
#[derive(Clone)]
pub struct SqlFileInfoStore {
    router: Arc<PoolRouter>,
}

impl SqlFileInfoStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn find(&self, db: &DbHandle, column: &str, value: &str) -> StoreResult<Option<FileInfo>> {
        let stmt = self
            .qb()
            .select(FILE_INFO_COLUMNS)
            .from("FileInfo")
            .where_(Expr::eq(column, value))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get file info by {column}")))?;
        Ok(row.as_ref().map(FileInfo::from_row).transpose()?)
    }
}

#[async_trait]
impl FileInfoStore for SqlFileInfoStore {
    async fn save(&self, info: &FileInfo) -> StoreResult<FileInfo> {
        let mut info = info.clone();
        info.pre_save();
        info.validate().map_err(|e| validation_error("FileInfo", e))?;

        let stmt = self
            .qb()
            .insert("FileInfo")
            .columns(FILE_INFO_COLUMNS)
            .values(vec![
                info.id.as_str().into(),
                info.creator_id.as_str().into(),
                info.post_id.as_str().into(),
                info.create_at.into(),
                info.update_at.into(),
                info.delete_at.into(),
                info.path.as_str().into(),
                info.thumbnail_path.as_str().into(),
                info.preview_path.as_str().into(),
                info.name.as_str().into(),
                info.extension.as_str().into(),
                info.size.into(),
                info.mime_type.as_str().into(),
                info.width.into(),
                info.height.into(),
                info.has_preview_image.into(),
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("FileInfo", "id", &info.id)
            } else {
                internal("failed to save file info")(e)
            }
        })?;
        Ok(info)
    }

    async fn get(&self, id: &str) -> StoreResult<FileInfo> {
        self.find(&self.router.replica(), "Id", id)
            .await?
            .ok_or_else(|| StoreError::not_found("FileInfo", id))
    }

    async fn get_by_path(&self, path: &str) -> StoreResult<FileInfo> {
        self.find(&self.router.replica(), "Path", path)
            .await?
            .ok_or_else(|| StoreError::not_found("FileInfo", format!("path={path}")))
    }

    async fn get_for_post(&self, post_id: &str, include_deleted: bool) -> StoreResult<Vec<FileInfo>> {
        let stmt = self
            .qb()
            .select(FILE_INFO_COLUMNS)
            .from("FileInfo")
            .where_(Expr::eq("PostId", post_id))
            .where_if(!include_deleted, || Expr::eq("DeleteAt", 0_i64))
            .order_by("CreateAt")
            .to_statement();
        let rows = self
            .router
            .master()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get file infos for post"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_for_user(&self, user_id: &str) -> StoreResult<Vec<FileInfo>> {
        let stmt = self
            .qb()
            .select(FILE_INFO_COLUMNS)
            .from("FileInfo")
            .where_(Expr::eq("CreatorId", user_id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .order_by("CreateAt")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get file infos for user"))?;
        Ok(decode_all(&rows)?)
    }

    async fn attach_to_post(&self, file_id: &str, post_id: &str, creator_id: &str) -> StoreResult<()> {
        let master = self.router.master();
        let stmt = self
            .qb()
            .update("FileInfo")
            .set("PostId", post_id)
            .set("UpdateAt", get_millis())
            .where_(Expr::eq("Id", file_id))
            .where_(Expr::eq("PostId", ""))
            .where_(Expr::or(vec![
                Expr::eq("CreatorId", creator_id),
                Expr::eq("CreatorId", NO_USER_CREATOR_ID),
            ]))
            .to_statement();
        let count = master
            .execute(&stmt)
            .await
            .map_err(internal("failed to attach file to post"))?;
        if count > 0 {
            return Ok(());
        }

        let current = self.find(&master, "Id", file_id).await?;
        Err(attach_failure(current.as_ref(), file_id, creator_id))
    }

    async fn delete_for_post(&self, post_id: &str) -> StoreResult<String> {
        let now = get_millis();
        let stmt = self
            .qb()
            .update("FileInfo")
            .set("DeleteAt", now)
            .set("UpdateAt", now)
            .where_(Expr::eq("PostId", post_id))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete file infos for post"))?;
        Ok(post_id.to_string())
    }

    async fn permanent_delete(&self, file_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("FileInfo")
            .where_(Expr::eq("Id", file_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete file info"))?;
        Ok(())
    }

    async fn permanent_delete_batch(&self, end_time: i64, limit: u64) -> StoreResult<u64> {
        let stmt = limited_delete(
            self.router.dialect(),
            "FileInfo",
            "CreateAt < ?",
            vec![Arg::Int(end_time)],
            limit,
        );
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete file info batch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_failure_kinds() {
        assert!(attach_failure(None, "f1", "u1").is_not_found());

        let attached = FileInfo {
            id: "f1".into(),
            post_id: "p1".into(),
            ..Default::default()
        };
        assert!(attach_failure(Some(&attached), "f1", "u1").is_conflict());

        let foreign = FileInfo {
            id: "f1".into(),
            creator_id: "u2".into(),
            ..Default::default()
        };
        assert!(attach_failure(Some(&foreign), "f1", "u1").is_invalid_input());
    }
}
