//! File attachment scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{FileInfo, FileInfoStore, NO_USER_CREATOR_ID};
use chat_store::shared::error::StoreError;
use chat_store::shared::ids::new_id;
use chat_store::SqlStore;

use crate::common;

async fn uploaded(store: &SqlStore, creator_id: &str) -> FileInfo {
    let info = FileInfo {
        creator_id: creator_id.to_string(),
        path: format!("data/{}/file.png", new_id()),
        name: "file.png".into(),
        extension: "png".into(),
        mime_type: "image/png".into(),
        size: 42,
        ..Default::default()
    };
    store.file_info().save(&info).await.unwrap()
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_system_upload_attaches_for_any_user() {
    let store = common::store().await;
    let info = uploaded(&store, NO_USER_CREATOR_ID).await;
    let post_id = new_id();

    store
        .file_info()
        .attach_to_post(&info.id, &post_id, &new_id())
        .await
        .unwrap();

    let attached = store.file_info().get(&info.id).await.unwrap();
    assert_eq!(attached.post_id, post_id);
    assert_eq!(attached.creator_id, NO_USER_CREATOR_ID);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_attach_rejects_other_creator() {
    let store = common::store().await;
    let owner = new_id();
    let info = uploaded(&store, &owner).await;
    let intruder = new_id();

    let err = store
        .file_info()
        .attach_to_post(&info.id, &new_id(), &intruder)
        .await
        .unwrap_err();
    match err {
        StoreError::InvalidInput { entity, field, value } => {
            assert_eq!(entity, "FileInfo");
            assert_eq!(field, "creator_id");
            assert_eq!(value, intruder);
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
    assert_eq!(store.file_info().get(&info.id).await.unwrap().post_id, "");
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_attach_happens_once() {
    let store = common::store().await;
    let owner = new_id();
    let info = uploaded(&store, &owner).await;
    let first_post = new_id();

    store
        .file_info()
        .attach_to_post(&info.id, &first_post, &owner)
        .await
        .unwrap();
    let err = store
        .file_info()
        .attach_to_post(&info.id, &new_id(), &owner)
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "unexpected error: {err:?}");
    assert_eq!(store.file_info().get(&info.id).await.unwrap().post_id, first_post);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_attach_missing_file() {
    let store = common::store().await;
    let err = store
        .file_info()
        .attach_to_post(&new_id(), &new_id(), &new_id())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");
}
