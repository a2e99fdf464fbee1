//! Post and thread scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{Post, PostStore, ThreadStore};
use chat_store::shared::error::StoreError;
use chat_store::SqlStore;

use crate::common;

fn post(user_id: &str, channel_id: &str, root_id: &str) -> Post {
    Post {
        user_id: user_id.to_string(),
        channel_id: channel_id.to_string(),
        root_id: root_id.to_string(),
        message: "hello".into(),
        ..Default::default()
    }
}

/// A channel with one member, returned as `(user_id, channel_id)`.
async fn posting_channel(store: &SqlStore) -> (String, String) {
    let user = common::saved_user(store).await;
    let team = common::saved_team(store).await;
    let channel = common::saved_channel(store, &team.id, "Town Square").await;
    common::join(store, &team.id, &user.id, &[channel.id.as_str()]).await;
    (user.id, channel.id)
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_thread_counts_follow_replies() {
    let store = common::store().await;
    let (user_id, channel_id) = posting_channel(&store).await;

    let root = store.post().save(&post(&user_id, &channel_id, "")).await.unwrap();
    let first = store
        .post()
        .save(&post(&user_id, &channel_id, &root.id))
        .await
        .unwrap();
    store
        .post()
        .save(&post(&user_id, &channel_id, &root.id))
        .await
        .unwrap();

    let thread = store.thread().get(&root.id).await.unwrap();
    assert_eq!(thread.reply_count, 2);
    assert_eq!(thread.participants, vec![user_id.clone()]);

    store.post().delete(&first.id, first.create_at + 1).await.unwrap();
    assert_eq!(store.thread().get(&root.id).await.unwrap().reply_count, 1);

    store.post().delete(&root.id, root.create_at + 2).await.unwrap();
    let err = store.thread().get(&root.id).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_reply_to_reply_is_rejected() {
    let store = common::store().await;
    let (user_id, channel_id) = posting_channel(&store).await;

    let root = store.post().save(&post(&user_id, &channel_id, "")).await.unwrap();
    let reply = store
        .post()
        .save(&post(&user_id, &channel_id, &root.id))
        .await
        .unwrap();

    let err = store
        .post()
        .save(&post(&user_id, &channel_id, &reply.id))
        .await
        .unwrap_err();
    match err {
        StoreError::InvalidInput { entity, field, value } => {
            assert_eq!(entity, "Post");
            assert_eq!(field, "root_id");
            assert_eq!(value, reply.id);
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
    assert_eq!(store.thread().get(&root.id).await.unwrap().reply_count, 1);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_reply_to_missing_root_is_rejected() {
    let store = common::store().await;
    let (user_id, channel_id) = posting_channel(&store).await;

    let orphan = post(&user_id, &channel_id, &chat_store::shared::ids::new_id());
    let err = store.post().save(&orphan).await.unwrap_err();
    assert!(err.is_invalid_input(), "unexpected error: {err:?}");
}
