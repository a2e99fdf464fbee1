//! User and bot scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{Bot, BotStore, UserStore};
use chat_store::shared::error::StoreError;
use chat_store::shared::ids::new_id;

use crate::common;

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_bot_join_returns_user_fields() {
    let store = common::store().await;
    let id = new_id();
    let username = common::unique("bot_");
    let email = format!("{username}@x");

    store
        .user()
        .save(&common::user(&id, &username, &email))
        .await
        .unwrap();
    let bot = Bot {
        user_id: id.clone(),
        owner_id: "o1".into(),
        description: "d".into(),
        ..Default::default()
    };
    store.bot().save(&bot).await.unwrap();

    let fetched = store.bot().get(&id, false).await.unwrap();
    assert_eq!(fetched.username, username);
    assert_eq!(fetched.owner_id, "o1");
    assert_eq!(fetched.description, "d");
    assert_eq!(fetched.delete_at, 0);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_bot_without_user_is_rejected() {
    let store = common::store().await;
    let bot = Bot {
        user_id: new_id(),
        owner_id: "o1".into(),
        ..Default::default()
    };
    assert!(store.bot().save(&bot).await.is_err());
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_duplicate_email_is_invalid_input() {
    let store = common::store().await;
    let email = format!("{}@x", common::unique("same"));

    store
        .user()
        .save(&common::user(&new_id(), &common::unique("a"), &email))
        .await
        .unwrap();
    let err = store
        .user()
        .save(&common::user(&new_id(), &common::unique("b"), &email))
        .await
        .unwrap_err();

    match err {
        StoreError::InvalidInput { entity, field, value } => {
            assert_eq!(entity, "User");
            assert_eq!(field, "email");
            assert_eq!(value, email);
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}
