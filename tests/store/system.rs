//! System key scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{System, SystemStore};

use crate::common;

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_insert_if_exists_keeps_first_value() {
    let store = common::store().await;
    let name = common::unique("FirstServerRun");

    let first = store
        .system()
        .insert_if_exists(&System::new(&name, "first"))
        .await
        .unwrap();
    assert_eq!(first.value, "first");

    let second = store
        .system()
        .insert_if_exists(&System::new(&name, "second"))
        .await
        .unwrap();
    assert_eq!(second, System::new(&name, "first"));
    assert_eq!(store.system().get_by_name(&name).await.unwrap().value, "first");
}
