//! Channel member history scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{ChannelMember, ChannelMemberHistoryStore, ChannelStore};
use chat_store::SqlStore;

use crate::common;

/// A fresh channel in a fresh team, returned as `(team_id, channel_id)`.
async fn empty_channel(store: &SqlStore) -> (String, String) {
    let team = common::saved_team(store).await;
    let channel = common::saved_channel(store, &team.id, "History").await;
    (team.id, channel.id)
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_channel_without_history_reports_current_members() {
    let store = common::store().await;
    let (team_id, channel_id) = empty_channel(&store).await;
    let user = common::saved_user(&store).await;
    common::join(&store, &team_id, &user.id, &[channel_id.as_str()]).await;
    // Joining logs an interval; drop it so only the membership remains.
    store
        .channel_member_history()
        .delete_for_user(&user.id)
        .await
        .unwrap();

    let results = store
        .channel_member_history()
        .get_users_in_channel_during(1_000, 2_000, &channel_id)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].user_id, user.id);
    assert_eq!(results[0].username, user.username);
    assert_eq!(results[0].join_time, 1_000);
    assert_eq!(results[0].leave_time, Some(2_000));
    assert!(!results[0].is_bot);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_history_window_boundaries() {
    let store = common::store().await;
    let history = store.channel_member_history();
    let (_, channel_id) = empty_channel(&store).await;
    let left_at_start = common::saved_user(&store).await;
    let joined_at_end = common::saved_user(&store).await;
    let joined_after = common::saved_user(&store).await;
    let left_before = common::saved_user(&store).await;

    history.log_join_event(&left_at_start.id, &channel_id, 50).await.unwrap();
    history.log_leave_event(&left_at_start.id, &channel_id, 100).await.unwrap();
    history.log_join_event(&joined_at_end.id, &channel_id, 200).await.unwrap();
    history.log_join_event(&joined_after.id, &channel_id, 201).await.unwrap();
    history.log_join_event(&left_before.id, &channel_id, 10).await.unwrap();
    history.log_leave_event(&left_before.id, &channel_id, 99).await.unwrap();

    let results = history
        .get_users_in_channel_during(100, 200, &channel_id)
        .await
        .unwrap();
    let users: Vec<&str> = results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(users, vec![left_at_start.id.as_str(), joined_at_end.id.as_str()]);
    assert_eq!(results[0].leave_time, Some(100));
    assert_eq!(results[1].leave_time, None);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_purge_keeps_open_intervals() {
    let store = common::store().await;
    let history = store.channel_member_history();
    let (_, channel_id) = empty_channel(&store).await;
    let stayed = common::saved_user(&store).await;
    let left = common::saved_user(&store).await;
    store
        .channel()
        .save_member(&ChannelMember::new(&channel_id, &stayed.id))
        .await
        .unwrap();

    history.log_join_event(&left.id, &channel_id, 10).await.unwrap();
    history.log_leave_event(&left.id, &channel_id, 20).await.unwrap();

    let deleted = history.permanent_delete_batch(20, 1_000).await.unwrap();
    assert!(deleted >= 1);

    let results = history
        .get_users_in_channel_during(0, i64::MAX, &channel_id)
        .await
        .unwrap();
    let users: Vec<&str> = results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(users, vec![stayed.id.as_str()]);
    assert_eq!(results[0].leave_time, None);
}
