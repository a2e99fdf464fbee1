//! Retention policy scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{
    RetentionPolicy, RetentionPolicyPatch, RetentionPolicyStore, RetentionPolicyWithTeamAndChannelIds,
};
use chat_store::shared::error::StoreError;
use chat_store::shared::ids::new_id;

use crate::common;

fn policy(channel_ids: Vec<String>, team_ids: Vec<String>) -> RetentionPolicyWithTeamAndChannelIds {
    RetentionPolicyWithTeamAndChannelIds {
        policy: RetentionPolicy {
            id: String::new(),
            display_name: common::unique("policy"),
            post_duration: 30,
        },
        team_ids,
        channel_ids,
    }
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_delete_cascades_to_channel_links() {
    let store = common::store().await;
    let team = common::saved_team(&store).await;
    let mut channel_ids = Vec::new();
    for name in ["one", "two", "three"] {
        channel_ids.push(common::saved_channel(&store, &team.id, name).await.id);
    }

    let saved = store
        .retention_policy()
        .save(&policy(channel_ids, Vec::new()))
        .await
        .unwrap();
    assert_eq!(saved.channel_count, 3);
    assert_eq!(saved.team_count, 0);

    store.retention_policy().delete(&saved.policy.id).await.unwrap();
    let remaining = store
        .retention_policy()
        .get_channels(&saved.policy.id, 0, 100)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_save_with_missing_channel_is_not_found() {
    let store = common::store().await;
    let err = store
        .retention_policy()
        .save(&policy(vec![new_id()], Vec::new()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_patch_replaces_team_links() {
    let store = common::store().await;
    let first = common::saved_team(&store).await;
    let second = common::saved_team(&store).await;

    let saved = store
        .retention_policy()
        .save(&policy(Vec::new(), vec![first.id.clone()]))
        .await
        .unwrap();
    let patched = store
        .retention_policy()
        .patch(&RetentionPolicyPatch {
            id: saved.policy.id.clone(),
            post_duration: Some(60),
            team_ids: Some(vec![second.id.clone()]),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(patched.policy.post_duration, 60);
    assert_eq!(patched.team_count, 1);
    let teams = store
        .retention_policy()
        .get_teams(&saved.policy.id, 0, 10)
        .await
        .unwrap();
    assert_eq!(teams, vec![second.id]);

    let err = store.retention_policy().delete(&new_id()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}
