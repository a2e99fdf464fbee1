//! Group sync scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{
    Group, GroupSource, GroupStore, GroupSyncable, SyncableTarget, Team, TeamMember, TeamStore,
    UserTeamIdPair,
};
use chat_store::SqlStore;

use crate::common;

async fn constrained_team(store: &SqlStore) -> Team {
    let team = Team {
        name: common::unique("synced"),
        display_name: "Synced".into(),
        group_constrained: true,
        ..Default::default()
    };
    store.team().save(&team).await.unwrap()
}

async fn ldap_group(store: &SqlStore) -> Group {
    let group = Group {
        display_name: "Engineering".into(),
        source: GroupSource::Ldap,
        remote_id: common::unique("cn="),
        ..Default::default()
    };
    store.group().create(&group).await.unwrap()
}

fn pair(user_id: &str, team_id: &str) -> UserTeamIdPair {
    UserTeamIdPair {
        user_id: user_id.to_string(),
        team_id: team_id.to_string(),
    }
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_team_sync_adds_group_members() {
    let store = common::store().await;
    let team = constrained_team(&store).await;
    let group = ldap_group(&store).await;
    let member = common::saved_user(&store).await;
    store.group().upsert_member(&group.id, &member.id).await.unwrap();
    store
        .group()
        .create_group_syncable(&GroupSyncable::new(
            &group.id,
            SyncableTarget::Team {
                team_id: team.id.clone(),
            },
            true,
        ))
        .await
        .unwrap();

    let to_add = store
        .group()
        .team_members_to_add(0, Some(team.id.clone()), false)
        .await
        .unwrap();
    assert_eq!(to_add, vec![pair(&member.id, &team.id)]);

    store
        .team()
        .save_member(&TeamMember::new(&team.id, &member.id))
        .await
        .unwrap();
    let to_add = store
        .group()
        .team_members_to_add(0, Some(team.id.clone()), false)
        .await
        .unwrap();
    assert!(to_add.is_empty());
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_team_sync_removes_uncovered_members() {
    let store = common::store().await;
    let team = constrained_team(&store).await;
    let group = ldap_group(&store).await;
    let covered = common::saved_user(&store).await;
    let outsider = common::saved_user(&store).await;
    store.group().upsert_member(&group.id, &covered.id).await.unwrap();
    store
        .group()
        .create_group_syncable(&GroupSyncable::new(
            &group.id,
            SyncableTarget::Team {
                team_id: team.id.clone(),
            },
            false,
        ))
        .await
        .unwrap();
    common::join(&store, &team.id, &covered.id, &[]).await;
    common::join(&store, &team.id, &outsider.id, &[]).await;

    let to_remove = store
        .group()
        .team_members_to_remove(Some(team.id.clone()))
        .await
        .unwrap();
    assert_eq!(to_remove, vec![pair(&outsider.id, &team.id)]);

    store.group().delete_member(&group.id, &covered.id).await.unwrap();
    let mut to_remove = store
        .group()
        .team_members_to_remove(Some(team.id.clone()))
        .await
        .unwrap();
    to_remove.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    let mut expected = vec![pair(&covered.id, &team.id), pair(&outsider.id, &team.id)];
    expected.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    assert_eq!(to_remove, expected);
}
