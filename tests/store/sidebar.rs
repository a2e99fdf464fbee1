//! Sidebar category scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{
    PreferenceStore, SidebarCategory, SidebarCategoryType, SidebarCategoryWithChannels, SidebarStore,
    PREFERENCE_CATEGORY_FAVORITE_CHANNEL, PREFERENCE_VALUE_TRUE,
};
use chat_store::SqlStore;

use crate::common;

struct Fixture {
    store: SqlStore,
    user_id: String,
    team_id: String,
    zebra: String,
    aardvark: String,
}

/// A user on a team with two joined channels named "zebra" and "aardvark".
async fn fixture() -> Fixture {
    let store = common::store().await;
    let user = common::saved_user(&store).await;
    let team = common::saved_team(&store).await;
    let zebra = common::saved_channel(&store, &team.id, "zebra").await.id;
    let aardvark = common::saved_channel(&store, &team.id, "aardvark").await.id;
    common::join(&store, &team.id, &user.id, &[&zebra, &aardvark]).await;
    Fixture {
        store,
        user_id: user.id,
        team_id: team.id,
        zebra,
        aardvark,
    }
}

fn built_in<'a>(
    categories: &'a [SidebarCategoryWithChannels],
    kind: SidebarCategoryType,
) -> &'a SidebarCategoryWithChannels {
    categories
        .iter()
        .find(|c| c.category_type() == kind)
        .expect("built-in category missing")
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_initial_categories_list_orphans_alphabetically() {
    let f = fixture().await;
    let created = f
        .store
        .sidebar()
        .create_initial_sidebar_categories(&f.user_id, &f.team_id)
        .await
        .unwrap();
    assert_eq!(created.categories.len(), 3);

    let channels_id = SidebarCategoryType::Channels.built_in_id(&f.user_id, &f.team_id);
    let channels = f.store.sidebar().get_sidebar_category(&channels_id).await.unwrap();
    assert_eq!(channels.channel_ids, vec![f.aardvark.clone(), f.zebra.clone()]);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_initial_categories_are_idempotent() {
    let f = fixture().await;
    let sidebar = f.store.sidebar();
    let (first, second) = tokio::join!(
        sidebar.create_initial_sidebar_categories(&f.user_id, &f.team_id),
        sidebar.create_initial_sidebar_categories(&f.user_id, &f.team_id),
    );
    let first = first.unwrap();
    assert_eq!(first.order, second.unwrap().order);
    assert_eq!(first.order.len(), 3);

    let again = sidebar
        .create_initial_sidebar_categories(&f.user_id, &f.team_id)
        .await
        .unwrap();
    assert_eq!(again.order, first.order);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_favorites_mirror_preference() {
    let f = fixture().await;
    let initial = f
        .store
        .sidebar()
        .create_initial_sidebar_categories(&f.user_id, &f.team_id)
        .await
        .unwrap();

    let mut favorites = built_in(&initial.categories, SidebarCategoryType::Favorites).clone();
    let mut channels = built_in(&initial.categories, SidebarCategoryType::Channels).clone();
    favorites.channel_ids = vec![f.zebra.clone()];
    channels.channel_ids.retain(|id| *id != f.zebra);
    f.store
        .sidebar()
        .update_sidebar_categories(&f.user_id, &f.team_id, &[favorites.clone(), channels.clone()])
        .await
        .unwrap();

    let pref = f
        .store
        .preference()
        .get(&f.user_id, PREFERENCE_CATEGORY_FAVORITE_CHANNEL, &f.zebra)
        .await
        .unwrap();
    assert_eq!(pref.value, PREFERENCE_VALUE_TRUE);

    favorites.channel_ids.clear();
    channels.channel_ids.push(f.zebra.clone());
    f.store
        .sidebar()
        .update_sidebar_categories(&f.user_id, &f.team_id, &[favorites, channels])
        .await
        .unwrap();

    let err = f
        .store
        .preference()
        .get(&f.user_id, PREFERENCE_CATEGORY_FAVORITE_CHANNEL, &f.zebra)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_custom_category_round_trip() {
    let f = fixture().await;
    let sidebar = f.store.sidebar();
    sidebar
        .create_initial_sidebar_categories(&f.user_id, &f.team_id)
        .await
        .unwrap();

    let custom = sidebar
        .create_sidebar_category(
            &f.user_id,
            &f.team_id,
            &SidebarCategoryWithChannels {
                category: SidebarCategory {
                    display_name: "Projects".into(),
                    ..Default::default()
                },
                channel_ids: vec![f.zebra.clone()],
            },
        )
        .await
        .unwrap();
    assert_eq!(custom.channel_ids, vec![f.zebra.clone()]);

    let order = sidebar
        .get_sidebar_category_order(&f.user_id, &f.team_id)
        .await
        .unwrap();
    assert_eq!(order.len(), 4);
    assert_eq!(order[1], custom.id().to_string());

    sidebar.delete_sidebar_category(custom.id()).await.unwrap();
    let channels_id = SidebarCategoryType::Channels.built_in_id(&f.user_id, &f.team_id);
    let channels = sidebar.get_sidebar_category(&channels_id).await.unwrap();
    assert_eq!(channels.channel_ids, vec![f.aardvark.clone(), f.zebra.clone()]);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_concurrent_move_and_delete_finish() {
    let f = fixture().await;
    let initial = f
        .store
        .sidebar()
        .create_initial_sidebar_categories(&f.user_id, &f.team_id)
        .await
        .unwrap();
    let mut custom = f
        .store
        .sidebar()
        .create_sidebar_category(
            &f.user_id,
            &f.team_id,
            &SidebarCategoryWithChannels {
                category: SidebarCategory {
                    display_name: "Later".into(),
                    ..Default::default()
                },
                channel_ids: Vec::new(),
            },
        )
        .await
        .unwrap();

    let mut channels = built_in(&initial.categories, SidebarCategoryType::Channels).clone();
    channels.channel_ids.retain(|id| *id != f.zebra);
    custom.channel_ids = vec![f.zebra.clone()];

    let mover = {
        let store = f.store.clone();
        let (user_id, team_id) = (f.user_id.clone(), f.team_id.clone());
        let update = vec![channels, custom.clone()];
        tokio::spawn(async move {
            store
                .sidebar()
                .update_sidebar_categories(&user_id, &team_id, &update)
                .await
                .map(|_| ())
        })
    };
    let deleter = {
        let store = f.store.clone();
        let id = custom.id().to_string();
        tokio::spawn(async move { store.sidebar().delete_sidebar_category(&id).await })
    };

    for result in [mover.await.unwrap(), deleter.await.unwrap()] {
        if let Err(e) = result {
            assert!(e.is_not_found(), "unexpected error: {e}");
        }
    }
}
