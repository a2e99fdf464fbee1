//! Common Test Utilities
//!
//! Live database fixtures. Every scenario needs a reachable database named
//! by `CHAT_STORE_TEST_DATABASE_URL` (driver from `CHAT_STORE_TEST_DRIVER`,
//! default postgres) and is `#[ignore]`d otherwise.

use fake::faker::lorem::en::Word;
use fake::Fake;

use chat_store::config::{SqlSettings, DRIVER_POSTGRES};
use chat_store::domain::entities::{
    Channel, ChannelMember, ChannelStore, ChannelType, Team, TeamMember, TeamStore, User,
    UserStore,
};
use chat_store::shared::ids::new_id;
use chat_store::SqlStore;

/// Open a migrated store against the test database.
pub async fn store() -> SqlStore {
    let url = std::env::var("CHAT_STORE_TEST_DATABASE_URL")
        .expect("CHAT_STORE_TEST_DATABASE_URL must be set for live database tests");
    let driver = std::env::var("CHAT_STORE_TEST_DRIVER").unwrap_or_else(|_| DRIVER_POSTGRES.to_string());
    SqlStore::open(&SqlSettings::new(&driver, &url))
        .await
        .expect("failed to open test store")
}

/// Lower-case suffix keeping names unique across runs.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}{}", new_id()[..10].to_lowercase())
}

pub fn user(id: &str, username: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        nickname: Word().fake(),
        ..Default::default()
    }
}

pub async fn saved_user(store: &SqlStore) -> User {
    let username = unique("user");
    let email = format!("{username}@example.com");
    store
        .user()
        .save(&user(&new_id(), &username, &email))
        .await
        .expect("failed to save user")
}

pub async fn saved_team(store: &SqlStore) -> Team {
    let name = unique("team");
    let team = Team {
        display_name: Word().fake(),
        name,
        ..Default::default()
    };
    store.team().save(&team).await.expect("failed to save team")
}

pub async fn saved_channel(store: &SqlStore, team_id: &str, display_name: &str) -> Channel {
    let channel = Channel {
        team_id: team_id.to_string(),
        channel_type: ChannelType::Open,
        display_name: display_name.to_string(),
        name: unique("channel"),
        ..Default::default()
    };
    store
        .channel()
        .save(&channel)
        .await
        .expect("failed to save channel")
}

/// Add `user_id` to the team and to every listed channel.
pub async fn join(store: &SqlStore, team_id: &str, user_id: &str, channel_ids: &[&str]) {
    store
        .team()
        .save_member(&TeamMember::new(team_id, user_id))
        .await
        .expect("failed to join team");
    for channel_id in channel_ids {
        store
            .channel()
            .save_member(&ChannelMember::new(channel_id, user_id))
            .await
            .expect("failed to join channel");
    }
}
