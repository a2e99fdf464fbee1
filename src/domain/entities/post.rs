//! Post and thread entities with their store traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::infrastructure::database::codec::{StringArray, StringInterface};
use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Maximum stored message length.
pub const POST_MESSAGE_MAX_RUNES: u64 = 16383;

/// A message in a channel.
///
/// Top-level posts carry their own id as `root_id`; replies carry the id of
/// the thread's root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Post {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub edit_at: i64,
    pub delete_at: i64,
    pub is_pinned: bool,
    #[validate(length(min = 1, max = 26))]
    pub user_id: String,
    #[validate(length(min = 1, max = 26))]
    pub channel_id: String,
    #[validate(length(max = 26))]
    pub root_id: String,
    #[validate(length(max = 16383))]
    pub message: String,
    #[validate(length(max = 26))]
    pub post_type: String,
    pub props: StringInterface,
    #[validate(length(max = 1000))]
    pub hashtags: String,
    #[validate(length(max = 10))]
    pub file_ids: StringArray,
}

impl Post {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
        if self.root_id.is_empty() {
            self.root_id = self.id.clone();
        }
    }

    pub fn is_reply(&self) -> bool {
        !self.root_id.is_empty() && self.root_id != self.id
    }
}

/// Aggregate reply data for a root post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub post_id: String,
    pub channel_id: String,
    pub reply_count: i64,
    pub last_reply_at: i64,
    /// Distinct repliers in first-reply order.
    pub participants: StringArray,
}

impl Thread {
    /// A thread for `root` with its first reply.
    pub fn for_reply(root_id: &str, channel_id: &str, reply: &Post) -> Self {
        Self {
            post_id: root_id.to_string(),
            channel_id: channel_id.to_string(),
            reply_count: 1,
            last_reply_at: reply.create_at,
            participants: vec![reply.user_id.clone()],
        }
    }

    /// Account for one more reply.
    pub fn add_reply(&mut self, reply: &Post) {
        self.reply_count += 1;
        self.last_reply_at = self.last_reply_at.max(reply.create_at);
        if !self.participants.contains(&reply.user_id) {
            self.participants.push(reply.user_id.clone());
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post. Replies create or update the root's thread in the same
    /// transaction.
    async fn save(&self, post: &Post) -> StoreResult<Post>;

    async fn get(&self, id: &str) -> StoreResult<Post>;

    async fn update(&self, post: &Post) -> StoreResult<Post>;

    /// Soft delete. Also soft-deletes the post's file infos; a root removes
    /// its thread and replies, a reply decrements the thread's count.
    async fn delete(&self, id: &str, time: i64) -> StoreResult<()>;

    async fn permanent_delete_by_channel(&self, channel_id: &str) -> StoreResult<()>;

    /// Ids of posts the user flagged in the given channel.
    async fn get_flagged_post_ids(&self, user_id: &str, channel_id: &str) -> StoreResult<Vec<String>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn get(&self, post_id: &str) -> StoreResult<Thread>;

    async fn get_for_channel(&self, channel_id: &str) -> StoreResult<Vec<Thread>>;

    async fn delete(&self, post_id: &str) -> StoreResult<()>;

    async fn update_participants(&self, post_id: &str, participants: &[String]) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(user: &str, at: i64) -> Post {
        Post {
            user_id: user.into(),
            channel_id: "c1".into(),
            create_at: at,
            ..Default::default()
        }
    }

    #[test]
    fn test_top_level_post_is_its_own_root() {
        let mut p = post("u1", 1);
        p.pre_save();
        assert_eq!(p.root_id, p.id);
        assert!(!p.is_reply());
    }

    #[test]
    fn test_reply_keeps_root() {
        let mut p = post("u1", 1);
        p.root_id = "r1".into();
        p.pre_save();
        assert_eq!(p.root_id, "r1");
        assert!(p.is_reply());
    }

    #[test]
    fn test_thread_tracks_distinct_participants() {
        let mut thread = Thread::for_reply("r1", "c1", &post("u1", 5));
        thread.add_reply(&post("u2", 7));
        thread.add_reply(&post("u1", 6));
        assert_eq!(thread.reply_count, 3);
        assert_eq!(thread.last_reply_at, 7);
        assert_eq!(thread.participants, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn test_too_many_files_rejected() {
        let mut p = post("u1", 1);
        p.id = "p1".into();
        p.file_ids = (0..11).map(|i| i.to_string()).collect();
        assert!(p.validate().is_err());
    }
}
