//! Team entity and store trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Who may join a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TeamType {
    #[default]
    Open,
    Invite,
}

impl TeamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Invite => "I",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "O" => Some(Self::Open),
            "I" => Some(Self::Invite),
            _ => None,
        }
    }
}

impl fmt::Display for TeamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Team {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    /// URL-safe, unique.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: String,
    #[validate(length(max = 128))]
    pub email: String,
    pub team_type: TeamType,
    pub allow_open_invite: bool,
    /// Membership is managed by group syncables.
    pub group_constrained: bool,
}

impl Team {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        self.update_at = self.create_at;
        self.name = self.name.to_lowercase();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: String,
    pub user_id: String,
    pub roles: String,
    pub delete_at: i64,
    pub scheme_user: bool,
    pub scheme_admin: bool,
    pub scheme_guest: bool,
    pub create_at: i64,
}

impl TeamMember {
    pub fn new(team_id: &str, user_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            scheme_user: true,
            create_at: get_millis(),
            ..Default::default()
        }
    }
}

/// Data access for teams and their memberships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn save(&self, team: &Team) -> StoreResult<Team>;

    async fn get(&self, id: &str) -> StoreResult<Team>;

    async fn get_by_name(&self, name: &str) -> StoreResult<Team>;

    /// Insert or reactivate a membership.
    async fn save_member(&self, member: &TeamMember) -> StoreResult<TeamMember>;

    async fn get_member(&self, team_id: &str, user_id: &str) -> StoreResult<TeamMember>;

    /// Soft delete: sets `DeleteAt`.
    async fn remove_member(&self, team_id: &str, user_id: &str) -> StoreResult<()>;

    /// Teams with an active membership for the user.
    async fn get_teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_type_round_trip() {
        for t in [TeamType::Open, TeamType::Invite] {
            assert_eq!(TeamType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(TeamType::from_str("X"), None);
    }

    #[test]
    fn test_pre_save_lowercases_name() {
        let mut team = Team {
            display_name: "Core".into(),
            name: "Core-Team".into(),
            ..Default::default()
        };
        team.pre_save();
        assert_eq!(team.name, "core-team");
        assert_eq!(team.id.len(), 26);
        assert!(team.validate().is_ok());
    }

    #[test]
    fn test_new_member_is_scheme_user() {
        let member = TeamMember::new("t1", "u1");
        assert!(member.scheme_user);
        assert!(!member.scheme_guest);
        assert_eq!(member.delete_at, 0);
    }
}
