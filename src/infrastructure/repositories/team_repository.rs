//! Team Repository Implementation

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use crate::domain::entities::{Team, TeamMember, TeamStore, TeamType};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const TEAM_COLUMNS: &[&str] = &[
    "Id",
    "CreateAt",
    "UpdateAt",
    "DeleteAt",
    "DisplayName",
    "Name",
    "Description",
    "Email",
    "Type",
    "AllowOpenInvite",
    "GroupConstrained",
];

const TEAM_MEMBER_COLUMNS: &[&str] = &[
    "TeamId",
    "UserId",
    "Roles",
    "DeleteAt",
    "SchemeUser",
    "SchemeAdmin",
    "SchemeGuest",
    "CreateAt",
];

impl FromAnyRow for Team {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        let team_type = row.text("Type")?;
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
            display_name: row.text("DisplayName")?,
            name: row.text("Name")?,
            description: row.text("Description")?,
            email: row.text("Email")?,
            team_type: TeamType::from_str(&team_type)
                .ok_or_else(|| DbError::decode("Type", format!("unknown team type {team_type:?}")))?,
            allow_open_invite: row.boolean("AllowOpenInvite")?,
            group_constrained: row.boolean("GroupConstrained")?,
        })
    }
}

impl FromAnyRow for TeamMember {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            team_id: row.text("TeamId")?,
            user_id: row.text("UserId")?,
            roles: row.text("Roles")?,
            delete_at: row.int("DeleteAt")?,
            scheme_user: row.boolean("SchemeUser")?,
            scheme_admin: row.boolean("SchemeAdmin")?,
            scheme_guest: row.boolean("SchemeGuest")?,
            create_at: row.int("CreateAt")?,
        })
    }
}

/// SQL team store.
#[derive(Clone)]
pub struct SqlTeamStore {
    router: Arc<PoolRouter>,
}

impl SqlTeamStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn get_by(&self, column: &str, value: &str) -> StoreResult<Team> {
        let stmt = self
            .qb()
            .select(TEAM_COLUMNS)
            .from("Teams")
            .where_(Expr::eq(column, value))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get team by {column}")))?
            .ok_or_else(|| StoreError::not_found("Team", value))?;
        Ok(Team::from_row(&row)?)
    }
}

#[async_trait]
impl TeamStore for SqlTeamStore {
    async fn save(&self, team: &Team) -> StoreResult<Team> {
        let mut team = team.clone();
        team.pre_save();
        team.validate().map_err(|e| validation_error("Team", e))?;

        let stmt = self
            .qb()
            .insert("Teams")
            .columns(TEAM_COLUMNS)
            .values(vec![
                team.id.as_str().into(),
                team.create_at.into(),
                team.update_at.into(),
                team.delete_at.into(),
                team.display_name.as_str().into(),
                team.name.as_str().into(),
                team.description.as_str().into(),
                team.email.as_str().into(),
                team.team_type.as_str().into(),
                team.allow_open_invite.into(),
                team.group_constrained.into(),
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() && e.constraint_mentions("name") {
                StoreError::invalid_input("Team", "name", &team.name)
            } else if e.is_unique_violation() {
                StoreError::invalid_input("Team", "id", &team.id)
            } else {
                internal("failed to save team")(e)
            }
        })?;
        Ok(team)
    }

    async fn get(&self, id: &str) -> StoreResult<Team> {
        self.get_by("Id", id).await
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Team> {
        self.get_by("Name", &name.to_lowercase()).await
    }

    async fn save_member(&self, member: &TeamMember) -> StoreResult<TeamMember> {
        let mut member = member.clone();
        if member.create_at == 0 {
            member.create_at = get_millis();
        }
        member.delete_at = 0;

        let stmt = self
            .qb()
            .insert("TeamMembers")
            .columns(TEAM_MEMBER_COLUMNS)
            .values(vec![
                member.team_id.as_str().into(),
                member.user_id.as_str().into(),
                member.roles.as_str().into(),
                member.delete_at.into(),
                member.scheme_user.into(),
                member.scheme_admin.into(),
                member.scheme_guest.into(),
                member.create_at.into(),
            ])
            .upsert(
                &["TeamId", "UserId"],
                &["Roles", "DeleteAt", "SchemeUser", "SchemeAdmin", "SchemeGuest"],
            )
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to save team member"))?;
        Ok(member)
    }

    async fn get_member(&self, team_id: &str, user_id: &str) -> StoreResult<TeamMember> {
        let stmt = self
            .qb()
            .select(TEAM_MEMBER_COLUMNS)
            .from("TeamMembers")
            .where_(Expr::eq("TeamId", team_id))
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get team member"))?
            .ok_or_else(|| StoreError::not_found("TeamMember", format!("team_id={team_id}, user_id={user_id}")))?;
        Ok(TeamMember::from_row(&row)?)
    }

    async fn remove_member(&self, team_id: &str, user_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .update("TeamMembers")
            .set("DeleteAt", get_millis())
            .where_(Expr::eq("TeamId", team_id))
            .where_(Expr::eq("UserId", user_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to remove team member"))?;
        Ok(())
    }

    async fn get_teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        let columns: Vec<String> = TEAM_COLUMNS.iter().map(|c| format!("t.{c}")).collect();
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        let stmt = self
            .qb()
            .select(&columns)
            .from("Teams t")
            .join("TeamMembers tm ON tm.TeamId = t.Id")
            .where_(Expr::eq("tm.UserId", user_id))
            .where_(Expr::eq("tm.DeleteAt", 0_i64))
            .where_(Expr::eq("t.DeleteAt", 0_i64))
            .order_by("t.DisplayName")
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get teams for user"))?;
        Ok(decode_all(&rows)?)
    }
}
