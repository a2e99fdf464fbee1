//! User Repository Implementation
//!
//! SQL implementation of the UserStore trait over the `Users` table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::helpers::{map_arg, BATCH_SIZE};
use crate::domain::entities::{User, UserCountOptions, UserForIndexing, UserStore, UserUpdate};
use crate::domain::services::roles::{demote_user_roles, promote_guest_roles, strip_custom_roles, SYSTEM_GUEST_ROLE};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::{decode_all, strings};
use crate::infrastructure::database::{
    finish, Arg, DbError, DbHandle, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, Tx,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const USER_COLUMNS: &[&str] = &[
    "Id",
    "CreateAt",
    "UpdateAt",
    "DeleteAt",
    "Username",
    "Password",
    "AuthData",
    "AuthService",
    "Email",
    "EmailVerified",
    "Nickname",
    "FirstName",
    "LastName",
    "Position",
    "Roles",
    "AllowMarketing",
    "Props",
    "NotifyProps",
    "LastPasswordUpdate",
    "LastPictureUpdate",
    "FailedAttempts",
    "Locale",
    "Timezone",
    "MfaActive",
    "MfaSecret",
];

impl FromAnyRow for User {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.text("Id")?,
            create_at: row.int("CreateAt")?,
            update_at: row.int("UpdateAt")?,
            delete_at: row.int("DeleteAt")?,
            username: row.text("Username")?,
            password: row.text("Password")?,
            auth_data: row.opt_text("AuthData")?,
            auth_service: row.text("AuthService")?,
            email: row.text("Email")?,
            email_verified: row.boolean("EmailVerified")?,
            nickname: row.text("Nickname")?,
            first_name: row.text("FirstName")?,
            last_name: row.text("LastName")?,
            position: row.text("Position")?,
            roles: row.text("Roles")?,
            allow_marketing: row.boolean("AllowMarketing")?,
            props: row.json("Props")?,
            notify_props: row.json("NotifyProps")?,
            last_password_update: row.int("LastPasswordUpdate")?,
            last_picture_update: row.int("LastPictureUpdate")?,
            failed_attempts: row.int("FailedAttempts")?,
            locale: row.text("Locale")?,
            timezone: row.json("Timezone")?,
            mfa_active: row.boolean("MfaActive")?,
            mfa_secret: row.text("MfaSecret")?,
        })
    }
}

fn user_values(user: &User) -> StoreResult<Vec<Arg>> {
    Ok(vec![
        user.id.as_str().into(),
        user.create_at.into(),
        user.update_at.into(),
        user.delete_at.into(),
        user.username.as_str().into(),
        user.password.as_str().into(),
        auth_data_arg(user.auth_data.as_deref()),
        user.auth_service.as_str().into(),
        user.email.as_str().into(),
        user.email_verified.into(),
        user.nickname.as_str().into(),
        user.first_name.as_str().into(),
        user.last_name.as_str().into(),
        user.position.as_str().into(),
        user.roles.as_str().into(),
        user.allow_marketing.into(),
        map_arg(&user.props)?,
        map_arg(&user.notify_props)?,
        user.last_password_update.into(),
        user.last_picture_update.into(),
        user.failed_attempts.into(),
        user.locale.as_str().into(),
        map_arg(&user.timezone)?,
        user.mfa_active.into(),
        user.mfa_secret.as_str().into(),
    ])
}

/// Blank auth data is stored as NULL so the unique index ignores it.
fn auth_data_arg(auth_data: Option<&str>) -> Arg {
    auth_data.map_or(Arg::NullText, Arg::text_or_null)
}

/// Map a unique violation to the field that collided.
fn user_write_error(user: &User, context: &str, err: DbError) -> StoreError {
    if !err.is_unique_violation() {
        return internal(context)(err);
    }
    if err.constraint_mentions("email") {
        StoreError::invalid_input("User", "email", &user.email)
    } else if err.constraint_mentions("username") {
        StoreError::invalid_input("User", "username", &user.username)
    } else if err.constraint_mentions("authdata") {
        StoreError::invalid_input("User", "auth_data", user.auth_data.as_deref().unwrap_or_default())
    } else {
        StoreError::invalid_input("User", "id", &user.id)
    }
}

/// SQL user store.
#[derive(Clone)]
pub struct SqlUserStore {
    router: Arc<PoolRouter>,
}

impl SqlUserStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    async fn get_from(&self, db: &DbHandle, id: &str) -> StoreResult<User> {
        let stmt = self
            .qb()
            .select(USER_COLUMNS)
            .from("Users")
            .where_(Expr::eq("Id", id))
            .to_statement();
        let row = db
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to get user id={id}")))?
            .ok_or_else(|| StoreError::not_found("User", id))?;
        Ok(User::from_row(&row)?)
    }

    async fn get_by_column(&self, column: &str, value: &str) -> StoreResult<User> {
        let stmt = self
            .qb()
            .select(USER_COLUMNS)
            .from("Users")
            .where_(Expr::eq(column, value))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal(format!("failed to find user by {column}")))?
            .ok_or_else(|| StoreError::not_found("User", format!("{column}={value}")))?;
        Ok(User::from_row(&row)?)
    }

    async fn update_columns(&self, user_id: &str, sets: Vec<(&str, Arg)>) -> StoreResult<()> {
        let mut update = self.qb().update("Users");
        for (column, value) in sets {
            update = update.set(column, value);
        }
        let stmt = update.where_(Expr::eq("Id", user_id)).to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal(format!("failed to update user id={user_id}")))?;
        Ok(())
    }

    async fn rewrite_guest_roles(
        &self,
        tx: &mut Tx,
        user_id: &str,
        promote: bool,
    ) -> StoreResult<User> {
        let qb = self.qb();
        let stmt = qb
            .select(USER_COLUMNS)
            .from("Users")
            .where_(Expr::eq("Id", user_id))
            .to_statement();
        let row = tx
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to load user for role change"))?
            .ok_or_else(|| StoreError::not_found("User", user_id))?;
        let mut user = User::from_row(&row)?;

        user.roles = if promote {
            promote_guest_roles(&user.roles)
        } else {
            demote_user_roles(&user.roles)
        };
        user.update_at = get_millis();

        let stmt = qb
            .update("Users")
            .set("Roles", user.roles.as_str())
            .set("UpdateAt", user.update_at)
            .where_(Expr::eq("Id", user_id))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to update user roles"))?;

        for table in ["ChannelMembers", "TeamMembers"] {
            let stmt = qb
                .update(table)
                .set("SchemeUser", promote)
                .set("SchemeGuest", !promote)
                .where_(Expr::eq("UserId", user_id))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal(format!("failed to update {table} scheme roles")))?;
        }

        Ok(user)
    }

    async fn clear_custom_roles_batch(&self, tx: &mut Tx, after_id: &str) -> StoreResult<(usize, String)> {
        let qb = self.qb();
        let stmt = qb
            .select(&["Id", "Roles"])
            .from("Users")
            .where_(Expr::gt("Id", after_id))
            .order_by("Id")
            .limit(BATCH_SIZE)
            .to_statement();
        let rows = tx
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to load users for role cleanup"))?;

        let mut last_id = after_id.to_string();
        for row in &rows {
            let id = row.text("Id")?;
            let roles = row.text("Roles")?;
            if let Some(cleaned) = strip_custom_roles(&roles) {
                let stmt = qb
                    .update("Users")
                    .set("Roles", cleaned)
                    .where_(Expr::eq("Id", id.as_str()))
                    .to_statement();
                tx.execute(&stmt)
                    .await
                    .map_err(internal("failed to clear custom roles"))?;
            }
            last_id = id;
        }
        Ok((rows.len(), last_id))
    }
}

fn channel_role_predicate(alias: &str, role: &str) -> Option<Expr> {
    let (user, admin, guest) = match role.rsplit('_').next() {
        Some("admin") => (None, Some(true), None),
        Some("user") => (Some(true), Some(false), None),
        Some("guest") => (None, None, Some(true)),
        _ => return None,
    };
    let mut parts = Vec::new();
    if let Some(v) = user {
        parts.push(Expr::eq(&format!("{alias}.SchemeUser"), v));
    }
    if let Some(v) = admin {
        parts.push(Expr::eq(&format!("{alias}.SchemeAdmin"), v));
    }
    if let Some(v) = guest {
        parts.push(Expr::eq(&format!("{alias}.SchemeGuest"), v));
    }
    Some(Expr::and(parts))
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn save(&self, user: &User) -> StoreResult<User> {
        let mut user = user.clone();
        user.pre_save();
        user.validate().map_err(|e| validation_error("User", e))?;

        let stmt = self
            .qb()
            .insert("Users")
            .columns(USER_COLUMNS)
            .values(user_values(&user)?)
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(|e| user_write_error(&user, "failed to save user", e))?;

        tracing::debug!(user_id = %user.id, "User saved");
        Ok(user)
    }

    async fn update(&self, user: &User, trusted: bool) -> StoreResult<UserUpdate> {
        let mut user = user.clone();
        user.pre_update();
        user.validate().map_err(|e| validation_error("User", e))?;

        let master = self.router.master();
        let old = self.get_from(&master, &user.id).await?;

        if !trusted {
            user.create_at = old.create_at;
            user.auth_data = old.auth_data.clone();
            user.auth_service = old.auth_service.clone();
            user.password = old.password.clone();
            user.last_password_update = old.last_password_update;
            user.last_picture_update = old.last_picture_update;
            user.email_verified = old.email_verified;
            user.failed_attempts = old.failed_attempts;
            user.mfa_secret = old.mfa_secret.clone();
            user.mfa_active = old.mfa_active;
            user.roles = old.roles.clone();
            user.delete_at = old.delete_at;

            if old.is_externally_managed() && user.email != old.email {
                return Err(StoreError::invalid_input("User", "email", &user.email));
            }
        }

        if user.email != old.email {
            user.email_verified = false;
        }

        let values = user_values(&user)?;
        let mut update = self.qb().update("Users");
        for (column, value) in USER_COLUMNS.iter().zip(values).skip(1) {
            update = update.set(column, value);
        }
        let stmt = update.where_(Expr::eq("Id", user.id.as_str())).to_statement();
        let count = master
            .execute(&stmt)
            .await
            .map_err(|e| user_write_error(&user, "failed to update user", e))?;

        if count > 1 {
            return Err(StoreError::internal(format!(
                "multiple users were updated: user_id={}, count={count}",
                user.id
            )));
        }

        Ok(UserUpdate { old, new: user })
    }

    async fn get(&self, id: &str) -> StoreResult<User> {
        self.get_from(&self.router.replica(), id).await
    }

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = self
            .qb()
            .select(USER_COLUMNS)
            .from("Users")
            .where_(Expr::in_list("Id", ids))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get users"))?;
        Ok(decode_all(&rows)?)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.get_by_column("Email", &email.to_lowercase()).await
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<User> {
        self.get_by_column("Username", &username.to_lowercase()).await
    }

    async fn get_by_auth(&self, auth_data: &str, auth_service: &str) -> StoreResult<User> {
        if auth_data.is_empty() {
            return Err(StoreError::invalid_input("User", "auth_data", ""));
        }
        let stmt = self
            .qb()
            .select(USER_COLUMNS)
            .from("Users")
            .where_(Expr::eq("AuthData", auth_data))
            .where_(Expr::eq("AuthService", auth_service))
            .to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to find user by auth data"))?
            .ok_or_else(|| StoreError::not_found("User", format!("authData={auth_data}")))?;
        Ok(User::from_row(&row)?)
    }

    async fn update_password(&self, user_id: &str, hashed_password: &str) -> StoreResult<()> {
        let now = get_millis();
        self.update_columns(
            user_id,
            vec![
                ("Password", hashed_password.into()),
                ("LastPasswordUpdate", now.into()),
                ("UpdateAt", now.into()),
                ("AuthData", Arg::NullText),
                ("AuthService", "".into()),
                ("FailedAttempts", 0_i64.into()),
            ],
        )
        .await
    }

    async fn update_failed_password_attempts(&self, user_id: &str, attempts: i64) -> StoreResult<()> {
        self.update_columns(user_id, vec![("FailedAttempts", attempts.into())])
            .await
    }

    async fn update_mfa_secret(&self, user_id: &str, secret: &str) -> StoreResult<()> {
        self.update_columns(
            user_id,
            vec![("MfaSecret", secret.into()), ("UpdateAt", get_millis().into())],
        )
        .await
    }

    async fn update_mfa_active(&self, user_id: &str, active: bool) -> StoreResult<()> {
        self.update_columns(
            user_id,
            vec![("MfaActive", active.into()), ("UpdateAt", get_millis().into())],
        )
        .await
    }

    async fn update_last_picture_update(&self, user_id: &str, time: i64) -> StoreResult<()> {
        self.update_columns(
            user_id,
            vec![("LastPictureUpdate", time.into()), ("UpdateAt", get_millis().into())],
        )
        .await
    }

    async fn update_auth_data(
        &self,
        user_id: &str,
        service: &str,
        auth_data: Option<String>,
        email: &str,
        reset_mfa: bool,
    ) -> StoreResult<String> {
        let mut update = self
            .qb()
            .update("Users")
            .set("Password", "")
            .set("LastPasswordUpdate", get_millis())
            .set("UpdateAt", get_millis())
            .set("FailedAttempts", 0_i64)
            .set("AuthService", service)
            .set("AuthData", auth_data_arg(auth_data.as_deref()));
        if !email.is_empty() {
            update = update.set("Email", email.to_lowercase());
        }
        if reset_mfa {
            update = update.set("MfaActive", false).set("MfaSecret", "");
        }
        let stmt = update.where_(Expr::eq("Id", user_id)).to_statement();

        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() && e.constraint_mentions("email") {
                StoreError::invalid_input("User", "email", email)
            } else if e.is_unique_violation() {
                StoreError::invalid_input("User", "auth_data", auth_data.as_deref().unwrap_or_default())
            } else {
                internal("failed to update user auth data")(e)
            }
        })?;
        Ok(user_id.to_string())
    }

    async fn deactivate_guests(&self) -> StoreResult<Vec<String>> {
        let now = get_millis();
        let qb = self.qb();
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;

        let result: StoreResult<Vec<String>> = async {
            let stmt = qb
                .update("Users")
                .set("UpdateAt", now)
                .set("DeleteAt", now)
                .where_(Expr::eq("Roles", SYSTEM_GUEST_ROLE))
                .where_(Expr::eq("DeleteAt", 0_i64))
                .to_statement();
            tx.execute(&stmt)
                .await
                .map_err(internal("failed to deactivate guests"))?;

            let stmt = qb
                .select(&["Id"])
                .from("Users")
                .where_(Expr::eq("Roles", SYSTEM_GUEST_ROLE))
                .where_(Expr::eq("UpdateAt", now))
                .where_(Expr::eq("DeleteAt", now))
                .to_statement();
            let rows = tx
                .fetch_all(&stmt)
                .await
                .map_err(internal("failed to read deactivated guests"))?;
            Ok(strings(&rows, "Id")?)
        }
        .await;

        let ids = finish(tx, result).await?;
        tracing::info!(count = ids.len(), "Deactivated guest accounts");
        Ok(ids)
    }

    async fn promote_guest_to_user(&self, user_id: &str) -> StoreResult<()> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.rewrite_guest_roles(&mut tx, user_id, true).await;
        finish(tx, result).await.map(|_| ())
    }

    async fn demote_user_to_guest(&self, user_id: &str) -> StoreResult<User> {
        let mut tx = self
            .router
            .master()
            .begin()
            .await
            .map_err(internal("failed to begin transaction"))?;
        let result = self.rewrite_guest_roles(&mut tx, user_id, false).await;
        finish(tx, result).await
    }

    async fn clear_all_custom_role_assignments(&self) -> StoreResult<()> {
        let master = self.router.master();
        let mut last_id = String::new();
        loop {
            let mut tx = master
                .begin()
                .await
                .map_err(internal("failed to begin transaction"))?;
            let result = self.clear_custom_roles_batch(&mut tx, &last_id).await;
            let (count, next) = finish(tx, result).await?;
            if (count as u64) < BATCH_SIZE {
                return Ok(());
            }
            last_id = next;
        }
    }

    async fn count(&self, options: UserCountOptions) -> StoreResult<i64> {
        if !options.include_bot_accounts && options.exclude_regular_users {
            return Err(StoreError::invalid_input(
                "UserCountOptions",
                "exclude_regular_users",
                "cannot exclude regular users and bots at once",
            ));
        }

        let mut query = self.qb().select(&["COUNT(DISTINCT u.Id)"]).from("Users u");

        if options.include_bot_accounts {
            if options.exclude_regular_users {
                query = query.join("Bots b ON b.UserId = u.Id");
            }
        } else {
            query = query
                .left_join("Bots b ON b.UserId = u.Id")
                .where_(Expr::is_null("b.UserId"));
        }

        if !options.include_deleted {
            query = query.where_(Expr::eq("u.DeleteAt", 0_i64));
        }

        if let Some(team_id) = &options.team_id {
            query = query
                .join("TeamMembers tm ON tm.UserId = u.Id AND tm.DeleteAt = 0")
                .where_(Expr::eq("tm.TeamId", team_id));
        }
        if let Some(channel_id) = &options.channel_id {
            query = query
                .join("ChannelMembers cm ON cm.UserId = u.Id")
                .where_(Expr::eq("cm.ChannelId", channel_id));
        }

        if let Some(restrictions) = &options.view_restrictions {
            if restrictions.teams.is_empty() && restrictions.channels.is_empty() {
                query = query.where_(Expr::raw("1 = 0"));
            } else {
                let mut visible = Vec::new();
                if !restrictions.teams.is_empty() {
                    query = query.left_join_with(
                        &format!(
                            "TeamMembers rvtm ON rvtm.UserId = u.Id AND rvtm.DeleteAt = 0 AND rvtm.TeamId IN ({})",
                            super::helpers::in_list(&restrictions.teams)
                        ),
                        restrictions.teams.iter(),
                    );
                    visible.push(Expr::is_not_null("rvtm.UserId"));
                }
                if !restrictions.channels.is_empty() {
                    query = query.left_join_with(
                        &format!(
                            "ChannelMembers rvcm ON rvcm.UserId = u.Id AND rvcm.ChannelId IN ({})",
                            super::helpers::in_list(&restrictions.channels)
                        ),
                        restrictions.channels.iter(),
                    );
                    visible.push(Expr::is_not_null("rvcm.UserId"));
                }
                query = query.where_(Expr::or(visible));
            }
        }

        let mut role_filters: Vec<Expr> = options
            .roles
            .iter()
            .map(|role| Expr::ilike("u.Roles", &format!("%{role}%")))
            .collect();
        if options.channel_id.is_some() {
            role_filters.extend(
                options
                    .channel_roles
                    .iter()
                    .filter_map(|role| channel_role_predicate("cm", role)),
            );
        }
        if options.team_id.is_some() {
            role_filters.extend(
                options
                    .team_roles
                    .iter()
                    .filter_map(|role| channel_role_predicate("tm", role)),
            );
        }
        if !role_filters.is_empty() {
            query = query.where_(Expr::or(role_filters));
        }

        self.router
            .replica()
            .fetch_count(&query.to_statement())
            .await
            .map_err(internal("failed to count users"))
    }

    async fn get_users_batch_for_indexing(
        &self,
        start_time: i64,
        end_time: i64,
        limit: u64,
    ) -> StoreResult<Vec<UserForIndexing>> {
        let qb = self.qb();
        let db = self.router.search_replica();

        let stmt = qb
            .select(&[
                "Id", "Username", "Nickname", "FirstName", "LastName", "Roles", "CreateAt", "DeleteAt",
            ])
            .from("Users")
            .where_(Expr::gte("CreateAt", start_time))
            .where_(Expr::lt("CreateAt", end_time))
            .order_by("CreateAt")
            .limit(limit)
            .to_statement();
        let rows = db
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get users for indexing"))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(UserForIndexing {
                id: row.text("Id")?,
                username: row.text("Username")?,
                nickname: row.text("Nickname")?,
                first_name: row.text("FirstName")?,
                last_name: row.text("LastName")?,
                roles: row.text("Roles")?,
                create_at: row.int("CreateAt")?,
                delete_at: row.int("DeleteAt")?,
                team_ids: Vec::new(),
                channel_ids: Vec::new(),
            });
        }
        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();

        let stmt = qb
            .select(&["cm.UserId", "cm.ChannelId"])
            .from("ChannelMembers cm")
            .join("Channels c ON c.Id = cm.ChannelId")
            .where_(Expr::eq("c.Type", "O"))
            .where_(Expr::in_list("cm.UserId", &ids))
            .to_statement();
        let channel_rows = db
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get channel members for indexing"))?;

        let stmt = qb
            .select(&["UserId", "TeamId"])
            .from("TeamMembers")
            .where_(Expr::in_list("UserId", &ids))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        let team_rows = db
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get team members for indexing"))?;

        let mut channels: HashMap<String, Vec<String>> = HashMap::new();
        for row in &channel_rows {
            channels
                .entry(row.text("UserId")?)
                .or_default()
                .push(row.text("ChannelId")?);
        }
        let mut teams: HashMap<String, Vec<String>> = HashMap::new();
        for row in &team_rows {
            teams
                .entry(row.text("UserId")?)
                .or_default()
                .push(row.text("TeamId")?);
        }

        for user in &mut users {
            user.channel_ids = channels.remove(&user.id).unwrap_or_default();
            user.team_ids = teams.remove(&user.id).unwrap_or_default();
        }
        users.sort_by_key(|u| u.create_at);
        Ok(users)
    }

    async fn get_known_users(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let stmt = self
            .qb()
            .select(&["ocm.UserId"])
            .distinct()
            .from("ChannelMembers cm")
            .join("ChannelMembers ocm ON ocm.ChannelId = cm.ChannelId")
            .where_(Expr::eq("cm.UserId", user_id))
            .where_(Expr::not_eq("ocm.UserId", user_id))
            .to_statement();
        let rows = self
            .router
            .replica()
            .fetch_all(&stmt)
            .await
            .map_err(internal("failed to get known users"))?;
        Ok(strings(&rows, "UserId")?)
    }

    async fn permanent_delete(&self, user_id: &str) -> StoreResult<()> {
        let stmt = self
            .qb()
            .delete("Users")
            .where_(Expr::eq("Id", user_id))
            .to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal(format!("failed to delete user id={user_id}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::ErrorClass;

    fn unique(constraint: &str) -> DbError {
        DbError::Sql {
            class: ErrorClass::UniqueConstraint,
            constraint: Some(constraint.into()),
            source: sqlx::Error::RowNotFound,
        }
    }

    fn user() -> User {
        User {
            id: "u2".into(),
            username: "b".into(),
            email: "same@x".into(),
            auth_data: Some("ext".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_unique_violation_names_field() {
        match user_write_error(&user(), "save", unique("users_email_key")) {
            StoreError::InvalidInput { field, value, .. } => {
                assert_eq!(field, "email");
                assert_eq!(value, "same@x");
            }
            other => panic!("unexpected {other:?}"),
        }
        match user_write_error(&user(), "save", unique("Users.Username")) {
            StoreError::InvalidInput { field, .. } => assert_eq!(field, "username"),
            other => panic!("unexpected {other:?}"),
        }
        match user_write_error(&user(), "save", unique("users_authdata_key")) {
            StoreError::InvalidInput { field, value, .. } => {
                assert_eq!(field, "auth_data");
                assert_eq!(value, "ext");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = DbError::Sql {
            class: ErrorClass::Other,
            constraint: None,
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(user_write_error(&user(), "save", err).kind(), "internal");
    }

    #[test]
    fn test_blank_auth_data_is_null() {
        assert_eq!(auth_data_arg(None), Arg::NullText);
        assert_eq!(auth_data_arg(Some("")), Arg::NullText);
        assert_eq!(auth_data_arg(Some("x")), Arg::Text("x".into()));
    }

    #[test]
    fn test_values_match_columns() {
        assert_eq!(user_values(&user()).unwrap().len(), USER_COLUMNS.len());
    }

    #[test]
    fn test_scheme_role_predicates() {
        assert!(channel_role_predicate("cm", "channel_admin").is_some());
        assert!(channel_role_predicate("tm", "team_guest").is_some());
        assert!(channel_role_predicate("cm", "channel_owner").is_none());
    }
}
