//! Favorites mirroring.
//!
//! A `favorite_channel` preference and the favorites sidebar categories must
//! agree. Both the preference store and the sidebar store change one side
//! and call into here, inside their own transaction, to update the other.

use crate::domain::entities::{
    SidebarCategoryType, PREFERENCE_CATEGORY_FAVORITE_CHANNEL, PREFERENCE_VALUE_TRUE,
    SIDEBAR_SORT_ORDER_STEP,
};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::strings;
use crate::infrastructure::database::{Expr, QueryBuilder, RowExt, Tx};
use crate::shared::error::StoreResult;

/// Put `channel_id` at the top of every favorites category of the user on
/// teams where the channel is visible. Direct and group channels are visible
/// on every team.
pub(crate) async fn add_to_favorite_categories(
    qb: &QueryBuilder,
    tx: &mut Tx,
    user_id: &str,
    channel_id: &str,
) -> StoreResult<()> {
    let stmt = qb
        .select(&["TeamId"])
        .from("Channels")
        .where_(Expr::eq("Id", channel_id))
        .to_statement();
    let Some(row) = tx
        .fetch_optional(&stmt)
        .await
        .map_err(internal("failed to load channel for favorites"))?
    else {
        return Ok(());
    };
    let channel_team = row.text("TeamId")?;

    let stmt = qb
        .select(&["Id", "TeamId"])
        .from("SidebarCategories")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::eq("Type", SidebarCategoryType::Favorites.as_str()))
        .where_if(!channel_team.is_empty(), || Expr::eq("TeamId", channel_team.as_str()))
        .order_by("Id")
        .to_statement();
    let rows = tx
        .fetch_all(&stmt)
        .await
        .map_err(internal("failed to load favorites categories"))?;

    for row in &rows {
        let category_id = row.text("Id")?;
        let team_id = row.text("TeamId")?;

        let already = qb
            .select(&["ChannelId"])
            .from("SidebarChannels")
            .where_(Expr::eq("CategoryId", category_id.as_str()))
            .where_(Expr::eq("ChannelId", channel_id))
            .to_statement();
        if tx
            .fetch_optional(&already)
            .await
            .map_err(internal("failed to check favorites membership"))?
            .is_some()
        {
            continue;
        }

        let team_categories = qb
            .select(&["Id"])
            .from("SidebarCategories")
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::eq("TeamId", team_id.as_str()));
        let stmt = qb
            .delete("SidebarChannels")
            .where_(Expr::eq("ChannelId", channel_id))
            .where_(Expr::eq("UserId", user_id))
            .where_(Expr::in_subquery("CategoryId", &team_categories))
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to move channel out of other categories"))?;

        let stmt = qb
            .select(&["MIN(SortOrder) AS MinOrder"])
            .from("SidebarChannels")
            .where_(Expr::eq("CategoryId", category_id.as_str()))
            .to_statement();
        let top = match tx
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to read favorites order"))?
        {
            Some(row) => row.opt_int("MinOrder")?,
            None => None,
        };
        let sort_order = top.map_or(0, |min| min - SIDEBAR_SORT_ORDER_STEP);

        let stmt = qb
            .insert("SidebarChannels")
            .columns(&["ChannelId", "UserId", "CategoryId", "SortOrder"])
            .values(vec![
                channel_id.into(),
                user_id.into(),
                category_id.as_str().into(),
                sort_order.into(),
            ])
            .to_statement();
        tx.execute(&stmt)
            .await
            .map_err(internal("failed to add channel to favorites"))?;
    }
    Ok(())
}

/// Remove `channel_id` from the user's favorites categories on every team.
pub(crate) async fn remove_from_favorite_categories(
    qb: &QueryBuilder,
    tx: &mut Tx,
    user_id: &str,
    channel_id: &str,
) -> StoreResult<()> {
    let favorites = qb
        .select(&["Id"])
        .from("SidebarCategories")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::eq("Type", SidebarCategoryType::Favorites.as_str()));
    let stmt = qb
        .delete("SidebarChannels")
        .where_(Expr::eq("ChannelId", channel_id))
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::in_subquery("CategoryId", &favorites))
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to remove channel from favorites"))?;
    Ok(())
}

/// Empty every favorites category of the user.
pub(crate) async fn clear_favorite_categories(qb: &QueryBuilder, tx: &mut Tx, user_id: &str) -> StoreResult<()> {
    let favorites = qb
        .select(&["Id"])
        .from("SidebarCategories")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::eq("Type", SidebarCategoryType::Favorites.as_str()));
    let stmt = qb
        .delete("SidebarChannels")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::in_subquery("CategoryId", &favorites))
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to clear favorites"))?;
    Ok(())
}

/// Remove `channel_id` from every user's favorites categories.
pub(crate) async fn remove_channel_from_all_favorites(
    qb: &QueryBuilder,
    tx: &mut Tx,
    channel_id: &str,
) -> StoreResult<()> {
    let favorites = qb
        .select(&["Id"])
        .from("SidebarCategories")
        .where_(Expr::eq("Type", SidebarCategoryType::Favorites.as_str()));
    let stmt = qb
        .delete("SidebarChannels")
        .where_(Expr::eq("ChannelId", channel_id))
        .where_(Expr::in_subquery("CategoryId", &favorites))
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to remove channel from favorites"))?;
    Ok(())
}

/// Record `channel_id` as a favorite preference.
pub(crate) async fn set_favorite_preference(
    qb: &QueryBuilder,
    tx: &mut Tx,
    user_id: &str,
    channel_id: &str,
) -> StoreResult<()> {
    let stmt = qb
        .insert("Preferences")
        .columns(&["UserId", "Category", "Name", "Value"])
        .values(vec![
            user_id.into(),
            PREFERENCE_CATEGORY_FAVORITE_CHANNEL.into(),
            channel_id.into(),
            PREFERENCE_VALUE_TRUE.into(),
        ])
        .upsert(&["UserId", "Category", "Name"], &["Value"])
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to save favorite preference"))?;
    Ok(())
}

pub(crate) async fn delete_favorite_preference(
    qb: &QueryBuilder,
    tx: &mut Tx,
    user_id: &str,
    channel_id: &str,
) -> StoreResult<()> {
    let stmt = qb
        .delete("Preferences")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::eq("Category", PREFERENCE_CATEGORY_FAVORITE_CHANNEL))
        .where_(Expr::eq("Name", channel_id))
        .to_statement();
    tx.execute(&stmt)
        .await
        .map_err(internal("failed to delete favorite preference"))?;
    Ok(())
}

/// Channel ids the user has a `"true"` favorite preference for.
pub(crate) async fn favorite_channel_ids(qb: &QueryBuilder, tx: &mut Tx, user_id: &str) -> StoreResult<Vec<String>> {
    let stmt = qb
        .select(&["Name"])
        .from("Preferences")
        .where_(Expr::eq("UserId", user_id))
        .where_(Expr::eq("Category", PREFERENCE_CATEGORY_FAVORITE_CHANNEL))
        .where_(Expr::eq("Value", PREFERENCE_VALUE_TRUE))
        .to_statement();
    let rows = tx
        .fetch_all(&stmt)
        .await
        .map_err(internal("failed to load favorite preferences"))?;
    Ok(strings(&rows, "Name")?)
}
