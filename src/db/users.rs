//! Database queries for users.

use std::collections::BTreeSet;

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::User;

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, user_id: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

/// Set the active flag of a single user and return the updated record.
pub async fn set_user_active(
    pool: &DbPool,
    user_id: &str,
    is_active: bool,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_active = ?
        WHERE user_id = ?
        RETURNING user_id, username, team_name, is_active
        "#,
    )
    .bind(is_active)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

/// Deactivate every active member of a team in a single statement.
///
/// Returns the IDs that were flipped. Members that were already inactive are
/// not included.
pub async fn deactivate_all_active_in_team(
    pool: &DbPool,
    team_name: &str,
) -> Result<BTreeSet<String>, AppError> {
    let flipped: Vec<(String,)> = sqlx::query_as(
        r#"
        UPDATE users SET is_active = 0
        WHERE team_name = ? AND is_active = 1
        RETURNING user_id
        "#,
    )
    .bind(team_name)
    .fetch_all(pool)
    .await?;

    if flipped.is_empty() && !super::teams::team_exists(pool, team_name).await? {
        return Err(AppError::not_found_with_id("Team", team_name));
    }

    Ok(flipped.into_iter().map(|(id,)| id).collect())
}

/// List active members of a team, excluding one user (typically the author).
pub async fn list_active_members(
    pool: &DbPool,
    team_name: &str,
    exclude_user_id: &str,
) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, username, team_name, is_active
        FROM users
        WHERE team_name = ? AND is_active = 1 AND user_id != ?
        ORDER BY user_id
        "#,
    )
    .bind(team_name)
    .bind(exclude_user_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}
