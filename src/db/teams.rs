//! Database queries for teams.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{Team, TeamMember};

/// Check whether a team row exists.
pub async fn team_exists(pool: &DbPool, team_name: &str) -> Result<bool, AppError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT team_name FROM teams WHERE team_name = ?")
        .bind(team_name)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Get a team and all of its members.
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    if !team_exists(pool, team_name).await? {
        return Err(AppError::not_found_with_id("Team", team_name));
    }

    let members: Vec<(String, String, bool)> = sqlx::query_as(
        "SELECT user_id, username, is_active FROM users WHERE team_name = ? ORDER BY user_id",
    )
    .bind(team_name)
    .fetch_all(pool)
    .await?;

    Ok(Team {
        team_name: team_name.to_string(),
        members: members
            .into_iter()
            .map(|(user_id, username, is_active)| TeamMember {
                user_id,
                username,
                is_active,
            })
            .collect(),
    })
}

/// Create the team if needed and upsert its members in one transaction.
///
/// A member whose `user_id` already exists is updated in place (name, team
/// and active flag), so a user moves teams instead of being duplicated.
pub async fn upsert_team_and_members(
    pool: &DbPool,
    team_name: &str,
    members: &[TeamMember],
) -> Result<Team, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO teams (team_name) VALUES (?) ON CONFLICT (team_name) DO NOTHING")
        .bind(team_name)
        .execute(&mut *tx)
        .await?;

    for member in members {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, team_name, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                username = excluded.username,
                team_name = excluded.team_name,
                is_active = excluded.is_active
            "#,
        )
        .bind(&member.user_id)
        .bind(&member.username)
        .bind(team_name)
        .bind(member.is_active)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    get_team(pool, team_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);
        crate::db::initialize(&db_path).await.unwrap()
    }

    fn member(id: &str, name: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: name.to_string(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_additive() {
        let pool = setup_test_db().await;

        upsert_team_and_members(&pool, "backend", &[member("u1", "Alice", true)])
            .await
            .unwrap();
        let team = upsert_team_and_members(&pool, "backend", &[member("u2", "Bob", true)])
            .await
            .unwrap();

        let ids: Vec<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_member_in_place() {
        let pool = setup_test_db().await;

        upsert_team_and_members(&pool, "backend", &[member("u1", "Alice", true)])
            .await
            .unwrap();
        let team = upsert_team_and_members(&pool, "backend", &[member("u1", "Alice B.", false)])
            .await
            .unwrap();

        assert_eq!(team.members, vec![member("u1", "Alice B.", false)]);
    }

    #[tokio::test]
    async fn test_upsert_moves_member_between_teams() {
        let pool = setup_test_db().await;

        upsert_team_and_members(&pool, "backend", &[member("u1", "Alice", true)])
            .await
            .unwrap();
        upsert_team_and_members(&pool, "frontend", &[member("u1", "Alice", true)])
            .await
            .unwrap();

        assert!(get_team(&pool, "backend").await.unwrap().members.is_empty());
        assert_eq!(get_team(&pool, "frontend").await.unwrap().members.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_team() {
        let pool = setup_test_db().await;

        let err = get_team(&pool, "nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!team_exists(&pool, "nope").await.unwrap());
    }
}
