//! Database queries for pull requests and their reviewer links.
//!
//! Reviewer links live in `pull_request_reviewers`; every write that touches
//! more than one row runs in a single transaction. Writes start with a write
//! statement so SQLite takes the write lock up front, and each write bumps the
//! row's `version` so a read-modify-write can detect a lost race.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::db::pool::DbPool;
use crate::error::{AppError, ConflictKind};
use crate::models::{NewPullRequest, PullRequest, PullRequestStatus};

/// Bound parameters per `IN (...)` chunk, well below SQLite's variable limit.
const IN_CHUNK_SIZE: usize = 500;

/// Raw `pull_requests` row without reviewers.
#[derive(Debug, FromRow)]
struct PullRequestRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    version: i64,
}

impl PullRequestRow {
    fn into_model(self, assigned_reviewers: BTreeSet<String>) -> Result<PullRequest, AppError> {
        Ok(PullRequest {
            status: PullRequestStatus::try_from(self.status.as_str())?,
            pull_request_id: self.pull_request_id,
            pull_request_name: self.pull_request_name,
            author_id: self.author_id,
            assigned_reviewers,
            created_at: self.created_at,
            merged_at: self.merged_at,
            version: self.version,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Load reviewer sets for the given rows and assemble full models.
async fn attach_reviewers(
    pool: &DbPool,
    rows: Vec<PullRequestRow>,
) -> Result<Vec<PullRequest>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut reviewers: HashMap<String, BTreeSet<String>> = HashMap::new();

    for chunk in rows.chunks(IN_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT pull_request_id, reviewer_id FROM pull_request_reviewers WHERE pull_request_id IN (",
        );
        let mut separated = qb.separated(", ");
        for row in chunk {
            separated.push_bind(row.pull_request_id.clone());
        }
        separated.push_unseparated(")");

        let links: Vec<(String, String)> = qb.build_query_as().fetch_all(pool).await?;
        for (pr_id, reviewer_id) in links {
            reviewers.entry(pr_id).or_default().insert(reviewer_id);
        }
    }

    rows.into_iter()
        .map(|row| {
            let set = reviewers.remove(&row.pull_request_id).unwrap_or_default();
            row.into_model(set)
        })
        .collect()
}

/// Get a pull request with its reviewers.
pub async fn get_pull_request(pool: &DbPool, pr_id: &str) -> Result<PullRequest, AppError> {
    let row = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at, version
        FROM pull_requests
        WHERE pull_request_id = ?
        "#,
    )
    .bind(pr_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

    let reviewers: Vec<(String,)> = sqlx::query_as(
        "SELECT reviewer_id FROM pull_request_reviewers WHERE pull_request_id = ?",
    )
    .bind(pr_id)
    .fetch_all(pool)
    .await?;

    row.into_model(reviewers.into_iter().map(|(id,)| id).collect())
}

/// Insert a new open pull request and its reviewer links atomically.
pub async fn create_pull_request(
    pool: &DbPool,
    new_pr: &NewPullRequest,
) -> Result<PullRequest, AppError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, status, created_at, version)
        VALUES (?, ?, ?, 'OPEN', ?, 0)
        "#,
    )
    .bind(&new_pr.pull_request_id)
    .bind(&new_pr.pull_request_name)
    .bind(&new_pr.author_id)
    .bind(new_pr.created_at)
    .execute(&mut *tx)
    .await;

    match inserted {
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::conflict(
                ConflictKind::Exists,
                format!("pull request {} already exists", new_pr.pull_request_id),
            ));
        }
        Err(e) if is_foreign_key_violation(&e) => {
            return Err(AppError::not_found_with_id("User", new_pr.author_id.as_str()));
        }
        Err(e) => return Err(AppError::sqlx(e, Some("create_pull_request"))),
        Ok(_) => {}
    }

    for reviewer_id in &new_pr.reviewers {
        sqlx::query("INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id) VALUES (?, ?)")
            .bind(&new_pr.pull_request_id)
            .bind(reviewer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::not_found_with_id("User", reviewer_id.as_str())
                } else {
                    AppError::sqlx(e, Some("create_pull_request"))
                }
            })?;
    }

    tx.commit().await?;

    Ok(PullRequest {
        pull_request_id: new_pr.pull_request_id.clone(),
        pull_request_name: new_pr.pull_request_name.clone(),
        author_id: new_pr.author_id.clone(),
        assigned_reviewers: new_pr.reviewers.clone(),
        status: PullRequestStatus::Open,
        created_at: new_pr.created_at,
        merged_at: None,
        version: 0,
    })
}

/// Write the status, merge time and reviewer set of an open pull request.
///
/// The write only applies if the stored row is still open and still at
/// `pr.version`; otherwise nothing changes and the call fails with
/// `ConcurrentModification` (or `NotFound` if the row is gone).
pub async fn update_pull_request(pool: &DbPool, pr: &PullRequest) -> Result<PullRequest, AppError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE pull_requests
        SET status = ?, merged_at = ?, version = version + 1
        WHERE pull_request_id = ? AND version = ? AND status = 'OPEN'
        "#,
    )
    .bind(pr.status.as_str())
    .bind(pr.merged_at)
    .bind(&pr.pull_request_id)
    .bind(pr.version)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT status FROM pull_requests WHERE pull_request_id = ?")
                .bind(&pr.pull_request_id)
                .fetch_optional(&mut *tx)
                .await?;

        return Err(match exists {
            None => AppError::not_found_with_id("PullRequest", pr.pull_request_id.as_str()),
            Some(_) => AppError::conflict(
                ConflictKind::ConcurrentModification,
                format!("pull request {} changed since it was read", pr.pull_request_id),
            ),
        });
    }

    sqlx::query("DELETE FROM pull_request_reviewers WHERE pull_request_id = ?")
        .bind(&pr.pull_request_id)
        .execute(&mut *tx)
        .await?;

    for reviewer_id in &pr.assigned_reviewers {
        sqlx::query("INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id) VALUES (?, ?)")
            .bind(&pr.pull_request_id)
            .bind(reviewer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::not_found_with_id("User", reviewer_id.as_str())
                } else {
                    AppError::sqlx(e, Some("update_pull_request"))
                }
            })?;
    }

    tx.commit().await?;

    get_pull_request(pool, &pr.pull_request_id).await
}

/// Swap one reviewer for another on an open pull request.
///
/// Either both the removal and the insertion are committed or neither is.
pub async fn replace_one_reviewer(
    pool: &DbPool,
    pr_id: &str,
    old_reviewer_id: &str,
    new_reviewer_id: &str,
) -> Result<PullRequest, AppError> {
    let mut tx = pool.begin().await?;

    let bumped = sqlx::query(
        "UPDATE pull_requests SET version = version + 1 WHERE pull_request_id = ? AND status = 'OPEN'",
    )
    .bind(pr_id)
    .execute(&mut *tx)
    .await?;

    if bumped.rows_affected() == 0 {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT status FROM pull_requests WHERE pull_request_id = ?")
                .bind(pr_id)
                .fetch_optional(&mut *tx)
                .await?;

        return Err(match exists {
            None => AppError::not_found_with_id("PullRequest", pr_id),
            Some(_) => AppError::conflict(
                ConflictKind::PrMerged,
                format!("cannot reassign on merged pull request {}", pr_id),
            ),
        });
    }

    let removed = sqlx::query(
        "DELETE FROM pull_request_reviewers WHERE pull_request_id = ? AND reviewer_id = ?",
    )
    .bind(pr_id)
    .bind(old_reviewer_id)
    .execute(&mut *tx)
    .await?;

    if removed.rows_affected() == 0 {
        return Err(AppError::conflict(
            ConflictKind::NotAssigned,
            format!("{} is not assigned to pull request {}", old_reviewer_id, pr_id),
        ));
    }

    sqlx::query("INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id) VALUES (?, ?)")
        .bind(pr_id)
        .bind(new_reviewer_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(
                    ConflictKind::ConcurrentModification,
                    format!("{} is already assigned to pull request {}", new_reviewer_id, pr_id),
                )
            } else if is_foreign_key_violation(&e) {
                AppError::not_found_with_id("User", new_reviewer_id)
            } else {
                AppError::sqlx(e, Some("replace_one_reviewer"))
            }
        })?;

    tx.commit().await?;

    get_pull_request(pool, pr_id).await
}

/// List open pull requests that have any of `reviewer_ids` assigned.
pub async fn list_open_pull_requests_by_reviewers(
    pool: &DbPool,
    reviewer_ids: &BTreeSet<String>,
) -> Result<Vec<PullRequest>, AppError> {
    if reviewer_ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<&String> = reviewer_ids.iter().collect();
    let mut rows: Vec<PullRequestRow> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for chunk in ids.chunks(IN_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.status,
                   pr.created_at, pr.merged_at, pr.version
            FROM pull_requests pr
            WHERE pr.status = 'OPEN'
              AND EXISTS (
                  SELECT 1 FROM pull_request_reviewers prr
                  WHERE prr.pull_request_id = pr.pull_request_id
                    AND prr.reviewer_id IN ("#,
        );
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind((*id).clone());
        }
        separated.push_unseparated(")) ORDER BY pr.created_at, pr.pull_request_id");

        let chunk_rows: Vec<PullRequestRow> = qb.build_query_as().fetch_all(pool).await?;
        for row in chunk_rows {
            if seen.insert(row.pull_request_id.clone()) {
                rows.push(row);
            }
        }
    }

    attach_reviewers(pool, rows).await
}

/// List every pull request with its reviewers.
pub async fn list_all_pull_requests(pool: &DbPool) -> Result<Vec<PullRequest>, AppError> {
    let rows = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at, version
        FROM pull_requests
        ORDER BY created_at, pull_request_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    attach_reviewers(pool, rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::teams::upsert_team_and_members;
    use crate::error::ErrorKind;
    use crate::models::TeamMember;
    use tempfile::tempdir;

    async fn setup_test_db() -> DbPool {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);

        let pool = crate::db::initialize(&db_path).await.unwrap();

        let members: Vec<TeamMember> = ["u1", "u2", "u3", "u4"]
            .iter()
            .map(|id| TeamMember {
                user_id: id.to_string(),
                username: id.to_uppercase(),
                is_active: true,
            })
            .collect();
        upsert_team_and_members(&pool, "backend", &members).await.unwrap();

        pool
    }

    fn reviewers(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn new_pr(id: &str, author: &str, assigned: &[&str]) -> NewPullRequest {
        NewPullRequest {
            pull_request_id: id.to_string(),
            pull_request_name: format!("Title of {id}"),
            author_id: author.to_string(),
            reviewers: reviewers(assigned),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = setup_test_db().await;

        let created = create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2", "u3"]))
            .await
            .unwrap();
        let fetched = get_pull_request(&pool, "pr-1").await.unwrap();

        assert_eq!(fetched.assigned_reviewers, created.assigned_reviewers);
        assert_eq!(fetched.status, PullRequestStatus::Open);
        assert!(fetched.merged_at.is_none());
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let pool = setup_test_db().await;

        create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2"])).await.unwrap();
        let err = create_pull_request(&pool, &new_pr("pr-1", "u2", &["u3"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict(ConflictKind::Exists));
        // Original reviewers untouched
        let pr = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(pr.assigned_reviewers, reviewers(&["u2"]));
    }

    #[tokio::test]
    async fn test_create_with_unknown_reviewer_rolls_back() {
        let pool = setup_test_db().await;

        let err = create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2", "ghost"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = get_pull_request(&pool, "pr-1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_changes_nothing() {
        let pool = setup_test_db().await;

        let mut pr = create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2"]))
            .await
            .unwrap();
        replace_one_reviewer(&pool, "pr-1", "u2", "u3").await.unwrap();

        pr.assigned_reviewers = reviewers(&["u4"]);
        let err = update_pull_request(&pool, &pr).await.unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Conflict(ConflictKind::ConcurrentModification)
        );

        let stored = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(stored.assigned_reviewers, reviewers(&["u3"]));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_update_merged_pull_request_is_rejected() {
        let pool = setup_test_db().await;

        let mut pr = create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2"]))
            .await
            .unwrap();
        pr.status = PullRequestStatus::Merged;
        pr.merged_at = Some(Utc::now());
        let mut merged = update_pull_request(&pool, &pr).await.unwrap();
        assert_eq!(merged.status, PullRequestStatus::Merged);

        merged.assigned_reviewers = reviewers(&["u3"]);
        let err = update_pull_request(&pool, &merged).await.unwrap_err();
        assert!(err.is_conflict(ConflictKind::ConcurrentModification));
        assert_eq!(
            get_pull_request(&pool, "pr-1").await.unwrap().assigned_reviewers,
            reviewers(&["u2"])
        );
    }

    #[tokio::test]
    async fn test_replace_one_reviewer_not_assigned_rolls_back() {
        let pool = setup_test_db().await;

        create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2"])).await.unwrap();

        let err = replace_one_reviewer(&pool, "pr-1", "u3", "u4").await.unwrap_err();
        assert!(err.is_conflict(ConflictKind::NotAssigned));

        let pr = get_pull_request(&pool, "pr-1").await.unwrap();
        assert_eq!(pr.assigned_reviewers, reviewers(&["u2"]));
        assert_eq!(pr.version, 0, "version bump must be rolled back");
    }

    #[tokio::test]
    async fn test_replace_one_reviewer_on_missing_pull_request() {
        let pool = setup_test_db().await;

        let err = replace_one_reviewer(&pool, "nope", "u2", "u3").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_open_by_reviewers() {
        let pool = setup_test_db().await;

        create_pull_request(&pool, &new_pr("pr-1", "u1", &["u2", "u3"])).await.unwrap();
        create_pull_request(&pool, &new_pr("pr-2", "u1", &["u4"])).await.unwrap();
        let mut merged = create_pull_request(&pool, &new_pr("pr-3", "u4", &["u2"]))
            .await
            .unwrap();
        merged.status = PullRequestStatus::Merged;
        merged.merged_at = Some(Utc::now());
        update_pull_request(&pool, &merged).await.unwrap();

        let open = list_open_pull_requests_by_reviewers(&pool, &reviewers(&["u2", "u3"]))
            .await
            .unwrap();
        let ids: Vec<&str> = open.iter().map(|p| p.pull_request_id.as_str()).collect();
        assert_eq!(ids, vec!["pr-1"]);
        assert_eq!(open[0].assigned_reviewers, reviewers(&["u2", "u3"]));

        let all = list_all_pull_requests(&pool).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let row = PullRequestRow {
            pull_request_id: "pr-1".to_string(),
            pull_request_name: "Fix".to_string(),
            author_id: "u1".to_string(),
            status: "CLOSED".to_string(),
            created_at: Utc::now(),
            merged_at: None,
            version: 0,
        };

        let err = row.into_model(reviewers(&["u2"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
