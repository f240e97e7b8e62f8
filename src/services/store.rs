//! Entity store abstraction.
//!
//! The review service only talks to storage through `EntityStore`, so the
//! assignment rules can be exercised against any backend. `SqliteStore` is
//! the production implementation over the SQLite pool.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::db::pool::DbPool;
use crate::db::{pull_requests, teams, users};
use crate::error::AppError;
use crate::models::{NewPullRequest, PullRequest, Team, TeamMember, User};

/// Storage contract required by the review service.
///
/// Every method is atomic with respect to its own multi-row effects.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Get a user, or `NotFound`.
    async fn get_user(&self, user_id: &str) -> Result<User, AppError>;

    /// Get a team with all members, or `NotFound`.
    async fn get_team(&self, team_name: &str) -> Result<Team, AppError>;

    /// Create the team if missing and upsert members (additive, idempotent).
    async fn upsert_team_and_members(
        &self,
        team_name: &str,
        members: &[TeamMember],
    ) -> Result<Team, AppError>;

    /// Toggle a user's active flag, or `NotFound`.
    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError>;

    /// Deactivate every active member of a team; returns the flipped IDs.
    async fn deactivate_all_active_in_team(
        &self,
        team_name: &str,
    ) -> Result<BTreeSet<String>, AppError>;

    /// Active members of a team other than `exclude_user_id`.
    async fn list_active_members(
        &self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError>;

    /// Insert a pull request with its reviewers; `Conflict(Exists)` on duplicate ID.
    async fn create_pull_request(&self, new_pr: &NewPullRequest) -> Result<PullRequest, AppError>;

    /// Get a pull request, or `NotFound`.
    async fn get_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError>;

    /// Persist status, merge time and reviewer set of an open pull request,
    /// guarded by its version.
    async fn update_pull_request(&self, pr: &PullRequest) -> Result<PullRequest, AppError>;

    /// Atomically swap one assigned reviewer for another.
    async fn replace_one_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        new_reviewer_id: &str,
    ) -> Result<PullRequest, AppError>;

    /// Open pull requests with any of `reviewer_ids` assigned.
    async fn list_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &BTreeSet<String>,
    ) -> Result<Vec<PullRequest>, AppError>;

    /// Every pull request, any status.
    async fn list_all_pull_requests(&self) -> Result<Vec<PullRequest>, AppError>;
}

/// SQLite-backed entity store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        users::get_user(&self.pool, user_id).await
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        teams::get_team(&self.pool, team_name).await
    }

    async fn upsert_team_and_members(
        &self,
        team_name: &str,
        members: &[TeamMember],
    ) -> Result<Team, AppError> {
        teams::upsert_team_and_members(&self.pool, team_name, members).await
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        users::set_user_active(&self.pool, user_id, is_active).await
    }

    async fn deactivate_all_active_in_team(
        &self,
        team_name: &str,
    ) -> Result<BTreeSet<String>, AppError> {
        users::deactivate_all_active_in_team(&self.pool, team_name).await
    }

    async fn list_active_members(
        &self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError> {
        users::list_active_members(&self.pool, team_name, exclude_user_id).await
    }

    async fn create_pull_request(&self, new_pr: &NewPullRequest) -> Result<PullRequest, AppError> {
        pull_requests::create_pull_request(&self.pool, new_pr).await
    }

    async fn get_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        pull_requests::get_pull_request(&self.pool, pr_id).await
    }

    async fn update_pull_request(&self, pr: &PullRequest) -> Result<PullRequest, AppError> {
        pull_requests::update_pull_request(&self.pool, pr).await
    }

    async fn replace_one_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        new_reviewer_id: &str,
    ) -> Result<PullRequest, AppError> {
        pull_requests::replace_one_reviewer(&self.pool, pr_id, old_reviewer_id, new_reviewer_id)
            .await
    }

    async fn list_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &BTreeSet<String>,
    ) -> Result<Vec<PullRequest>, AppError> {
        pull_requests::list_open_pull_requests_by_reviewers(&self.pool, reviewer_ids).await
    }

    async fn list_all_pull_requests(&self) -> Result<Vec<PullRequest>, AppError> {
        pull_requests::list_all_pull_requests(&self.pool).await
    }
}
