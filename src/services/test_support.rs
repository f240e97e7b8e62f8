//! Shared fixtures for service tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};

use crate::config::AssignmentSettings;
use crate::error::AppError;
use crate::models::{NewPullRequest, PullRequest, Team, TeamMember, User};
use crate::services::store::{EntityStore, SqliteStore};
use crate::services::ReviewService;

pub fn member(id: &str, active: bool) -> TeamMember {
    TeamMember {
        user_id: id.to_string(),
        username: id.to_uppercase(),
        is_active: active,
    }
}

pub async fn service_with(settings: AssignmentSettings) -> (ReviewService<SqliteStore>, TempDir) {
    let dir = tempdir().unwrap();
    let pool = crate::db::initialize(&dir.path().join("test.db")).await.unwrap();
    (ReviewService::new(SqliteStore::new(pool), settings), dir)
}

pub async fn seeded_service(seed: u64) -> (ReviewService<SqliteStore>, TempDir) {
    service_with(AssignmentSettings {
        rng_seed: Some(seed),
        ..AssignmentSettings::default()
    })
    .await
}

/// Store that injects storage failures into selected calls.
pub struct FlakyStore {
    inner: SqliteStore,
    fail_update_for: Option<String>,
    fail_listing: bool,
    fail_user_lookup_for: Option<String>,
    fail_member_listing_for: Option<String>,
}

impl FlakyStore {
    fn wrap(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_update_for: None,
            fail_listing: false,
            fail_user_lookup_for: None,
            fail_member_listing_for: None,
        }
    }

    pub fn failing_updates_for(inner: SqliteStore, pr_id: &str) -> Self {
        Self {
            fail_update_for: Some(pr_id.to_string()),
            ..Self::wrap(inner)
        }
    }

    pub fn failing_listing(inner: SqliteStore) -> Self {
        Self {
            fail_listing: true,
            ..Self::wrap(inner)
        }
    }

    /// `get_user` fails for this user id.
    pub fn failing_user_lookup_for(inner: SqliteStore, user_id: &str) -> Self {
        Self {
            fail_user_lookup_for: Some(user_id.to_string()),
            ..Self::wrap(inner)
        }
    }

    /// `list_active_members` fails for this team.
    pub fn failing_member_listing_for(inner: SqliteStore, team_name: &str) -> Self {
        Self {
            fail_member_listing_for: Some(team_name.to_string()),
            ..Self::wrap(inner)
        }
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        if self.fail_user_lookup_for.as_deref() == Some(user_id) {
            return Err(AppError::storage_with_op("disk I/O error", "get_user"));
        }
        self.inner.get_user(user_id).await
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        self.inner.get_team(team_name).await
    }

    async fn upsert_team_and_members(
        &self,
        team_name: &str,
        members: &[TeamMember],
    ) -> Result<Team, AppError> {
        self.inner.upsert_team_and_members(team_name, members).await
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        self.inner.set_user_active(user_id, is_active).await
    }

    async fn deactivate_all_active_in_team(
        &self,
        team_name: &str,
    ) -> Result<BTreeSet<String>, AppError> {
        self.inner.deactivate_all_active_in_team(team_name).await
    }

    async fn list_active_members(
        &self,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError> {
        if self.fail_member_listing_for.as_deref() == Some(team_name) {
            return Err(AppError::storage_with_op("database is locked", "list_active_members"));
        }
        self.inner.list_active_members(team_name, exclude_user_id).await
    }

    async fn create_pull_request(&self, new_pr: &NewPullRequest) -> Result<PullRequest, AppError> {
        self.inner.create_pull_request(new_pr).await
    }

    async fn get_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        self.inner.get_pull_request(pr_id).await
    }

    async fn update_pull_request(&self, pr: &PullRequest) -> Result<PullRequest, AppError> {
        if self.fail_update_for.as_deref() == Some(pr.pull_request_id.as_str()) {
            return Err(AppError::storage_with_op("disk I/O error", "update_pull_request"));
        }
        self.inner.update_pull_request(pr).await
    }

    async fn replace_one_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        new_reviewer_id: &str,
    ) -> Result<PullRequest, AppError> {
        self.inner
            .replace_one_reviewer(pr_id, old_reviewer_id, new_reviewer_id)
            .await
    }

    async fn list_open_pull_requests_by_reviewers(
        &self,
        reviewer_ids: &BTreeSet<String>,
    ) -> Result<Vec<PullRequest>, AppError> {
        if self.fail_listing {
            return Err(AppError::storage("database is locked"));
        }
        self.inner.list_open_pull_requests_by_reviewers(reviewer_ids).await
    }

    async fn list_all_pull_requests(&self) -> Result<Vec<PullRequest>, AppError> {
        self.inner.list_all_pull_requests().await
    }
}
