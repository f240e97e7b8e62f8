//! Pull request model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Status of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl TryFrom<&str> for PullRequestStatus {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(AppError::internal(format!(
                "unknown pull request status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request and its assigned reviewers.
///
/// `assigned_reviewers` is a set: reviewer ids are unique within a pull
/// request and never include `author_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,

    /// Pull request title.
    pub pull_request_name: String,

    pub author_id: String,

    pub assigned_reviewers: BTreeSet<String>,

    pub status: PullRequestStatus,

    pub created_at: DateTime<Utc>,

    /// Set exactly once, at the `Open -> Merged` transition.
    pub merged_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency counter, bumped on every write.
    #[serde(skip_serializing, default)]
    pub version: i64,
}

impl PullRequest {
    /// Check if the pull request is still open.
    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    /// Check if `user_id` is currently assigned as a reviewer.
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.contains(user_id)
    }
}

/// Input for inserting a new pull request.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub reviewers: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Compact pull request view used in review listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

impl From<PullRequest> for PullRequestShort {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.pull_request_id,
            pull_request_name: pr.pull_request_name,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}
