//! Assignment statistics.

use serde::Serialize;

/// Number of pull requests a user is assigned to review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAssignmentCount {
    pub user_id: String,
    pub assignments_count: usize,
}

/// Number of reviewers assigned to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReviewerCount {
    pub pull_request_id: String,
    pub reviewers_count: usize,
}

/// Assignment statistics, recomputed on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    pub by_user: Vec<UserAssignmentCount>,
    pub by_pull_request: Vec<PullRequestReviewerCount>,
}
