//! Read-only views over pull requests.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::{AssignmentStats, PullRequest, PullRequestReviewerCount, UserAssignmentCount};
use crate::services::review_service::ReviewService;
use crate::services::store::EntityStore;

impl<S: EntityStore> ReviewService<S> {
    /// Every pull request, open or merged, with `user_id` assigned.
    ///
    /// An unknown user simply has no reviews.
    pub async fn reviews_for_user(&self, user_id: &str) -> Result<Vec<PullRequest>, AppError> {
        let all = self.store.list_all_pull_requests().await?;
        Ok(all
            .into_iter()
            .filter(|pr| pr.has_reviewer(user_id))
            .collect())
    }

    /// Assignment counts per reviewer and per pull request, sorted by ID.
    pub async fn assignment_stats(&self) -> Result<AssignmentStats, AppError> {
        let all = self.store.list_all_pull_requests().await?;

        let mut by_user: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_pull_request = Vec::with_capacity(all.len());

        for pr in &all {
            for reviewer in &pr.assigned_reviewers {
                *by_user.entry(reviewer.clone()).or_default() += 1;
            }
            by_pull_request.push(PullRequestReviewerCount {
                pull_request_id: pr.pull_request_id.clone(),
                reviewers_count: pr.assigned_reviewers.len(),
            });
        }
        by_pull_request.sort_by(|a, b| a.pull_request_id.cmp(&b.pull_request_id));

        Ok(AssignmentStats {
            by_user: by_user
                .into_iter()
                .map(|(user_id, assignments_count)| UserAssignmentCount {
                    user_id,
                    assignments_count,
                })
                .collect(),
            by_pull_request,
        })
    }
}
