//! Pull request lifecycle: create, merge and reassign.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;

use crate::config::FillPolicy;
use crate::error::{AppError, ConflictKind, ErrorKind};
use crate::models::{NewPullRequest, PullRequest, PullRequestStatus};
use crate::services::assignment::CandidatePool;
use crate::services::review_service::{require_non_empty, ReviewService};
use crate::services::store::EntityStore;

/// A merge that loses a version race to a reassignment is retried once.
const MAX_MERGE_ATTEMPTS: usize = 2;

/// Result of a single-reviewer reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct Reassignment {
    #[serde(rename = "pr")]
    pub pull_request: PullRequest,
    pub replaced_by: String,
}

fn log_storage_failure(operation: &str, id: &str, err: &AppError) {
    if err.kind() == ErrorKind::StorageFailure {
        log::error!("{}: storage failure for {}: {}", operation, id, err);
    }
}

impl<S: EntityStore> ReviewService<S> {
    /// Create a pull request and assign up to `max_reviewers` active
    /// teammates of the author.
    pub async fn create_pull_request(
        &self,
        pr_id: &str,
        title: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        require_non_empty(pr_id, "pull_request_id")?;
        require_non_empty(title, "pull_request_name")?;
        require_non_empty(author_id, "author_id")?;

        let author = self.store.get_user(author_id).await?;
        let team = self.store.get_team(&author.team_name).await?;

        if !team.has_members_besides(author_id) {
            return Err(AppError::conflict(
                ConflictKind::NoCandidate,
                format!("team {} has no members besides the author", team.team_name),
            ));
        }

        let pool = CandidatePool::from_users(team.users()).exclude(author_id);
        let wanted = self.settings.max_reviewers;

        if self.settings.fill_policy == FillPolicy::Strict && pool.len() < wanted {
            return Err(AppError::conflict(
                ConflictKind::NoCandidate,
                format!(
                    "team {} has {} eligible reviewers, {} required",
                    team.team_name,
                    pool.len(),
                    wanted
                ),
            ));
        }

        let reviewers: BTreeSet<String> = self
            .pick_reviewers(pool, wanted)
            .into_iter()
            .map(|u| u.user_id)
            .collect();

        if reviewers.len() < wanted {
            log::warn!(
                "Pull request {} gets {} of {} reviewers",
                pr_id,
                reviewers.len(),
                wanted
            );
        }

        let new_pr = NewPullRequest {
            pull_request_id: pr_id.to_string(),
            pull_request_name: title.to_string(),
            author_id: author_id.to_string(),
            reviewers,
            created_at: Utc::now(),
        };

        let pr = self
            .store
            .create_pull_request(&new_pr)
            .await
            .inspect_err(|e| log_storage_failure("create_pull_request", pr_id, e))?;

        log::info!(
            "Created pull request {} with reviewers {:?}",
            pr.pull_request_id,
            pr.assigned_reviewers
        );
        Ok(pr)
    }

    /// Mark a pull request as merged. Merging twice returns the stored record.
    pub async fn merge_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut pr = self.store.get_pull_request(pr_id).await?;
            if !pr.is_open() {
                return Ok(pr);
            }

            pr.status = PullRequestStatus::Merged;
            pr.merged_at = Some(Utc::now());

            match self.store.update_pull_request(&pr).await {
                Ok(merged) => {
                    log::info!("Merged pull request {}", pr_id);
                    return Ok(merged);
                }
                Err(e)
                    if e.is_conflict(ConflictKind::ConcurrentModification)
                        && attempt < MAX_MERGE_ATTEMPTS =>
                {
                    log::debug!("merge_pull_request: {} changed underneath, re-reading", pr_id);
                }
                Err(e) => {
                    log_storage_failure("merge_pull_request", pr_id, &e);
                    return Err(e);
                }
            }
        }
    }

    /// Replace one assigned reviewer with a random active teammate of that
    /// reviewer.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        let pr = self.store.get_pull_request(pr_id).await?;
        let old_reviewer = self.store.get_user(old_reviewer_id).await?;

        if !pr.is_open() {
            return Err(AppError::conflict(
                ConflictKind::PrMerged,
                format!("cannot reassign on merged pull request {}", pr_id),
            ));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::conflict(
                ConflictKind::NotAssigned,
                format!("{} is not a reviewer of {}", old_reviewer_id, pr_id),
            ));
        }

        let team = self.store.get_team(&old_reviewer.team_name).await?;
        let pool = CandidatePool::from_users(team.users())
            .exclude(old_reviewer_id)
            .exclude(&pr.author_id)
            .exclude_all(&pr.assigned_reviewers);

        let no_candidate = || {
            AppError::conflict(
                ConflictKind::NoCandidate,
                format!(
                    "no active replacement for {} in team {}",
                    old_reviewer_id, team.team_name
                ),
            )
        };
        if pool.is_empty() {
            return Err(no_candidate());
        }

        let replacement = self
            .pick_reviewers(pool, 1)
            .into_iter()
            .next()
            .ok_or_else(no_candidate)?;

        let updated = self
            .store
            .replace_one_reviewer(pr_id, old_reviewer_id, &replacement.user_id)
            .await
            .inspect_err(|e| log_storage_failure("reassign_reviewer", pr_id, e))?;

        log::info!(
            "Reassigned {} on {}: {} -> {}",
            pr_id,
            old_reviewer.team_name,
            old_reviewer_id,
            replacement.user_id
        );
        Ok(Reassignment {
            pull_request: updated,
            replaced_by: replacement.user_id,
        })
    }
}
