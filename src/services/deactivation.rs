//! Bulk team deactivation with reviewer replacement.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{AppError, ConflictKind};
use crate::models::PullRequest;
use crate::services::assignment::CandidatePool;
use crate::services::review_service::ReviewService;
use crate::services::store::EntityStore;

/// Outcome of deactivating a team.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamDeactivation {
    pub team_name: String,
    pub deactivated_user_ids: BTreeSet<String>,
    /// Pull requests whose reviewer set changed, in processing order.
    pub updated_pull_requests: Vec<PullRequest>,
    pub reassigned_count: usize,
    /// Pull requests left untouched because their replacement failed.
    pub failed_count: usize,
}

impl<S: EntityStore> ReviewService<S> {
    /// Deactivate every active member of a team and replace them on open
    /// pull requests.
    ///
    /// The deactivation itself is all-or-nothing. Replacement runs per pull
    /// request: one failure is counted and logged, the rest proceed.
    pub async fn deactivate_team(&self, team_name: &str) -> Result<TeamDeactivation, AppError> {
        let deactivated = self
            .store
            .deactivate_all_active_in_team(team_name)
            .await
            .inspect_err(|e| {
                log::error!("deactivate_team: failed to deactivate {}: {}", team_name, e)
            })?;

        let mut outcome = TeamDeactivation {
            team_name: team_name.to_string(),
            deactivated_user_ids: deactivated,
            ..TeamDeactivation::default()
        };

        if outcome.deactivated_user_ids.is_empty() {
            log::info!("Team {} has no active members to deactivate", team_name);
            return Ok(outcome);
        }

        let impacted = self
            .store
            .list_open_pull_requests_by_reviewers(&outcome.deactivated_user_ids)
            .await
            .inspect_err(|e| {
                log::error!(
                    "deactivate_team: failed to list impacted pull requests for {}: {}",
                    team_name,
                    e
                )
            })?;

        for pr in impacted {
            let pr_id = pr.pull_request_id.clone();
            match self.replace_deactivated_reviewers(pr, &outcome.deactivated_user_ids).await {
                Ok(Some(updated)) => {
                    outcome.reassigned_count += 1;
                    outcome.updated_pull_requests.push(updated);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("deactivate_team: skipping pull request {}: {}", pr_id, e);
                    outcome.failed_count += 1;
                }
            }
        }

        log::info!(
            "Deactivated {} users in team {}: {} pull requests updated, {} failed",
            outcome.deactivated_user_ids.len(),
            team_name,
            outcome.reassigned_count,
            outcome.failed_count
        );
        Ok(outcome)
    }

    /// Swap every deactivated reviewer of `pr` for an active teammate of the
    /// author. Returns `None` when nothing needed replacing.
    async fn replace_deactivated_reviewers(
        &self,
        mut pr: PullRequest,
        deactivated: &BTreeSet<String>,
    ) -> Result<Option<PullRequest>, AppError> {
        let (to_replace, kept): (BTreeSet<String>, BTreeSet<String>) = pr
            .assigned_reviewers
            .iter()
            .cloned()
            .partition(|id| deactivated.contains(id));

        if to_replace.is_empty() {
            return Ok(None);
        }

        let author = self.store.get_user(&pr.author_id).await?;
        let members = self
            .store
            .list_active_members(&author.team_name, &pr.author_id)
            .await?;

        let pool = CandidatePool::from_users(members)
            .exclude(&pr.author_id)
            .exclude_all(&pr.assigned_reviewers);
        let replacements = self.pick_reviewers(pool, to_replace.len());

        if replacements.len() < to_replace.len() {
            return Err(AppError::conflict(
                ConflictKind::NoCandidate,
                format!(
                    "{} needs {} replacements, {} available",
                    pr.pull_request_id,
                    to_replace.len(),
                    replacements.len()
                ),
            ));
        }

        pr.assigned_reviewers = kept
            .into_iter()
            .chain(replacements.into_iter().map(|u| u.user_id))
            .collect();

        let updated = self.store.update_pull_request(&pr).await?;
        Ok(Some(updated))
    }
}
