//! Review service: the entry point for every reviewer-assignment operation.
//!
//! The operations themselves are split across sibling modules
//! (`lifecycle`, `deactivation`, `queries`); this module owns the shared
//! state and the team/user management calls.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::AssignmentSettings;
use crate::error::AppError;
use crate::models::{Team, TeamMember, User};
use crate::services::assignment::{select_reviewers, CandidatePool};
use crate::services::store::EntityStore;

/// Reviewer assignment service over an entity store.
///
/// Safe to share between request handlers behind an `Arc`.
pub struct ReviewService<S> {
    pub(crate) store: S,
    pub(crate) settings: AssignmentSettings,
    rng: Mutex<StdRng>,
}

impl<S: EntityStore> ReviewService<S> {
    /// Create a service, seeding the picker from `settings.rng_seed` if set.
    pub fn new(store: S, settings: AssignmentSettings) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(store, settings, rng)
    }

    /// Create a service with an explicit random source.
    pub fn with_rng(store: S, settings: AssignmentSettings, rng: StdRng) -> Self {
        Self {
            store,
            settings,
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Draw up to `count` reviewers from `pool`.
    pub(crate) fn pick_reviewers(&self, pool: CandidatePool, count: usize) -> Vec<User> {
        let candidates = pool.into_users();
        // The guard never crosses an await; a poisoned lock still holds a usable RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        select_reviewers(&candidates, count, &mut *rng)
    }

    /// Create or extend a team. Existing members are updated in place.
    pub async fn add_team(
        &self,
        team_name: &str,
        members: &[TeamMember],
    ) -> Result<Team, AppError> {
        require_non_empty(team_name, "team_name")?;
        for member in members {
            require_non_empty(&member.user_id, "user_id")?;
        }

        self.store
            .upsert_team_and_members(team_name, members)
            .await
            .inspect_err(|e| log::error!("add_team: failed to upsert team {}: {}", team_name, e))
    }

    /// Get a team with all of its members.
    pub async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        self.store.get_team(team_name).await
    }

    /// Toggle a single user's active flag.
    ///
    /// Existing assignments are left alone; an inactive reviewer stays
    /// assigned until reassigned.
    pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let user = self.store.set_user_active(user_id, is_active).await?;
        log::info!("User {} is_active={}", user.user_id, user.is_active);
        Ok(user)
    }
}

/// Reject empty identifiers before they reach storage.
pub(crate) fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(())
}
