//! Reviewer assignment policy.
//!
//! Pure selection logic with no storage access. The random source is passed
//! in so callers can seed it for reproducible assignments.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::User;

/// Users eligible for an assignment decision.
///
/// Keyed by user ID, so each user appears at most once. Only active users
/// are admitted; exclusions (author, already-assigned reviewers, the reviewer
/// being replaced) are applied by the caller through [`CandidatePool::exclude`].
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: BTreeMap<String, User>,
}

impl CandidatePool {
    /// Build a pool from users, dropping inactive ones and duplicate IDs.
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let candidates = users
            .into_iter()
            .filter(|u| u.is_active)
            .map(|u| (u.user_id.clone(), u))
            .collect();
        Self { candidates }
    }

    /// Remove a single user from the pool.
    pub fn exclude(mut self, user_id: &str) -> Self {
        self.candidates.remove(user_id);
        self
    }

    /// Remove every listed user from the pool.
    pub fn exclude_all<'a>(mut self, user_ids: impl IntoIterator<Item = &'a String>) -> Self {
        for id in user_ids {
            self.candidates.remove(id);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates ordered by user ID.
    pub fn into_users(self) -> Vec<User> {
        self.candidates.into_values().collect()
    }
}

/// Pick up to `count` distinct reviewers uniformly at random.
///
/// Returns every candidate when there are fewer than `count`; callers decide
/// whether an under-filled result is acceptable.
pub fn select_reviewers<R: Rng + ?Sized>(
    candidates: &[User],
    count: usize,
    rng: &mut R,
) -> Vec<User> {
    candidates.choose_multiple(rng, count).cloned().collect()
}
