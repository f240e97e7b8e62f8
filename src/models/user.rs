//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user that can author pull requests and review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub user_id: String,

    /// Display name.
    pub username: String,

    /// Team the user belongs to.
    pub team_name: String,

    /// Only active users are picked as reviewers.
    pub is_active: bool,
}
