//! Team model.

use serde::{Deserialize, Serialize};

use super::User;

/// Member payload for a team upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// A team with its members, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Check whether the team has any member other than `user_id`.
    pub fn has_members_besides(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id != user_id)
    }

    /// Members as full user records.
    pub fn users(&self) -> impl Iterator<Item = User> + '_ {
        self.members.iter().map(|m| User {
            user_id: m.user_id.clone(),
            username: m.username.clone(),
            team_name: self.team_name.clone(),
            is_active: m.is_active,
        })
    }
}
