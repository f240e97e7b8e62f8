//! Data models for the application.
//!
//! These models represent the core entities stored in the local SQLite database
//! and returned over the HTTP API.

pub mod pull_request;
pub mod stats;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{NewPullRequest, PullRequest, PullRequestShort, PullRequestStatus};
pub use stats::{AssignmentStats, PullRequestReviewerCount, UserAssignmentCount};
pub use team::{Team, TeamMember};
pub use user::User;
