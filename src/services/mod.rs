//! Business logic services.
//!
//! Reviewer assignment rules live here, independent of the HTTP layer. All
//! storage access goes through [`store::EntityStore`].

pub mod assignment;
pub mod deactivation;
pub mod lifecycle;
pub mod queries;
pub mod review_service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use deactivation::TeamDeactivation;
pub use lifecycle::Reassignment;
pub use review_service::ReviewService;
pub use store::{EntityStore, SqliteStore};
