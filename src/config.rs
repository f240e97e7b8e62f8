//! Service configuration loaded from environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;
use crate::error::AppError;

/// Default number of reviewers assigned to a new pull request.
pub const DEFAULT_MAX_REVIEWERS: usize = 2;

/// How pull request creation treats a team with fewer eligible reviewers
/// than `max_reviewers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Assign whoever is available, possibly nobody.
    #[default]
    BestEffort,
    /// Refuse to create the pull request unless every slot can be filled.
    Strict,
}

impl std::str::FromStr for FillPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => Err(AppError::invalid_input_field(
                format!("unknown fill policy '{}'", other),
                "PR_FILL_POLICY",
            )),
        }
    }
}

/// Reviewer assignment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSettings {
    /// Reviewers assigned on creation.
    pub max_reviewers: usize,

    pub fill_policy: FillPolicy,

    /// Fixed seed for the reviewer picker; random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        Self {
            max_reviewers: DEFAULT_MAX_REVIEWERS,
            fill_policy: FillPolicy::BestEffort,
            rng_seed: None,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// `tracing-subscriber` filter directive, e.g. `info` or `review_assigner_lib=debug`.
    pub log_filter: String,

    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    pub database_max_connections: u32,

    pub assignment: AssignmentSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            log_filter: "info".to_string(),
            database_path: PathBuf::from("data/review-assigner.db"),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            assignment: AssignmentSettings::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse::<T>().map_err(|_| {
        AppError::invalid_input_field(format!("{} has an invalid value '{}'", name, raw), name)
    })
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset or blank keys
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(raw) = get("APP_PORT") {
            config.port = parse_var("APP_PORT", &raw)?;
        }
        if let Some(raw) = get("APP_LOG_LEVEL") {
            config.log_filter = raw.trim().to_string();
        }
        if let Some(raw) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(raw.trim());
        }
        if let Some(raw) = get("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = get("PR_MAX_REVIEWERS") {
            let max: usize = parse_var("PR_MAX_REVIEWERS", &raw)?;
            if max == 0 {
                return Err(AppError::invalid_input_field(
                    "PR_MAX_REVIEWERS must be at least 1",
                    "PR_MAX_REVIEWERS",
                ));
            }
            config.assignment.max_reviewers = max;
        }
        if let Some(raw) = get("PR_FILL_POLICY") {
            config.assignment.fill_policy = raw.parse()?;
        }
        if let Some(raw) = get("PR_RNG_SEED") {
            config.assignment.rng_seed = Some(parse_var("PR_RNG_SEED", &raw)?);
        }

        Ok(config)
    }
}
