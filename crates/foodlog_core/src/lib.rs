//! Core domain logic for the foodlog agent.
//! This crate is the single source of truth for resolution invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod parse;
pub mod remote;
pub mod repo;
pub mod resolver;
pub mod service;
pub mod similarity;

pub use config::{Config, ConfigError, RemoteSettings, ResolverSettings};
pub use logging::{default_log_level, init_logging};
pub use model::food::{EntryStatus, FoodRecord, ParsedMention, PendingEntry};
pub use parse::{parse_meal, ParseError};
pub use remote::{NotionStore, RemoteError, RemoteResult, RemoteStore};
pub use repo::food_repo::{FoodRepository, RepoError, RepoResult, SqliteFoodRepository};
pub use resolver::{LlmResolver, NutritionRequest, NutritionResolver, ResolveError};
pub use service::food_agent::{AgentError, CycleReport, FoodAgent, ResolvedMeal, SyncReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
