//! Service layer orchestrating parsing, cache lookup, remote nutrition
//! resolution, and record write-back.
//!
//! # Responsibility
//! - Own the pipeline from free-text meal description to nutrition records.
//! - Keep the local cache and the remote food table in agreement.
//!
//! # Invariants
//! - Services depend on repository, remote-store, and resolver traits, never
//!   on concrete transports.

pub mod food_agent;

pub use food_agent::{AgentError, AgentResult, CycleReport, FoodAgent, ResolvedMeal, SyncReport};
