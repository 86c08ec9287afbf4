//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the food cache.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - `(name, unit)` collisions on insert are reported, never raised.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod food_repo;
