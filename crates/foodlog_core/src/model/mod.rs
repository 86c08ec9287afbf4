//! Domain model for nutrition resolution.
//!
//! # Responsibility
//! - Define the canonical records shared by cache, remote store and resolver.
//! - Keep one record shape for every resolution path.
//!
//! # Invariants
//! - `(name, unit)` is the natural key of a `FoodRecord` in the local cache.
//! - `remote_id`, when present, is unique across the cache.

pub mod food;
