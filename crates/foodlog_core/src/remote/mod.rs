//! Remote store boundary.
//!
//! # Responsibility
//! - Define the contract the orchestrator consumes for the authoritative
//!   nutrition catalog and its pending work entries.
//! - Keep transport and payload details inside the adapter implementation.
//!
//! # Invariants
//! - Read failures and write failures are distinct error kinds: a read
//!   failure aborts the cycle, a write failure is logged and survived.

use crate::model::food::{FoodRecord, PendingEntry};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod schema;
pub mod notion;

pub use notion::NotionStore;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote store transport/contract error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Fetch of entries or catalog failed; there is nothing to act on.
    Read {
        operation: &'static str,
        detail: String,
    },
    /// Create/update against the store failed; resolution continues with a
    /// locally-only record.
    Write {
        operation: &'static str,
        detail: String,
    },
}

impl RemoteError {
    pub fn read(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Read {
            operation,
            detail: detail.into(),
        }
    }

    pub fn write(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Write {
            operation,
            detail: detail.into(),
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { operation, detail } => {
                write!(f, "remote read `{operation}` failed: {detail}")
            }
            Self::Write { operation, detail } => {
                write!(f, "remote write `{operation}` failed: {detail}")
            }
        }
    }
}

impl Error for RemoteError {}

/// Contract for the authoritative remote catalog.
///
/// All calls are blocking; timeouts belong to the implementation.
pub trait RemoteStore {
    /// Entries whose status is not completed.
    fn get_pending_entries(&self) -> RemoteResult<Vec<PendingEntry>>;

    /// Creates a catalog item and returns its remote id, or `None` when the
    /// store reports the item already exists.
    fn create_food_item(&self, record: &FoodRecord) -> RemoteResult<Option<String>>;

    /// Looks up an existing catalog item by the store's uniqueness rule
    /// `(name, unit, calories)` and returns its remote id.
    fn query_food_item(&self, name: &str, unit: &str, calories: f64)
        -> RemoteResult<Option<String>>;

    /// Full catalog with remote ids populated.
    fn get_all_food_items(&self) -> RemoteResult<Vec<FoodRecord>>;

    /// Links resolved records to a pending entry, creating any
    /// still-unpersisted record first.
    fn create_associations(&self, entry_id: &str, records: &[FoodRecord]) -> RemoteResult<()>;

    /// Writes the computed total `Σ calories[i] * quantities[i]` and marks
    /// the entry completed; on failure attempts to mark the entry errored.
    fn update_main_database(
        &self,
        entry_id: &str,
        records: &[FoodRecord],
        quantities: &[f64],
    ) -> RemoteResult<()>;

    /// Diagnostic timing write; optional for correctness.
    fn update_elapsed_time(&self, entry_id: &str, seconds: f64) -> RemoteResult<()>;

    /// Catalog items whose remote status requests a re-check.
    fn get_flagged_food_items(&self) -> RemoteResult<Vec<FoodRecord>>;

    /// Entries associated with a catalog item, with descriptions, so the
    /// orchestrator can re-resolve them.
    fn entries_for_food(&self, food_remote_id: &str) -> RemoteResult<Vec<PendingEntry>>;

    /// Flips a re-check flag back to normal.
    fn clear_flag(&self, food_remote_id: &str) -> RemoteResult<()>;
}
