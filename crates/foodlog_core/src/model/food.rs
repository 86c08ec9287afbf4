//! Food record and pending entry models.
//!
//! # Responsibility
//! - Define the canonical nutrition record shared by cache and remote store.
//! - Define the ephemeral parsed-mention triple produced by the parser.
//!
//! # Invariants
//! - `grams_equivalent` is exactly `1` when `unit == "克"`.
//! - `remote_id = None` means "not yet persisted remotely".

use serde::{Deserialize, Serialize};

/// Baseline unit. Calories for gram-denominated records are per gram.
pub const GRAM_UNIT: &str = "克";

/// Generic count unit used when nothing better is known.
pub const DEFAULT_UNIT: &str = "个";

/// Canonical nutrition record.
///
/// Created either by cache population from the remote store or by the
/// generative fallback the first time a `(name, unit)` pair is unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    /// Human-readable food label. Source text may be any script.
    pub name: String,
    /// Kilocalories per one `unit`.
    pub calories: f64,
    /// Unit label from a small conventional vocabulary.
    pub unit: String,
    /// Protein in grams per unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    /// Fat in grams per unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    /// Carbohydrates in grams per unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    /// Mass in grams represented by one `unit`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams: Option<f64>,
    /// Opaque identifier correlating this record with its remote counterpart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl FoodRecord {
    /// Creates a record with no macro-nutrient detail and no remote identity.
    ///
    /// # Invariants
    /// - `grams` is normalized to `Some(1.0)` for gram-denominated records.
    pub fn new(name: impl Into<String>, calories: f64, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        let grams = if unit == GRAM_UNIT { Some(1.0) } else { None };
        Self {
            name: name.into(),
            calories,
            unit,
            protein: None,
            fat: None,
            carbs: None,
            grams,
            remote_id: None,
        }
    }

    /// Returns whether this record has been persisted to the remote store.
    pub fn is_remote(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// One food reference recognized within a free-text description.
///
/// Produced by the parser, consumed immediately by the orchestrator, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMention {
    /// Food name with quantity and unit tokens stripped.
    pub name: String,
    /// Quantity in `unit`s. `半` parses to `0.5`.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Unit token. Defaults to `个` on the fallback extraction path.
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_quantity() -> f64 {
    1.0
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

impl ParsedMention {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// Lifecycle status of a remote pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Not yet resolved, or resolution was interrupted.
    Pending,
    /// Resolved and totals written back.
    Completed,
    /// Last write-back attempt failed.
    Errored,
}

/// Unit of work owned by the remote store.
///
/// The core reads its text and id and writes back status and derived totals;
/// it never owns this entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Opaque remote page id.
    pub id: String,
    /// Free-text meal description to resolve.
    pub description: String,
    pub status: EntryStatus,
}

#[cfg(test)]
mod tests {
    use super::{FoodRecord, ParsedMention, GRAM_UNIT};

    #[test]
    fn gram_records_normalize_grams_to_one() {
        let record = FoodRecord::new("鸡肉", 2.39, GRAM_UNIT);
        assert_eq!(record.grams, Some(1.0));
        assert!(!record.is_remote());
    }

    #[test]
    fn non_gram_records_leave_grams_unset() {
        let record = FoodRecord::new("巨无霸", 550.0, "个");
        assert_eq!(record.grams, None);
    }

    #[test]
    fn mention_deserialization_defaults_quantity_and_unit() {
        let mention: ParsedMention = serde_json::from_str(r#"{"name": "沙拉"}"#)
            .expect("mention with defaults should deserialize");
        assert_eq!(mention, ParsedMention::new("沙拉", 1.0, "个"));
    }

    #[test]
    fn record_serialization_skips_absent_fields() {
        let json = serde_json::to_value(FoodRecord::new("米饭", 130.0, "碗"))
            .expect("record should serialize");
        assert!(json.get("protein").is_none());
        assert!(json.get("remote_id").is_none());
    }
}
