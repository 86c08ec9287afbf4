//! Generative nutrition resolver boundary.
//!
//! # Responsibility
//! - Define the fallback contract for `(name, unit)` pairs neither store
//!   knows about.
//!
//! # Invariants
//! - `resolve_batch` output has the same length and order as its input.
//! - A resolver failure is terminal for the current resolution call; retry
//!   belongs to the outer polling loop as a whole-cycle retry.

use crate::model::food::{FoodRecord, ParsedMention};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod llm;

pub use llm::LlmResolver;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// One unresolved `(name, unit)` pair sent to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutritionRequest {
    pub name: String,
    pub unit: String,
}

impl NutritionRequest {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// Resolver failure: transport, upstream rejection, or unusable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    Http {
        detail: String,
    },
    Api {
        status: u16,
        detail: String,
    },
    /// Upstream answered but the payload does not satisfy the contract.
    Malformed {
        detail: String,
    },
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { detail } => write!(f, "resolver transport failed: {detail}"),
            Self::Api { status, detail } => {
                write!(f, "resolver API returned status {status}: {detail}")
            }
            Self::Malformed { detail } => write!(f, "resolver response is unusable: {detail}"),
        }
    }
}

impl Error for ResolveError {}

/// Generative fallback estimating nutrition facts.
pub trait NutritionResolver {
    /// Returns one best-effort record per request, in request order, with
    /// `remote_id` unset.
    fn resolve_batch(&self, requests: &[NutritionRequest]) -> ResolveResult<Vec<FoodRecord>>;

    /// Extracts `(name, quantity, unit)` mentions from a whole description.
    ///
    /// Used when local numeral/unit parsing fails on the text.
    fn parse_mentions(&self, text: &str) -> ResolveResult<Vec<ParsedMention>>;
}
