//! In-memory doubles for the remote store and the generative resolver.

#![allow(dead_code)]

use foodlog_core::resolver::ResolveResult;
use foodlog_core::{
    EntryStatus, FoodRecord, NutritionRequest, NutritionResolver, ParsedMention, PendingEntry,
    RemoteError, RemoteResult, RemoteStore, ResolveError,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub fn pending_entry(id: &str, description: &str) -> PendingEntry {
    PendingEntry {
        id: id.to_string(),
        description: description.to_string(),
        status: EntryStatus::Pending,
    }
}

pub fn catalog_record(name: &str, calories: f64, unit: &str, remote_id: &str) -> FoodRecord {
    let mut record = FoodRecord::new(name, calories, unit);
    record.remote_id = Some(remote_id.to_string());
    record
}

#[derive(Default)]
pub struct RemoteState {
    pub pending: Vec<PendingEntry>,
    pub catalog: Vec<FoodRecord>,
    pub flagged_ids: Vec<String>,
    pub entries_by_food: HashMap<String, Vec<PendingEntry>>,
    /// `(entry_id, linked record names)` per association write.
    pub associations: Vec<(String, Vec<String>)>,
    pub totals: HashMap<String, f64>,
    pub completed_entries: Vec<String>,
    pub elapsed: HashMap<String, f64>,
    pub created_names: Vec<String>,
    pub query_calls: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
    next_id: u32,
}

impl RemoteState {
    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("page-{}", self.next_id)
    }
}

/// Remote store double backed by shared mutable state so tests can inspect
/// writes after handing the store to the agent.
#[derive(Clone)]
pub struct MockRemote {
    pub state: Rc<RefCell<RemoteState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RemoteState::default())),
        }
    }
}

impl RemoteStore for MockRemote {
    fn get_pending_entries(&self) -> RemoteResult<Vec<PendingEntry>> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(RemoteError::read("entry_query", "unreachable"));
        }
        Ok(state.pending.clone())
    }

    fn create_food_item(&self, record: &FoodRecord) -> RemoteResult<Option<String>> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(RemoteError::write("food_create", "unreachable"));
        }
        let exists = state
            .catalog
            .iter()
            .any(|existing| existing.name == record.name && existing.unit == record.unit);
        if exists {
            return Ok(None);
        }
        let remote_id = state.mint_id();
        let mut created = record.clone();
        created.remote_id = Some(remote_id.clone());
        state.catalog.push(created);
        let name = record.name.clone();
        state.created_names.push(name);
        Ok(Some(remote_id))
    }

    fn query_food_item(
        &self,
        name: &str,
        unit: &str,
        calories: f64,
    ) -> RemoteResult<Option<String>> {
        let mut state = self.state.borrow_mut();
        state.query_calls += 1;
        if state.fail_writes {
            // The store double degrades query and create together, matching
            // an unreachable backend.
            return Err(RemoteError::read("food_query", "unreachable"));
        }
        Ok(state
            .catalog
            .iter()
            .find(|record| {
                record.name == name
                    && record.unit == unit
                    && (record.calories - calories).abs() < f64::EPSILON
            })
            .and_then(|record| record.remote_id.clone()))
    }

    fn get_all_food_items(&self) -> RemoteResult<Vec<FoodRecord>> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(RemoteError::read("food_query_all", "unreachable"));
        }
        Ok(state.catalog.clone())
    }

    fn create_associations(&self, entry_id: &str, records: &[FoodRecord]) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(RemoteError::write("entry_assoc", "unreachable"));
        }
        let names = records.iter().map(|record| record.name.clone()).collect();
        state.associations.push((entry_id.to_string(), names));
        Ok(())
    }

    fn update_main_database(
        &self,
        entry_id: &str,
        records: &[FoodRecord],
        quantities: &[f64],
    ) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(RemoteError::write("entry_update", "unreachable"));
        }
        let total: f64 = records
            .iter()
            .zip(quantities.iter())
            .map(|(record, quantity)| record.calories * quantity)
            .sum();
        state.totals.insert(entry_id.to_string(), total);
        state.completed_entries.push(entry_id.to_string());
        Ok(())
    }

    fn update_elapsed_time(&self, entry_id: &str, seconds: f64) -> RemoteResult<()> {
        self.state
            .borrow_mut()
            .elapsed
            .insert(entry_id.to_string(), seconds);
        Ok(())
    }

    fn get_flagged_food_items(&self) -> RemoteResult<Vec<FoodRecord>> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(RemoteError::read("food_query_flagged", "unreachable"));
        }
        Ok(state
            .catalog
            .iter()
            .filter(|record| {
                record
                    .remote_id
                    .as_ref()
                    .is_some_and(|id| state.flagged_ids.contains(id))
            })
            .cloned()
            .collect())
    }

    fn entries_for_food(&self, food_remote_id: &str) -> RemoteResult<Vec<PendingEntry>> {
        Ok(self
            .state
            .borrow()
            .entries_by_food
            .get(food_remote_id)
            .cloned()
            .unwrap_or_default())
    }

    fn clear_flag(&self, food_remote_id: &str) -> RemoteResult<()> {
        self.state
            .borrow_mut()
            .flagged_ids
            .retain(|id| id != food_remote_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct ResolverState {
    /// Canned answers keyed by food name.
    pub answers: HashMap<String, FoodRecord>,
    /// Every batch the agent sent, in call order.
    pub batch_calls: Vec<Vec<NutritionRequest>>,
    pub mention_calls: Vec<String>,
    pub mention_answer: Option<Vec<ParsedMention>>,
    pub fail: Option<ResolveError>,
}

/// Resolver double returning canned records per name.
#[derive(Clone)]
pub struct MockResolver {
    pub state: Rc<RefCell<ResolverState>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ResolverState::default())),
        }
    }

    pub fn answer(&self, record: FoodRecord) {
        let mut state = self.state.borrow_mut();
        let name = record.name.clone();
        state.answers.insert(name, record);
    }
}

impl NutritionResolver for MockResolver {
    fn resolve_batch(&self, requests: &[NutritionRequest]) -> ResolveResult<Vec<FoodRecord>> {
        let mut state = self.state.borrow_mut();
        state.batch_calls.push(requests.to_vec());
        if let Some(err) = &state.fail {
            return Err(err.clone());
        }
        Ok(requests
            .iter()
            .map(|request| {
                state
                    .answers
                    .get(&request.name)
                    .cloned()
                    .unwrap_or_else(|| FoodRecord::new(&request.name, 100.0, &request.unit))
            })
            .collect())
    }

    fn parse_mentions(&self, text: &str) -> ResolveResult<Vec<ParsedMention>> {
        let mut state = self.state.borrow_mut();
        state.mention_calls.push(text.to_string());
        if let Some(err) = &state.fail {
            return Err(err.clone());
        }
        state
            .mention_answer
            .clone()
            .ok_or_else(|| ResolveError::Malformed {
                detail: "no mention fixture".to_string(),
            })
    }
}
