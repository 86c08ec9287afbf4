//! Meal resolution orchestrator.
//!
//! # Responsibility
//! - Turn a free-text meal description into nutrition records via the
//!   two-tier lookup: local cache first, generative resolver for misses.
//! - Drive the polling cycle: flagged re-checks, cache sync, pending entry
//!   resolution and write-back.
//!
//! # Invariants
//! - The resolver is called at most once per description, with every cache
//!   miss of that description batched into the single call.
//! - Output records preserve mention order regardless of which tier
//!   resolved each mention.
//! - A remote write failure never aborts a cycle; a remote read failure
//!   does.

use crate::model::food::{FoodRecord, ParsedMention, DEFAULT_UNIT};
use crate::parse::parse_meal;
use crate::remote::{RemoteError, RemoteStore};
use crate::repo::food_repo::{FoodRepository, RepoError};
use crate::resolver::{NutritionRequest, NutritionResolver, ResolveError};
use crate::similarity::{find_similar, DEFAULT_THRESHOLD};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type AgentResult<T> = Result<T, AgentError>;

/// Orchestrator error aggregating the failure modes of the layers below.
#[derive(Debug)]
pub enum AgentError {
    Repo(RepoError),
    Remote(RemoteError),
    Resolve(ResolveError),
    /// The resolver returned a record count that does not match the batch.
    ResolverContract { expected: usize, actual: usize },
}

impl Display for AgentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::ResolverContract { expected, actual } => write!(
                f,
                "resolver returned {actual} records for a batch of {expected}"
            ),
        }
    }
}

impl Error for AgentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::Resolve(err) => Some(err),
            Self::ResolverContract { .. } => None,
        }
    }
}

impl From<RepoError> for AgentError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RemoteError> for AgentError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<ResolveError> for AgentError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

/// Result of resolving one meal description.
///
/// `mentions` and `records` are parallel: `records[i]` is the resolution of
/// `mentions[i]`, or `None` when no record could be obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeal {
    pub mentions: Vec<ParsedMention>,
    pub records: Vec<Option<FoodRecord>>,
}

impl ResolvedMeal {
    /// Resolved `(record, quantity)` pairs in mention order, skipping
    /// unresolved mentions.
    pub fn resolved_pairs(&self) -> (Vec<FoodRecord>, Vec<f64>) {
        let mut records = Vec::new();
        let mut quantities = Vec::new();
        for (mention, record) in self.mentions.iter().zip(self.records.iter()) {
            if let Some(record) = record {
                records.push(record.clone());
                quantities.push(mention.quantity);
            }
        }
        (records, quantities)
    }

    pub fn resolved_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_some()).count()
    }

    /// Total kilocalories: sum of `calories * quantity` over resolved pairs.
    pub fn total_calories(&self) -> f64 {
        self.mentions
            .iter()
            .zip(self.records.iter())
            .filter_map(|(mention, record)| {
                record
                    .as_ref()
                    .map(|record| record.calories * mention.quantity)
            })
            .sum()
    }
}

/// Per-cycle cache synchronization outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local rows removed because their remote counterpart disappeared.
    pub deleted: usize,
    /// Remote records newly cached locally.
    pub inserted: usize,
    /// Local-only rows that gained a remote identity this pass.
    pub promoted: usize,
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub entries_seen: usize,
    pub entries_completed: usize,
    pub entries_failed: usize,
    /// Entries left pending because nothing in them resolved.
    pub entries_skipped: usize,
    pub flagged_refreshed: usize,
    pub sync: SyncReport,
}

/// Orchestrator over the cache repository, the remote store, and the
/// generative resolver.
pub struct FoodAgent<R, S, N>
where
    R: FoodRepository,
    S: RemoteStore,
    N: NutritionResolver,
{
    repo: R,
    remote: S,
    resolver: N,
}

impl<R, S, N> FoodAgent<R, S, N>
where
    R: FoodRepository,
    S: RemoteStore,
    N: NutritionResolver,
{
    /// Builds the agent and compacts any duplicated cache rows left by an
    /// interrupted earlier run.
    pub fn new(repo: R, remote: S, resolver: N) -> AgentResult<Self> {
        let removed = repo.deduplicate()?;
        if removed > 0 {
            info!("event=cache_dedup module=service status=ok removed={removed}");
        }
        Ok(Self {
            repo,
            remote,
            resolver,
        })
    }

    /// Resolves one free-text meal description into nutrition records.
    ///
    /// Each mention goes through exact cache lookup, then similarity lookup,
    /// and only remaining misses are sent to the resolver in one batch.
    /// Freshly resolved records are written through to the remote catalog and
    /// the cache before being returned.
    pub fn resolve_description(&self, text: &str) -> AgentResult<ResolvedMeal> {
        let mentions = match self.extract_mentions(text) {
            Some(mentions) => mentions,
            None => {
                warn!(
                    "event=mention_extract module=service status=degenerate len={}",
                    text.chars().count()
                );
                return Ok(ResolvedMeal {
                    mentions: vec![ParsedMention::new(text.trim(), 1.0, DEFAULT_UNIT)],
                    records: vec![None],
                });
            }
        };

        // Snapshot cached names once so similarity search cost does not grow
        // with the number of mentions.
        let cached_names: Vec<String> = self
            .repo
            .list_all()?
            .into_iter()
            .map(|record| record.name)
            .collect();

        let mut records: Vec<Option<FoodRecord>> = vec![None; mentions.len()];
        let mut misses: Vec<(usize, NutritionRequest)> = Vec::new();

        for (index, mention) in mentions.iter().enumerate() {
            if let Some(hit) = self.repo.lookup(&mention.name, Some(&mention.unit))? {
                debug!(
                    "event=cache_lookup module=service status=hit name={} unit={}",
                    mention.name, mention.unit
                );
                records[index] = Some(hit);
                continue;
            }

            if let Some(candidate) =
                find_similar(&mention.name, &cached_names, DEFAULT_THRESHOLD).first()
            {
                if let Some(hit) = self.repo.lookup(candidate, None)? {
                    if hit.unit != mention.unit {
                        info!(
                            "event=cache_lookup module=service status=similar name={} candidate={} unit={} cached_unit={}",
                            mention.name, candidate, mention.unit, hit.unit
                        );
                    } else {
                        debug!(
                            "event=cache_lookup module=service status=similar name={} candidate={}",
                            mention.name, candidate
                        );
                    }
                    records[index] = Some(hit);
                    continue;
                }
            }

            misses.push((
                index,
                NutritionRequest::new(mention.name.clone(), mention.unit.clone()),
            ));
        }

        if !misses.is_empty() {
            let requests: Vec<NutritionRequest> =
                misses.iter().map(|(_, request)| request.clone()).collect();
            let resolved = self.resolver.resolve_batch(&requests)?;
            if resolved.len() != requests.len() {
                return Err(AgentError::ResolverContract {
                    expected: requests.len(),
                    actual: resolved.len(),
                });
            }
            info!(
                "event=resolve_batch module=service status=ok requested={} resolved={}",
                requests.len(),
                resolved.len()
            );
            for ((index, _), mut record) in misses.into_iter().zip(resolved.into_iter()) {
                self.add_to_store(&mut record)?;
                records[index] = Some(record);
            }
        }

        Ok(ResolvedMeal { mentions, records })
    }

    /// Reconciles the local cache against the remote catalog.
    ///
    /// Rows whose remote counterpart disappeared are deleted, local-only rows
    /// get one promotion attempt, and remote records missing locally are
    /// cached. Remote write failures during promotion keep the row local.
    pub fn sync(&self) -> AgentResult<SyncReport> {
        let remote_records = self.remote.get_all_food_items()?;
        let remote_ids: HashSet<&str> = remote_records
            .iter()
            .filter_map(|record| record.remote_id.as_deref())
            .collect();

        let mut report = SyncReport::default();
        let mut local_ids: HashSet<String> = HashSet::new();

        for local in self.repo.list_all()? {
            match local.remote_id.as_deref() {
                Some(remote_id) if !remote_ids.contains(remote_id) => {
                    if self.repo.delete(&local.name, Some(remote_id))? {
                        debug!(
                            "event=cache_sync module=service status=deleted name={}",
                            local.name
                        );
                        report.deleted += 1;
                    }
                }
                Some(remote_id) => {
                    local_ids.insert(remote_id.to_string());
                }
                None => match self.promote(&local) {
                    Some(remote_id) => {
                        local_ids.insert(remote_id);
                        report.promoted += 1;
                    }
                    None => {
                        warn!(
                            "event=cache_sync module=service status=unpromoted name={}",
                            local.name
                        );
                    }
                },
            }
        }

        for record in &remote_records {
            let Some(remote_id) = record.remote_id.as_deref() else {
                continue;
            };
            if local_ids.contains(remote_id) {
                continue;
            }
            if self.repo.insert(record)? {
                report.inserted += 1;
            }
        }

        info!(
            "event=cache_sync module=service status=ok deleted={} inserted={} promoted={}",
            report.deleted, report.inserted, report.promoted
        );
        Ok(report)
    }

    /// Re-checks catalog items flagged for update on the remote side.
    ///
    /// The local copy of each flagged item is replaced with the remote
    /// version, every entry referencing it is re-resolved and its totals
    /// rewritten, and the flag is cleared once all of them succeed. Returns
    /// the number of flagged items fully refreshed.
    pub fn refresh_flagged(&self) -> AgentResult<usize> {
        let flagged = self.remote.get_flagged_food_items()?;
        let mut refreshed = 0usize;

        for record in &flagged {
            let Some(remote_id) = record.remote_id.as_deref() else {
                continue;
            };

            if let Some(stale) = self.repo.lookup_by_remote_id(remote_id)? {
                if &stale != record {
                    self.repo.delete(&stale.name, Some(remote_id))?;
                    self.repo.insert(record)?;
                }
            } else {
                self.repo.insert(record)?;
            }

            let entries = self.remote.entries_for_food(remote_id)?;
            let mut all_rewritten = true;
            for entry in &entries {
                // Same per-entry recovery as the pending loop: a failed
                // resolution leaves the flag up for the next cycle instead
                // of aborting it.
                let meal = match self.resolve_description(&entry.description) {
                    Ok(meal) => meal,
                    Err(err) => {
                        warn!(
                            "event=flag_refresh module=service status=resolve_failed entry={} detail={err}",
                            entry.id
                        );
                        all_rewritten = false;
                        continue;
                    }
                };
                let (records, quantities) = meal.resolved_pairs();
                if records.is_empty() {
                    warn!(
                        "event=flag_refresh module=service status=unresolved entry={}",
                        entry.id
                    );
                    all_rewritten = false;
                    continue;
                }
                if let Err(err) = self.remote.create_associations(&entry.id, &records) {
                    warn!(
                        "event=flag_refresh module=service status=assoc_failed entry={} detail={err}",
                        entry.id
                    );
                }
                if let Err(err) = self
                    .remote
                    .update_main_database(&entry.id, &records, &quantities)
                {
                    warn!(
                        "event=flag_refresh module=service status=write_failed entry={} detail={err}",
                        entry.id
                    );
                    all_rewritten = false;
                }
            }

            if all_rewritten {
                match self.remote.clear_flag(remote_id) {
                    Ok(()) => {
                        info!(
                            "event=flag_refresh module=service status=ok name={} entries={}",
                            record.name,
                            entries.len()
                        );
                        refreshed += 1;
                    }
                    Err(err) => {
                        warn!(
                            "event=flag_refresh module=service status=flag_stuck name={} detail={err}",
                            record.name
                        );
                    }
                }
            }
        }

        Ok(refreshed)
    }

    /// Runs one polling cycle: flagged re-checks, cache sync, then pending
    /// entry resolution and write-back.
    pub fn run_cycle(&self) -> AgentResult<CycleReport> {
        let mut report = CycleReport {
            flagged_refreshed: self.refresh_flagged()?,
            sync: self.sync()?,
            ..CycleReport::default()
        };

        let entries = self.remote.get_pending_entries()?;
        report.entries_seen = entries.len();

        for entry in &entries {
            let started = Instant::now();

            let meal = match self.resolve_description(&entry.description) {
                Ok(meal) => meal,
                Err(err) => {
                    error!(
                        "event=entry_resolve module=service status=error entry={} detail={err}",
                        entry.id
                    );
                    report.entries_failed += 1;
                    continue;
                }
            };

            let (records, quantities) = meal.resolved_pairs();
            if records.is_empty() {
                // Leave the entry pending so the next cycle retries it.
                warn!(
                    "event=entry_resolve module=service status=skipped entry={}",
                    entry.id
                );
                report.entries_skipped += 1;
                continue;
            }

            if let Err(err) = self.remote.create_associations(&entry.id, &records) {
                warn!(
                    "event=entry_assoc module=service status=error entry={} detail={err}",
                    entry.id
                );
            }

            match self
                .remote
                .update_main_database(&entry.id, &records, &quantities)
            {
                Ok(()) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    if let Err(err) = self.remote.update_elapsed_time(&entry.id, elapsed) {
                        warn!(
                            "event=entry_timing module=service status=error entry={} detail={err}",
                            entry.id
                        );
                    }
                    info!(
                        "event=entry_resolve module=service status=ok entry={} foods={} total={:.1} elapsed={elapsed:.2}",
                        entry.id,
                        records.len(),
                        meal.total_calories()
                    );
                    report.entries_completed += 1;
                }
                Err(err) => {
                    error!(
                        "event=entry_write module=service status=error entry={} detail={err}",
                        entry.id
                    );
                    report.entries_failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Grammar-based parse first, generative mention extraction as fallback.
    /// `None` means neither path produced a usable mention list.
    fn extract_mentions(&self, text: &str) -> Option<Vec<ParsedMention>> {
        match parse_meal(text) {
            Ok(mentions) => Some(mentions),
            Err(parse_err) => {
                debug!(
                    "event=mention_extract module=service status=fallback detail={parse_err}"
                );
                match self.resolver.parse_mentions(text) {
                    Ok(mentions) if !mentions.is_empty() => Some(mentions),
                    Ok(_) => None,
                    Err(err) => {
                        warn!(
                            "event=mention_extract module=service status=error detail={err}"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Writes a freshly resolved record through to the remote catalog and the
    /// local cache. Remote failures leave the record cache-only; cache
    /// failures propagate.
    fn add_to_store(&self, record: &mut FoodRecord) -> AgentResult<()> {
        if record.remote_id.is_none() {
            match self
                .remote
                .query_food_item(&record.name, &record.unit, record.calories)
            {
                Ok(Some(remote_id)) => {
                    record.remote_id = Some(remote_id);
                }
                Ok(None) => match self.remote.create_food_item(record) {
                    Ok(Some(remote_id)) => {
                        record.remote_id = Some(remote_id);
                    }
                    Ok(None) => {
                        warn!(
                            "event=food_create module=service status=no_id name={}",
                            record.name
                        );
                    }
                    Err(err) => {
                        warn!(
                            "event=food_create module=service status=error name={} detail={err}",
                            record.name
                        );
                    }
                },
                Err(err) => {
                    warn!(
                        "event=food_query module=service status=error name={} detail={err}",
                        record.name
                    );
                }
            }
        }

        if !self.repo.insert(record)? {
            debug!(
                "event=cache_insert module=service status=exists name={} unit={}",
                record.name, record.unit
            );
        }
        Ok(())
    }

    /// One remote-create attempt for a cache row without remote identity.
    /// Returns the remote id on success.
    fn promote(&self, local: &FoodRecord) -> Option<String> {
        let remote_id = match self
            .remote
            .query_food_item(&local.name, &local.unit, local.calories)
        {
            Ok(Some(remote_id)) => Some(remote_id),
            Ok(None) => match self.remote.create_food_item(local) {
                Ok(found) => found,
                Err(err) => {
                    warn!(
                        "event=food_create module=service status=error name={} detail={err}",
                        local.name
                    );
                    None
                }
            },
            Err(err) => {
                warn!(
                    "event=food_query module=service status=error name={} detail={err}",
                    local.name
                );
                None
            }
        }?;

        let mut updated = local.clone();
        updated.remote_id = Some(remote_id.clone());
        match self.repo.update(&updated) {
            Ok(rows) if rows > 0 => Some(remote_id),
            Ok(_) => None,
            Err(err) => {
                warn!(
                    "event=cache_sync module=service status=update_failed name={} detail={err}",
                    local.name
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResolvedMeal;
    use crate::model::food::{FoodRecord, ParsedMention};

    fn meal() -> ResolvedMeal {
        ResolvedMeal {
            mentions: vec![
                ParsedMention::new("巨无霸", 2.0, "个"),
                ParsedMention::new("米饭", 1.0, "碗"),
                ParsedMention::new("神秘菜", 1.0, "份"),
            ],
            records: vec![
                Some(FoodRecord::new("巨无霸", 550.0, "个")),
                Some(FoodRecord::new("米饭", 130.0, "碗")),
                None,
            ],
        }
    }

    #[test]
    fn total_calories_weights_by_quantity() {
        assert!((meal().total_calories() - 1230.0).abs() < f64::EPSILON);
    }

    #[test]
    fn resolved_pairs_skip_unresolved_mentions() {
        let (records, quantities) = meal().resolved_pairs();
        assert_eq!(records.len(), 2);
        assert_eq!(quantities, vec![2.0, 1.0]);
    }

    #[test]
    fn resolved_count_ignores_missing_records() {
        assert_eq!(meal().resolved_count(), 2);
    }
}
