//! Notion-backed remote store adapter.
//!
//! # Responsibility
//! - Implement [`RemoteStore`] over the Notion HTTP API.
//! - Build write payloads and decode read payloads at this boundary only.
//!
//! # Invariants
//! - All calls are blocking with a fixed client timeout.
//! - Non-success responses map to `RemoteError` with a body snippet for
//!   operator logs; payloads never propagate inward undecoded.

use super::schema::{
    decode_entry_page, decode_food_page, QueryResponse, PROP_CALORIES, PROP_CARBS,
    PROP_ELAPSED, PROP_FAT, PROP_FOODS, PROP_GRAMS, PROP_NAME, PROP_PROTEIN,
    PROP_STATUS, PROP_TOTAL_CALORIES, PROP_UNIT, STATUS_COMPLETED, STATUS_ERRORED, STATUS_NORMAL,
    STATUS_NEEDS_RECHECK,
};
use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteSettings;
use crate::model::food::{FoodRecord, PendingEntry};
use log::{info, warn};
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_SNIPPET_CHARS: usize = 200;

/// Blocking Notion client for the catalog and main databases.
pub struct NotionStore {
    client: Client,
    settings: RemoteSettings,
}

impl NotionStore {
    /// Builds the adapter from immutable connection settings.
    pub fn new(settings: RemoteSettings) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RemoteError::read("client_init", err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn query_database(
        &self,
        database_id: &str,
        filter: Value,
        operation: &'static str,
    ) -> RemoteResult<QueryResponse> {
        let url = format!(
            "{}/v1/databases/{database_id}/query",
            self.settings.base_url
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "filter": filter }))
            .send()
            .map_err(|err| RemoteError::read(operation, err.to_string()))?;

        let response = check_status(response, operation, ErrorKind::Read)?;
        response
            .json()
            .map_err(|err| RemoteError::read(operation, format!("payload decode: {err}")))
    }

    fn patch_page(
        &self,
        page_id: &str,
        properties: Value,
        operation: &'static str,
    ) -> RemoteResult<()> {
        let url = format!("{}/v1/pages/{page_id}", self.settings.base_url);
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.settings.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "properties": properties }))
            .send()
            .map_err(|err| RemoteError::write(operation, err.to_string()))?;

        check_status(response, operation, ErrorKind::Write)?;
        Ok(())
    }
}

impl RemoteStore for NotionStore {
    fn get_pending_entries(&self) -> RemoteResult<Vec<PendingEntry>> {
        let filter = json!({
            "property": PROP_STATUS,
            "select": { "does_not_equal": STATUS_COMPLETED }
        });
        let response =
            self.query_database(&self.settings.main_database_id, filter, "pending_entries")?;

        Ok(response
            .results
            .iter()
            .filter_map(|page| {
                let entry = decode_entry_page(page);
                if entry.is_none() {
                    warn!(
                        "event=entry_decode module=remote status=skipped page_id={}",
                        page.id
                    );
                }
                entry
            })
            .collect())
    }

    // Callers run `query_food_item` first and only create on a miss, so
    // this is a plain create with no duplicate pre-check of its own.
    fn create_food_item(&self, record: &FoodRecord) -> RemoteResult<Option<String>> {
        let url = format!("{}/v1/pages", self.settings.base_url);
        let payload = json!({
            "parent": { "database_id": self.settings.food_database_id },
            "properties": {
                (PROP_NAME): { "title": [{ "text": { "content": record.name } }] },
                (PROP_CALORIES): { "number": record.calories },
                (PROP_UNIT): { "select": { "name": record.unit } },
                (PROP_PROTEIN): { "number": record.protein },
                (PROP_FAT): { "number": record.fat },
                (PROP_CARBS): { "number": record.carbs },
                (PROP_GRAMS): { "number": record.grams },
            }
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .map_err(|err| RemoteError::write("create_food_item", err.to_string()))?;

        let response = check_status(response, "create_food_item", ErrorKind::Write)?;
        let created: Value = response.json().map_err(|err| {
            RemoteError::write("create_food_item", format!("payload decode: {err}"))
        })?;
        let id = created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::write("create_food_item", "response has no page id"))?;

        info!(
            "event=food_create module=remote status=ok name={} unit={} remote_id={id}",
            record.name, record.unit
        );
        Ok(Some(id))
    }

    fn query_food_item(
        &self,
        name: &str,
        unit: &str,
        calories: f64,
    ) -> RemoteResult<Option<String>> {
        let filter = json!({
            "and": [
                { "property": PROP_NAME, "title": { "equals": name } },
                { "property": PROP_UNIT, "select": { "equals": unit } },
                { "property": PROP_CALORIES, "number": { "equals": calories } },
            ]
        });
        let response =
            self.query_database(&self.settings.food_database_id, filter, "query_food_item")?;
        Ok(response.results.first().map(|page| page.id.clone()))
    }

    fn get_all_food_items(&self) -> RemoteResult<Vec<FoodRecord>> {
        let filter = json!({
            "property": PROP_NAME,
            "rich_text": { "is_not_empty": true }
        });
        let response =
            self.query_database(&self.settings.food_database_id, filter, "all_food_items")?;

        Ok(response
            .results
            .iter()
            .filter_map(|page| {
                let record = decode_food_page(page);
                if record.is_none() {
                    warn!(
                        "event=food_decode module=remote status=skipped page_id={}",
                        page.id
                    );
                }
                record
            })
            .collect())
    }

    fn create_associations(&self, entry_id: &str, records: &[FoodRecord]) -> RemoteResult<()> {
        let mut relations = Vec::new();
        for record in records {
            let id = match &record.remote_id {
                Some(id) => Some(id.clone()),
                // Not persisted yet, usually because an earlier create
                // failed. Reuse an existing page if the store already has
                // one, otherwise try the create once more before linking.
                None => match self.query_food_item(&record.name, &record.unit, record.calories)? {
                    Some(id) => Some(id),
                    None => self.create_food_item(record)?,
                },
            };
            match id {
                Some(id) => relations.push(json!({ "id": id })),
                None => warn!(
                    "event=association module=remote status=skipped name={} unit={}",
                    record.name, record.unit
                ),
            }
        }

        self.patch_page(
            entry_id,
            json!({ (PROP_FOODS): { "relation": relations } }),
            "create_associations",
        )
    }

    fn update_main_database(
        &self,
        entry_id: &str,
        records: &[FoodRecord],
        quantities: &[f64],
    ) -> RemoteResult<()> {
        let total: f64 = records
            .iter()
            .zip(quantities)
            .map(|(record, quantity)| record.calories * quantity)
            .sum();

        let properties = json!({
            (PROP_TOTAL_CALORIES): {
                "rich_text": [{ "type": "text", "text": { "content": total.to_string() } }]
            },
            (PROP_STATUS): { "select": { "name": STATUS_COMPLETED } },
        });

        match self.patch_page(entry_id, properties, "update_main_database") {
            Ok(()) => Ok(()),
            Err(err) => {
                // Leave a visible errored marker so the entry is not
                // silently re-picked forever.
                let errored = json!({ (PROP_STATUS): { "select": { "name": STATUS_ERRORED } } });
                if let Err(mark_err) = self.patch_page(entry_id, errored, "mark_errored") {
                    warn!(
                        "event=mark_errored module=remote status=error entry_id={entry_id} error={mark_err}"
                    );
                }
                Err(err)
            }
        }
    }

    fn update_elapsed_time(&self, entry_id: &str, seconds: f64) -> RemoteResult<()> {
        self.patch_page(
            entry_id,
            json!({ (PROP_ELAPSED): { "number": seconds } }),
            "update_elapsed_time",
        )
    }

    fn get_flagged_food_items(&self) -> RemoteResult<Vec<FoodRecord>> {
        let filter = json!({
            "property": PROP_STATUS,
            "select": { "equals": STATUS_NEEDS_RECHECK }
        });
        let response =
            self.query_database(&self.settings.food_database_id, filter, "flagged_food_items")?;
        Ok(response.results.iter().filter_map(decode_food_page).collect())
    }

    fn entries_for_food(&self, food_remote_id: &str) -> RemoteResult<Vec<PendingEntry>> {
        let filter = json!({
            "property": PROP_FOODS,
            "relation": { "contains": food_remote_id }
        });
        let response =
            self.query_database(&self.settings.main_database_id, filter, "entries_for_food")?;
        Ok(response.results.iter().filter_map(decode_entry_page).collect())
    }

    fn clear_flag(&self, food_remote_id: &str) -> RemoteResult<()> {
        self.patch_page(
            food_remote_id,
            json!({ (PROP_STATUS): { "select": { "name": STATUS_NORMAL } } }),
            "clear_flag",
        )
    }
}

enum ErrorKind {
    Read,
    Write,
}

fn check_status(
    response: Response,
    operation: &'static str,
    kind: ErrorKind,
) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    let detail = format!("status {status}: {snippet}");
    Err(match kind {
        ErrorKind::Read => RemoteError::read(operation, detail),
        ErrorKind::Write => RemoteError::write(operation, detail),
    })
}
