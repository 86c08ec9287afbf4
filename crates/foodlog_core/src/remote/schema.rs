//! Typed wire schema for remote store pages.
//!
//! # Responsibility
//! - Decode the store's dynamic page payloads once, at the boundary, into
//!   domain records.
//! - Never let raw property maps propagate inward.
//!
//! # Invariants
//! - Pages missing any required catalog property decode to `None` and are
//!   skipped by the caller, matching the store's own tolerance for partially
//!   filled rows.

use crate::model::food::{EntryStatus, FoodRecord, PendingEntry, GRAM_UNIT};
use serde::Deserialize;

pub const PROP_NAME: &str = "名称";
pub const PROP_CALORIES: &str = "热量";
pub const PROP_UNIT: &str = "单位";
pub const PROP_PROTEIN: &str = "蛋白质";
pub const PROP_FAT: &str = "脂肪";
pub const PROP_CARBS: &str = "碳水";
pub const PROP_GRAMS: &str = "克数";
pub const PROP_STATUS: &str = "状态";
pub const PROP_TOTAL_CALORIES: &str = "总热量";
pub const PROP_FOODS: &str = "食物";
pub const PROP_ELAPSED: &str = "用时";

pub const STATUS_COMPLETED: &str = "已完成";
pub const STATUS_ERRORED: &str = "出错";
pub const STATUS_NEEDS_RECHECK: &str = "待更新";
pub const STATUS_NORMAL: &str = "正常";

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<Page>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: PageProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageProperties {
    #[serde(rename = "名称")]
    pub name: Option<TitleProperty>,
    #[serde(rename = "热量")]
    pub calories: Option<NumberProperty>,
    #[serde(rename = "单位")]
    pub unit: Option<SelectProperty>,
    #[serde(rename = "蛋白质")]
    pub protein: Option<NumberProperty>,
    #[serde(rename = "脂肪")]
    pub fat: Option<NumberProperty>,
    #[serde(rename = "碳水")]
    pub carbs: Option<NumberProperty>,
    #[serde(rename = "克数")]
    pub grams: Option<NumberProperty>,
    #[serde(rename = "状态")]
    pub status: Option<SelectProperty>,
    #[serde(rename = "食物描述")]
    pub description: Option<RichTextProperty>,
}

#[derive(Debug, Deserialize)]
pub struct TitleProperty {
    #[serde(default)]
    pub title: Vec<TextFragment>,
}

#[derive(Debug, Deserialize)]
pub struct RichTextProperty {
    #[serde(default)]
    pub rich_text: Vec<TextFragment>,
}

#[derive(Debug, Deserialize)]
pub struct TextFragment {
    pub plain_text: Option<String>,
    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NumberProperty {
    pub number: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SelectProperty {
    pub select: Option<SelectValue>,
}

#[derive(Debug, Deserialize)]
pub struct SelectValue {
    pub name: String,
}

impl TextFragment {
    fn text_value(&self) -> Option<&str> {
        self.plain_text
            .as_deref()
            .or(self.text.as_ref().map(|text| text.content.as_str()))
    }
}

fn fragments_text(fragments: &[TextFragment]) -> Option<String> {
    let joined: String = fragments
        .iter()
        .filter_map(TextFragment::text_value)
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn select_name(property: Option<&SelectProperty>) -> Option<&str> {
    property?.select.as_ref().map(|value| value.name.as_str())
}

fn number_value(property: Option<&NumberProperty>) -> Option<f64> {
    property?.number
}

/// Decodes a catalog page into a [`FoodRecord`].
///
/// Returns `None` when name, calories or unit is absent.
pub fn decode_food_page(page: &Page) -> Option<FoodRecord> {
    let props = &page.properties;
    let name = props
        .name
        .as_ref()
        .and_then(|title| fragments_text(&title.title))?;
    let calories = number_value(props.calories.as_ref())?;
    let unit = select_name(props.unit.as_ref())?.to_string();

    let grams = number_value(props.grams.as_ref())
        .or_else(|| (unit == GRAM_UNIT).then_some(1.0));

    Some(FoodRecord {
        name,
        calories,
        unit,
        protein: number_value(props.protein.as_ref()),
        fat: number_value(props.fat.as_ref()),
        carbs: number_value(props.carbs.as_ref()),
        grams,
        remote_id: Some(page.id.clone()),
    })
}

/// Decodes a main-database page into a [`PendingEntry`].
///
/// Returns `None` when the page carries no description text.
pub fn decode_entry_page(page: &Page) -> Option<PendingEntry> {
    let description = page
        .properties
        .description
        .as_ref()
        .and_then(|prop| fragments_text(&prop.rich_text))?;

    let status = match select_name(page.properties.status.as_ref()) {
        Some(STATUS_COMPLETED) => EntryStatus::Completed,
        Some(STATUS_ERRORED) => EntryStatus::Errored,
        _ => EntryStatus::Pending,
    };

    Some(PendingEntry {
        id: page.id.clone(),
        description,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_entry_page, decode_food_page, Page};
    use crate::model::food::EntryStatus;
    use serde_json::json;

    fn page(value: serde_json::Value) -> Page {
        serde_json::from_value(value).expect("page payload should deserialize")
    }

    #[test]
    fn decodes_full_catalog_page() {
        let page = page(json!({
            "id": "abc-123",
            "properties": {
                "名称": {"title": [{"plain_text": "苹果"}]},
                "热量": {"number": 52.0},
                "单位": {"select": {"name": "个"}},
                "蛋白质": {"number": 0.3},
                "克数": {"number": 150.0}
            }
        }));

        let record = decode_food_page(&page).expect("catalog page should decode");
        assert_eq!(record.name, "苹果");
        assert_eq!(record.calories, 52.0);
        assert_eq!(record.unit, "个");
        assert_eq!(record.protein, Some(0.3));
        assert_eq!(record.fat, None);
        assert_eq!(record.grams, Some(150.0));
        assert_eq!(record.remote_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn gram_pages_default_grams_to_one() {
        let page = page(json!({
            "id": "abc-456",
            "properties": {
                "名称": {"title": [{"text": {"content": "鸡肉"}}]},
                "热量": {"number": 2.39},
                "单位": {"select": {"name": "克"}}
            }
        }));

        let record = decode_food_page(&page).expect("gram page should decode");
        assert_eq!(record.grams, Some(1.0));
    }

    #[test]
    fn pages_missing_required_fields_are_skipped() {
        let page = page(json!({
            "id": "abc-789",
            "properties": {
                "名称": {"title": []},
                "热量": {"number": 10.0},
                "单位": {"select": {"name": "个"}}
            }
        }));
        assert!(decode_food_page(&page).is_none());
    }

    #[test]
    fn decodes_pending_entry_with_status() {
        let page = page(json!({
            "id": "entry-1",
            "properties": {
                "食物描述": {"rich_text": [{"plain_text": "两个巨无霸"}]},
                "状态": {"select": {"name": "处理中"}}
            }
        }));

        let entry = decode_entry_page(&page).expect("entry page should decode");
        assert_eq!(entry.description, "两个巨无霸");
        assert_eq!(entry.status, EntryStatus::Pending);
    }
}
