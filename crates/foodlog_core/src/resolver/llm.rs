//! LLM-backed nutrition resolver.
//!
//! # Responsibility
//! - Implement [`NutritionResolver`] over the Anthropic messages API.
//! - Force strict-JSON answers and decode them into domain records.
//!
//! # Invariants
//! - One API call per batch, never per item.
//! - Batch responses that change length or drop the `items` array are
//!   `ResolveError::Malformed`, never silently truncated.

use super::{NutritionRequest, NutritionResolver, ResolveError, ResolveResult};
use crate::config::ResolverSettings;
use crate::model::food::{FoodRecord, ParsedMention, GRAM_UNIT};
use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f64 = 0.1;

/// Blocking client for the generative fallback.
pub struct LlmResolver {
    client: Client,
    settings: ResolverSettings,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NutritionItems {
    #[serde(default)]
    items: Vec<NutritionItem>,
}

#[derive(Debug, Deserialize)]
struct NutritionItem {
    name: String,
    calories: f64,
    unit: String,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    grams: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MentionItems {
    #[serde(default)]
    items: Vec<ParsedMention>,
}

impl LlmResolver {
    /// Builds the resolver from immutable connection settings.
    pub fn new(settings: ResolverSettings) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ResolveError::Http {
                detail: err.to_string(),
            })?;
        Ok(Self { client, settings })
    }

    fn query(&self, prompt: String) -> ResolveResult<String> {
        let url = format!("{}/v1/messages", self.settings.base_url);
        let payload = json!({
            "model": self.settings.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .map_err(|err| ResolveError::Http {
                detail: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ResolveError::Api {
                status: status.as_u16(),
                detail: body.chars().take(200).collect(),
            });
        }

        let message: MessagesResponse = response.json().map_err(|err| ResolveError::Malformed {
            detail: format!("message envelope: {err}"),
        })?;
        message
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ResolveError::Malformed {
                detail: "no text block in response".to_string(),
            })
    }
}

impl NutritionResolver for LlmResolver {
    fn resolve_batch(&self, requests: &[NutritionRequest]) -> ResolveResult<Vec<FoodRecord>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let request_list =
            serde_json::to_string(requests).map_err(|err| ResolveError::Malformed {
                detail: format!("request serialization: {err}"),
            })?;
        let prompt = nutrition_prompt(&request_list);

        info!(
            "event=resolver_batch module=resolver status=start size={}",
            requests.len()
        );
        let answer = self.query(prompt)?;
        let decoded: NutritionItems = decode_strict_json(&answer)?;

        if decoded.items.len() != requests.len() {
            return Err(ResolveError::Malformed {
                detail: format!(
                    "expected {} items, got {}",
                    requests.len(),
                    decoded.items.len()
                ),
            });
        }

        Ok(decoded
            .items
            .into_iter()
            .map(|item| {
                let grams = if item.unit == GRAM_UNIT {
                    Some(1.0)
                } else {
                    item.grams
                };
                FoodRecord {
                    name: item.name,
                    calories: item.calories,
                    unit: item.unit,
                    protein: item.protein,
                    fat: item.fat,
                    carbs: item.carbs,
                    grams,
                    remote_id: None,
                }
            })
            .collect())
    }

    fn parse_mentions(&self, text: &str) -> ResolveResult<Vec<ParsedMention>> {
        info!("event=resolver_parse module=resolver status=start");
        let answer = self.query(mention_prompt(text))?;
        let decoded: MentionItems = decode_strict_json(&answer)?;
        Ok(decoded.items)
    }
}

/// Decodes an answer that should be a bare JSON object, tolerating a
/// markdown code fence around it.
fn decode_strict_json<T: for<'de> Deserialize<'de>>(answer: &str) -> ResolveResult<T> {
    let trimmed = answer.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|err| ResolveError::Malformed {
        detail: format!("{err}; answer starts `{}`", truncate(body, 80)),
    })
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn nutrition_prompt(request_list: &str) -> String {
    format!(
        r#"请根据以下食物名称和单位，返回每种食物的营养信息。
{request_list}
如果单位为"克"，则给出每克的热量。
如果食物名称格式类似 "咖啡:300卡"，则返回300卡的热量。
请严格按照以下JSON格式返回，不要添加其他文本或解释：

{{
"items": [
  {{
  "name": "食物名称",
  "calories": 按照给出的单位计算的热量(千卡),
  "unit": "单位",
  "protein": 蛋白质含量(克),
  "fat": 脂肪含量(克),
  "carbs": 碳水化合物含量(克),
  "grams": 按照给出的单位换算为等量重量(克)
  }}
]
}}

每个输入项对应一个输出项，保持输入顺序。
确保返回的是一个有效的JSON对象，所有数值应该是数字而非字符串。"#
    )
}

fn mention_prompt(description: &str) -> String {
    format!(
        r#"请根据以下食物描述提取食物名称、数量和单位，返回JSON格式的结果：
{description}

请按照以下规则提取：
1. 数量词（如"一个"、"两碗"、"10个"）应分解为数字和单位
2. 食物名称不应包含数量词，但应保留其他描述性形容词
3. 例如："一个去皮的鸡腿" → 数量=1, 单位=个, 名称="去皮的鸡腿"
4. 例如："三碗卤肉饭" → 数量=3, 单位=碗, 名称="卤肉饭"

请严格按照以下JSON格式返回，不要添加其他文本或解释：

{{
"items": [
  {{"name": "食物名称(不含数量词)", "quantity": 数量, "unit": "单位"}}
]
}}

若无法确定quantity，请返回1。
若无法确定unit，请返回"个"。"#
    )
}

#[cfg(test)]
mod tests {
    use super::{decode_strict_json, MentionItems, NutritionItems};
    use crate::model::food::ParsedMention;

    #[test]
    fn decodes_bare_json_object() {
        let decoded: NutritionItems = decode_strict_json(
            r#"{"items": [{"name": "苹果", "calories": 52.0, "unit": "个"}]}"#,
        )
        .expect("bare object should decode");
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].name, "苹果");
        assert_eq!(decoded.items[0].protein, None);
    }

    #[test]
    fn decodes_fenced_json_object() {
        let decoded: MentionItems = decode_strict_json(
            "```json\n{\"items\": [{\"name\": \"巨无霸\", \"quantity\": 2, \"unit\": \"个\"}]}\n```",
        )
        .expect("fenced object should decode");
        assert_eq!(decoded.items, [ParsedMention::new("巨无霸", 2.0, "个")]);
    }

    #[test]
    fn mention_defaults_apply_when_fields_are_missing() {
        let decoded: MentionItems =
            decode_strict_json(r#"{"items": [{"name": "沙拉"}]}"#).expect("defaults should apply");
        assert_eq!(decoded.items, [ParsedMention::new("沙拉", 1.0, "个")]);
    }

    #[test]
    fn prose_answer_is_malformed() {
        let result: Result<NutritionItems, _> = decode_strict_json("抱歉，我无法确定。");
        assert!(result.is_err());
    }
}
