// file: src/extractor/normalizer.rs
// description: staged recovery of model output into normalized structured data
// reference: strict parse, json repair, item salvage, regex fallback

use crate::extractor::patterns::{
    ADJACENT_OBJECTS, CODE_FENCE, CURRENCY_AMOUNT, ITEMS_ARRAY_START, TRAILING_COMMA,
    TRANSACTION_DATE, parse_amount,
};
use crate::models::structured::{ExtractedItem, StructuredData, default_headers, summary_keys};
use serde_json::{Map, Value, json};
use tracing::debug;

const FALLBACK_ITEM_LIMIT: usize = 10;

/// Which recovery stage produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The response was valid JSON once fences were removed.
    Strict,
    /// Valid after closing strings, dropping trailing commas and balancing brackets.
    Repaired,
    /// Only complete objects of the `items` array could be recovered.
    Salvaged,
    /// Nothing usable in the response; amounts and dates were scraped from the source text.
    Fallback,
    /// No stage recovered anything.
    Empty,
}

impl ParseOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Strict | Self::Repaired)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub outcome: ParseOutcome,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub outcome: ParseOutcome,
    pub data: StructuredData,
}

#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    currency: String,
}

impl ResponseNormalizer {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn normalize_response(&self, raw: &str, source_text: &str) -> NormalizedResponse {
        let parsed = self.parse_response(raw, source_text);
        if parsed.outcome.is_degraded() {
            debug!("Model response recovered via {:?} stage", parsed.outcome);
        }

        NormalizedResponse {
            outcome: parsed.outcome,
            data: self.normalize(&parsed.value),
        }
    }

    pub fn parse_response(&self, raw: &str, source_text: &str) -> ParsedResponse {
        let cleaned = clean_response(raw);

        let strict = parse_container(&cleaned)
            .or_else(|| trim_trailing_prose(&cleaned).and_then(parse_container));
        if let Some(value) = strict {
            return ParsedResponse {
                outcome: ParseOutcome::Strict,
                value,
            };
        }

        if let Some(value) = parse_container(&repair_json(&cleaned)) {
            return ParsedResponse {
                outcome: ParseOutcome::Repaired,
                value,
            };
        }

        let salvaged = salvage_items(&cleaned);
        if !salvaged.is_empty() {
            return ParsedResponse {
                outcome: ParseOutcome::Salvaged,
                value: fallback_value(salvaged, "Extraction completed via fallback"),
            };
        }

        let scraped = scrape_source_text(source_text);
        if !scraped.is_empty() {
            return ParsedResponse {
                outcome: ParseOutcome::Fallback,
                value: fallback_value(scraped, "Extraction completed via fallback"),
            };
        }

        ParsedResponse {
            outcome: ParseOutcome::Empty,
            value: fallback_value(Vec::new(), "No structured data recovered"),
        }
    }

    /// Reshapes an arbitrary JSON value into `StructuredData`. Never fails:
    /// missing or ill-typed parts are replaced by defaults.
    pub fn normalize(&self, value: &Value) -> StructuredData {
        let (headers_value, items_value, summary_value) = match value {
            Value::Object(obj) => (obj.get("headers"), obj.get("items"), obj.get("summary")),
            Value::Array(_) => (None, Some(value), None),
            _ => (None, None, None),
        };

        let headers = headers_value
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|headers| !headers.is_empty())
            .unwrap_or_else(default_headers);

        let items: Vec<ExtractedItem> = items_value
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(normalize_item).collect())
            .unwrap_or_default();

        let raw_summary = summary_value
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let summary = self.normalize_summary(raw_summary, items.len());

        StructuredData {
            headers,
            items,
            summary,
        }
    }

    fn normalize_summary(&self, raw: Map<String, Value>, item_count: usize) -> Map<String, Value> {
        let defaults = [
            (summary_keys::DOCUMENT_TYPE, json!("Financial Report")),
            (summary_keys::TOTAL_INCOME, json!(0)),
            (summary_keys::TOTAL_EXPENSES, json!(0)),
            (summary_keys::NET_AMOUNT, json!(0)),
            (summary_keys::CURRENCY, json!(self.currency)),
            (summary_keys::STATUS, json!("Extraction completed")),
        ];

        let mut summary = raw;
        for (key, default) in defaults {
            let present = summary.get(key).is_some_and(is_truthy);
            if !present {
                summary.insert(key.to_string(), default);
            }
        }
        summary.insert(
            summary_keys::TOTAL_TRANSACTIONS.to_string(),
            json!(item_count),
        );
        summary
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new("INR")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn parse_container(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(|value| value.is_object() || value.is_array())
}

/// Strips code fences, typographic quotes and any prose before the first object.
fn clean_response(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "");
    let cleaned = unfenced
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let trimmed = cleaned.trim();

    if trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    match trimmed.find('{') {
        Some(first) => trimmed[first..].to_string(),
        None => trimmed.to_string(),
    }
}

/// The text up to the last closing brace, if anything follows it.
fn trim_trailing_prose(text: &str) -> Option<&str> {
    let last = text.rfind('}')?;
    (last + 1 < text.len()).then(|| &text[..=last])
}

fn repair_json(text: &str) -> String {
    let mut repaired = text.trim_end().to_string();

    if has_open_string(&repaired) {
        repaired.push('"');
    }

    while repaired.ends_with(',') {
        repaired.pop();
        repaired = repaired.trim_end().to_string();
    }

    repaired = ADJACENT_OBJECTS.replace_all(&repaired, "},{").into_owned();
    repaired.push_str(&missing_closers(&repaired));
    TRAILING_COMMA.replace_all(&repaired, "$1").into_owned()
}

fn has_open_string(text: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    in_string
}

/// Closing brackets needed, innermost first, to balance `text`.
fn missing_closers(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    stack.iter().rev().collect()
}

/// Recovers every complete object from the `items` array of a broken response.
fn salvage_items(text: &str) -> Vec<Value> {
    let Some(start) = ITEMS_ARRAY_START.find(text) else {
        return Vec::new();
    };

    let body = &text[start.end()..];
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut object_start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => {
                if depth == 0 {
                    object_start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(begin) = object_start.take()
                    && let Ok(value) = serde_json::from_str::<Value>(&body[begin..=idx])
                    && value.is_object()
                {
                    items.push(value);
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    items
}

/// Pairs currency amounts in the source text with dates in order of appearance.
fn scrape_source_text(source: &str) -> Vec<Value> {
    let dates: Vec<&str> = TRANSACTION_DATE
        .find_iter(source)
        .map(|m| m.as_str())
        .collect();

    CURRENCY_AMOUNT
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .take(FALLBACK_ITEM_LIMIT)
        .enumerate()
        .map(|(index, amount)| {
            json!({
                "Date": dates.get(index).copied().unwrap_or("N/A"),
                "Description": format!("Financial transaction {}", index + 1),
                "Amount": parse_amount(amount),
                "Category": "General",
                "Type": "Info",
            })
        })
        .collect()
}

fn fallback_value(items: Vec<Value>, status: &str) -> Value {
    json!({
        "headers": default_headers(),
        "items": items,
        "summary": {
            summary_keys::DOCUMENT_TYPE: "Financial Report",
            summary_keys::STATUS: status,
            summary_keys::NOTE: "Some data may be estimated",
        }
    })
}

fn normalize_item(value: &Value) -> Option<ExtractedItem> {
    let obj = value.as_object()?;

    Some(ExtractedItem {
        date: text_field(obj, "date").unwrap_or_else(|| "N/A".to_string()),
        description: text_field(obj, "description").unwrap_or_else(|| "N/A".to_string()),
        amount: amount_field(obj),
        category: text_field(obj, "category").unwrap_or_else(|| "Other".to_string()),
        item_type: text_field(obj, "type").unwrap_or_else(|| "Expense".to_string()),
    })
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(key, value)| key.eq_ignore_ascii_case(name) && is_truthy(value))
        .map(|(_, value)| value)
}

fn text_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    match field(obj, name)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn amount_field(obj: &Map<String, Value>) -> f64 {
    match field(obj, "amount") {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_amount(s),
        _ => 0.0,
    }
}
