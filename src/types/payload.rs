// src/types/payload.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Keys under which backends put tabular rows, in lookup order.
const TABLE_KEYS: &[&str] = &["table", "data", "comparison_table", "rows"];

/// A comparison or visualization payload as sent by the backend.
///
/// Only the discriminators are typed; everything else is kept verbatim in
/// `extra` so renderers receive exactly what the backend produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportPayload {
    /// `visualization_type`, falling back to `chart_config.type`.
    pub fn chart_type(&self) -> Option<&str> {
        self.visualization_type.as_deref().or_else(|| {
            self.chart_config
                .as_ref()
                .and_then(|c| c.get("type"))
                .and_then(Value::as_str)
        })
    }

    pub fn rows(&self) -> Vec<Row> {
        TABLE_KEYS
            .iter()
            .filter_map(|key| self.extra.get(*key))
            .find_map(|value| match value {
                Value::Array(items) if !items.is_empty() => Some(
                    items
                        .iter()
                        .filter_map(|item| item.as_object().cloned())
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn has_table(&self) -> bool {
        !self.rows().is_empty()
    }

    pub fn has_chart(&self) -> bool {
        self.chart_data.as_ref().is_some_and(has_content)
    }

    /// Deck names of a comparison payload.
    pub fn decks(&self) -> Vec<String> {
        self.extra
            .get("decks")
            .and_then(Value::as_array)
            .map(|decks| {
                decks
                    .iter()
                    .filter_map(|d| match d {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(obj) => obj
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.extra
            .get("title")
            .and_then(Value::as_str)
            .or_else(|| {
                self.chart_config
                    .as_ref()
                    .and_then(|c| c.get("title"))
                    .and_then(Value::as_str)
            })
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(has_content),
        Value::String(s) => !s.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
