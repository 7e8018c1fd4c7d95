// src/types/events.rs

use serde::{Deserialize, Serialize};

use super::chat::DisambiguationOption;
use super::payload::{ReportPayload, Row};

/// One server-sent event of a query stream, keyed by its `type` field.
///
/// Every field besides the tag is optional so that an event missing data
/// still decodes and can be ignored by the reducer. Tags this client does
/// not know decode to [`StreamEvent::Unknown`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start,
    NodeStart(NodeEvent),
    NodeDetail(NodeEvent),
    NodeComplete(NodeEvent),
    Retry(RetryEvent),
    ResponseStart,
    ResponseChunk(ChunkEvent),
    ResponseComplete(CompletionEvent),
    Disambiguation(DisambiguationEvent),
    Complete(CompletionEvent),
    Error(ErrorEvent),
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start => "start",
            StreamEvent::NodeStart(_) => "node_start",
            StreamEvent::NodeDetail(_) => "node_detail",
            StreamEvent::NodeComplete(_) => "node_complete",
            StreamEvent::Retry(_) => "retry",
            StreamEvent::ResponseStart => "response_start",
            StreamEvent::ResponseChunk(_) => "response_chunk",
            StreamEvent::ResponseComplete(_) => "response_complete",
            StreamEvent::Disambiguation(_) => "disambiguation",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
            StreamEvent::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryEvent {
    #[serde(default)]
    pub retry_count: Option<u32>,
    #[serde(default, alias = "max")]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkEvent {
    #[serde(default, alias = "content")]
    pub chunk: Option<String>,
}

/// Body shared by `response_complete` and `complete`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub comparison_data: Option<ReportPayload>,
    #[serde(default)]
    pub visualization_data: Option<ReportPayload>,
    #[serde(default)]
    pub raw_data: Option<Vec<Row>>,
    #[serde(default)]
    pub requires_user_choice: bool,
    #[serde(default)]
    pub alternative_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationEvent {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Vec<DisambiguationOption>,
    #[serde(default)]
    pub original_query: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_node_start() {
        let ev: StreamEvent = serde_json::from_str(
            r#"{"type":"node_start","node":"classify","name":"Classifying","icon":"🔎"}"#,
        )
        .unwrap();
        match ev {
            StreamEvent::NodeStart(node) => {
                assert_eq!(node.node.as_deref(), Some("classify"));
                assert_eq!(node.name.as_deref(), Some("Classifying"));
                assert!(node.description.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn node_start_without_node_still_decodes() {
        let ev: StreamEvent = serde_json::from_str(r#"{"type":"node_start"}"#).unwrap();
        assert_eq!(ev, StreamEvent::NodeStart(NodeEvent::default()));
    }

    #[test]
    fn unit_events_ignore_extra_fields() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"start","session_id":"abc"}"#).unwrap();
        assert_eq!(ev, StreamEvent::Start);
    }

    #[test]
    fn unknown_tag_is_tolerated() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"heartbeat","ts":1}"#).unwrap();
        assert_eq!(ev, StreamEvent::Unknown);
    }

    #[test]
    fn chunk_accepts_content_alias() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"response_chunk","content":"abc"}"#).unwrap();
        assert_eq!(
            ev,
            StreamEvent::ResponseChunk(ChunkEvent {
                chunk: Some("abc".to_string())
            })
        );
    }

    #[test]
    fn response_complete_carries_payloads() {
        let ev: StreamEvent = serde_json::from_str(
            r#"{
                "type": "response_complete",
                "response": "done",
                "requires_user_choice": true,
                "alternative_type": "hydro",
                "visualization_data": {"tool_name": "LoadCurveTool", "table": [{"month": 1}]}
            }"#,
        )
        .unwrap();
        let StreamEvent::ResponseComplete(body) = ev else {
            panic!("expected response_complete");
        };
        assert_eq!(body.response.as_deref(), Some("done"));
        assert!(body.requires_user_choice);
        assert_eq!(body.alternative_type.as_deref(), Some("hydro"));
        let viz = body.visualization_data.unwrap();
        assert_eq!(viz.tool_name.as_deref(), Some("LoadCurveTool"));
        assert_eq!(viz.rows().len(), 1);
    }

    #[test]
    fn disambiguation_options_use_snake_case_tool_name() {
        let ev: StreamEvent = serde_json::from_str(
            r#"{
                "type": "disambiguation",
                "question": "Which plant?",
                "original_query": "cvu of 12",
                "options": [{"label": "Thermal 12", "query": "cvu of thermal 12", "tool_name": "ThermalCostTool"}]
            }"#,
        )
        .unwrap();
        let StreamEvent::Disambiguation(body) = ev else {
            panic!("expected disambiguation");
        };
        assert_eq!(body.options.len(), 1);
        assert_eq!(body.options[0].tool_name.as_deref(), Some("ThermalCostTool"));
    }

    #[test]
    fn error_accepts_error_alias() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"error","error":"deck not loaded"}"#).unwrap();
        assert_eq!(
            ev,
            StreamEvent::Error(ErrorEvent {
                message: Some("deck not loaded".to_string())
            })
        );
    }
}
