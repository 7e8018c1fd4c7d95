// src/types/chat.rs

use serde::{Deserialize, Serialize};

use super::payload::{ReportPayload, Row};
use crate::state::unix_ms;

pub const ERROR_MARKER: &str = "❌ Error:";
pub const EMPTY_RESPONSE: &str = "No response received.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ReportPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<ReportPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<DisambiguationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionPrompt>,
    #[serde(default)]
    pub is_error: bool,
    pub created_at: i64,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            retry_count: None,
            comparison: None,
            visualization: None,
            raw_data: None,
            disambiguation: None,
            correction: None,
            is_error: false,
            created_at: unix_ms(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    pub fn error(reason: &str) -> Self {
        let mut msg = Self::new(Role::Assistant, error_text(reason));
        msg.is_error = true;
        msg
    }

    /// The payload a renderer should pick up first.
    pub fn report(&self) -> Option<&ReportPayload> {
        self.comparison.as_ref().or(self.visualization.as_ref())
    }

    /// A disambiguation question with no option picked yet.
    pub fn pending_question(&self) -> bool {
        self.disambiguation
            .as_ref()
            .is_some_and(|d| !d.is_loading && d.selected.is_none())
    }

    pub fn awaiting_choice(&self) -> bool {
        let pending_correction = self
            .correction
            .as_ref()
            .is_some_and(|c| c.answered.is_none());
        self.pending_question() || pending_correction
    }
}

pub fn error_text(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        format!("{} unknown error", ERROR_MARKER)
    } else {
        format!("{} {}", ERROR_MARKER, reason)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub node: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisambiguationOption {
    pub label: String,
    pub query: String,
    #[serde(default, alias = "tool_name", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisambiguationData {
    pub question: String,
    pub options: Vec<DisambiguationOption>,
    pub original_query: String,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
}

/// Yes/no follow-up offered when the backend found no canonical match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionPrompt {
    pub alternative_type: String,
    pub original_query: String,
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered: Option<bool>,
}

/// Notifications published by a chat surface while a query runs.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    QueryBegin,
    Progress(Vec<AgentStep>),
    Delta(String),
    MessageAdded(String),
    MessageUpdated(String),
    QueryEnd { ok: bool },
}
