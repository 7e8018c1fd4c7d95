// src/types/session.rs

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub files_loaded: usize,
    #[serde(default)]
    pub file_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSession {
    pub session_id: String,
    #[serde(default)]
    pub selected_decks: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
}

impl DeckInfo {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Deserialize)]
pub struct DeckList {
    #[serde(default)]
    pub decks: Vec<DeckInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexResult {
    #[serde(default)]
    pub documents_processed: usize,
}

#[derive(Serialize)]
pub struct LoadDeckArgs<'a> {
    pub deck_name: &'a str,
}

#[derive(Serialize)]
pub struct ComparisonInitArgs<'a> {
    pub decks: &'a [String],
}

#[derive(Serialize)]
pub struct QueryArgs<'a> {
    pub session_id: &'a str,
    pub query: &'a str,
}
