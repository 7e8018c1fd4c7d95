// src/api/client.rs

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::api::stream::SseTransport;
use crate::error::{ClientError, Result};
use crate::types::{
    ComparisonInitArgs, ComparisonSession, DeckInfo, DeckList, LoadDeckArgs, ReindexResult,
    SessionInfo,
};

/// Session and deck endpoints of the query backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A streaming transport for the same backend. It gets its own client
    /// because the request timeout here would cut long streams short.
    pub fn stream_transport(&self) -> Result<SseTransport> {
        SseTransport::new(&self.base_url)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let resp = Self::check(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn health(&self) -> Result<()> {
        let resp = self.http.get(self.url("/health")).send().await?;
        Self::check(resp).await.map(|_| ())
    }

    pub async fn list_decks(&self) -> Result<Vec<DeckInfo>> {
        let resp = self.http.get(self.url("/api/decks")).send().await?;
        let list: DeckList = Self::json(resp).await?;
        debug!(count = list.decks.len(), "listed decks");
        Ok(list.decks)
    }

    pub async fn load_deck(&self, deck_name: &str) -> Result<SessionInfo> {
        let resp = self
            .http
            .post(self.url("/api/sessions/load-deck"))
            .json(&LoadDeckArgs { deck_name })
            .send()
            .await?;
        let mut session: SessionInfo = Self::json(resp).await?;
        if session.deck.is_none() {
            session.deck = Some(deck_name.to_string());
        }
        info!(session = %session.session_id, deck = deck_name, files = session.files_loaded, "deck loaded");
        Ok(session)
    }

    pub async fn upload_deck(&self, path: &Path) -> Result<SessionInfo> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "deck.zip".to_string());

        let part = Part::bytes(bytes).file_name(file_name.clone());
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url("/api/sessions/upload"))
            .multipart(form)
            .send()
            .await?;
        let mut session: SessionInfo = Self::json(resp).await?;
        if session.deck.is_none() {
            session.deck = Some(file_name);
        }
        info!(session = %session.session_id, files = session.files_loaded, "deck uploaded");
        Ok(session)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!(
                "/api/sessions/{}",
                urlencoding::encode(session_id)
            )))
            .send()
            .await?;
        Self::check(resp).await?;
        info!(session = session_id, "session deleted");
        Ok(())
    }

    pub async fn reindex_docs(&self) -> Result<ReindexResult> {
        let resp = self.http.post(self.url("/api/docs/reindex")).send().await?;
        let result: ReindexResult = Self::json(resp).await?;
        info!(documents = result.documents_processed, "documentation reindexed");
        Ok(result)
    }

    pub async fn init_comparison(&self, decks: &[String]) -> Result<ComparisonSession> {
        if decks.len() < 2 {
            return Err(ClientError::InvalidSelection(
                "comparison needs at least two decks".to_string(),
            ));
        }
        let resp = self
            .http
            .post(self.url("/api/comparison/init"))
            .json(&ComparisonInitArgs { decks })
            .send()
            .await?;
        let mut session: ComparisonSession = Self::json(resp).await?;
        if session.selected_decks.is_empty() {
            session.selected_decks = decks.to_vec();
        }
        info!(session = %session.session_id, decks = ?session.selected_decks, "comparison session ready");
        Ok(session)
    }
}
