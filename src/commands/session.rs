// src/commands/session.rs

use std::path::Path;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::api::BackendClient;
use crate::commands::chat::SurfaceMode;
use crate::error::{ClientError, Result};
use crate::types::{ComparisonSession, DeckInfo, ReindexResult, SessionInfo};

/// The backend session a chat is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveSession {
    Single(SessionInfo),
    Comparison(ComparisonSession),
}

impl ActiveSession {
    pub fn id(&self) -> &str {
        match self {
            ActiveSession::Single(info) => &info.session_id,
            ActiveSession::Comparison(session) => &session.session_id,
        }
    }

    pub fn mode(&self) -> SurfaceMode {
        match self {
            ActiveSession::Single(info) => SurfaceMode::Single {
                deck: info.deck.clone(),
            },
            ActiveSession::Comparison(session) => SurfaceMode::Comparison {
                decks: session.selected_decks.clone(),
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ActiveSession::Single(info) => format!(
                "deck {} ({} files)",
                info.deck.as_deref().unwrap_or("upload"),
                info.files_loaded
            ),
            ActiveSession::Comparison(session) => {
                format!("comparison of {}", session.selected_decks.join(", "))
            }
        }
    }
}

/// Owns at most one backend session. Opening a new one releases the
/// previous one first.
pub struct SessionManager {
    client: BackendClient,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            active: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub async fn list_decks(&self) -> Result<Vec<DeckInfo>> {
        self.client.list_decks().await
    }

    pub async fn reindex(&self) -> Result<ReindexResult> {
        self.client.reindex_docs().await
    }

    pub async fn open_deck(&self, deck_name: &str) -> Result<ActiveSession> {
        if deck_name.trim().is_empty() {
            return Err(ClientError::InvalidSelection("deck name is empty".to_string()));
        }
        self.close().await;
        let info = self.client.load_deck(deck_name).await?;
        Ok(self.replace(ActiveSession::Single(info)))
    }

    pub async fn open_upload(&self, path: &Path) -> Result<ActiveSession> {
        self.close().await;
        let info = self.client.upload_deck(path).await?;
        Ok(self.replace(ActiveSession::Single(info)))
    }

    pub async fn open_comparison(&self, decks: &[String]) -> Result<ActiveSession> {
        self.close().await;
        let session = self.client.init_comparison(decks).await?;
        Ok(self.replace(ActiveSession::Comparison(session)))
    }

    fn replace(&self, session: ActiveSession) -> ActiveSession {
        info!(session = session.id(), "{}", session.describe());
        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = Some(session.clone());
        session
    }

    /// Deletes the active session on the backend. A failed delete is logged
    /// and forgotten; the backend expires sessions on its own.
    pub async fn close(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(session) = previous {
            if let Err(e) = self.client.delete_session(session.id()).await {
                warn!(session = session.id(), error = %e, "failed to delete session");
            }
        }
    }
}
