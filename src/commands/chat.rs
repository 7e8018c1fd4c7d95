// src/commands/chat.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::QueryTransport;
use crate::commands::streaming::{lock, StreamContext};
use crate::disambiguation::alternative_query;
use crate::error::{ClientError, Result};
use crate::reducer::{Mutation, QueryRun, QueryTarget};
use crate::state::{ChatState, Phase};
use crate::types::{CorrectionPrompt, Message, SurfaceEvent};

const EVENT_CAPACITY: usize = 256;

/// Which decks the surface is answering against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceMode {
    Single { deck: Option<String> },
    Comparison { decks: Vec<String> },
}

/// One chat surface: the message list plus at most one query in flight.
/// Single-deck and comparison chats share this type.
pub struct ChatSurface {
    state: Arc<Mutex<ChatState>>,
    transport: Arc<dyn QueryTransport>,
    events: broadcast::Sender<SurfaceEvent>,
    session_id: Mutex<Option<String>>,
    mode: Mutex<SurfaceMode>,
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
    serial: AtomicU64,
    stall_timeout: Duration,
}

impl ChatSurface {
    pub fn new(transport: Arc<dyn QueryTransport>, stall_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ChatState::default())),
            transport,
            events,
            session_id: Mutex::new(None),
            mode: Mutex::new(SurfaceMode::Single { deck: None }),
            in_flight: Mutex::new(None),
            serial: AtomicU64::new(0),
            stall_timeout,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    pub fn attach_session(&self, session_id: impl Into<String>, mode: SurfaceMode) {
        let session_id = session_id.into();
        info!(session = %session_id, ?mode, "chat attached to session");
        *self.session_id.lock().unwrap_or_else(|p| p.into_inner()) = Some(session_id);
        *self.mode.lock().unwrap_or_else(|p| p.into_inner()) = mode;
    }

    /// Cancels anything in flight and forgets the session. Results of the
    /// cancelled query are dropped.
    pub fn detach_session(&self) {
        self.cancel_query();
        lock(&self.state).clear();
        *self.session_id.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn snapshot(&self) -> ChatState {
        lock(&self.state).clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        lock(&self.state).message(id).cloned()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    /// Requests cancellation of the query in flight. Returns whether
    /// there was one.
    pub fn cancel_query(&self) -> bool {
        match self
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
        {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wipes the message list. A query still running is cancelled and
    /// its result discarded.
    pub fn clear(&self) {
        self.cancel_query();
        lock(&self.state).clear();
        debug!("chat cleared");
    }

    /// Marks the surface busy and runs `prepare` under the same lock, so
    /// two submissions can never both pass the check.
    fn begin<F>(&self, prepare: F) -> Result<Ticket>
    where
        F: FnOnce(&mut ChatState) -> Result<()>,
    {
        let mut state = lock(&self.state);
        if state.is_loading {
            return Err(ClientError::Busy);
        }
        prepare(&mut state)?;
        state.is_loading = true;

        let ticket = Ticket {
            serial: self.serial.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
            epoch: state.epoch,
        };
        *self.in_flight.lock().unwrap_or_else(|p| p.into_inner()) =
            Some((ticket.serial, ticket.token.clone()));
        Ok(ticket)
    }

    async fn run(&self, session_id: &str, target: QueryTarget, ticket: Ticket) -> Mutation {
        let ctx = StreamContext {
            transport: self.transport.as_ref(),
            state: &self.state,
            events: &self.events,
            stall_timeout: self.stall_timeout,
        };
        let mutation = ctx
            .drive(session_id, QueryRun::new(target, ticket.epoch), ticket.token)
            .await;

        // a newer query may already own the slot
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if matches!(in_flight.as_ref(), Some((serial, _)) if *serial == ticket.serial) {
            *in_flight = None;
        }
        mutation
    }

    fn require_session(&self) -> Result<String> {
        self.session_id().ok_or(ClientError::NoSession)
    }

    /// Sends a fresh user query. Rejected with `Busy` while another query
    /// is in flight.
    pub async fn submit_query(&self, query: &str) -> Result<Mutation> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClientError::InvalidSelection("query is empty".to_string()));
        }
        let session_id = self.require_session()?;

        let ticket = self.begin(|state| {
            state.push_message(Message::user(query));
            Ok(())
        })?;
        info!(query, "query submitted");

        Ok(self
            .run(
                &session_id,
                QueryTarget::Fresh {
                    query: query.to_string(),
                },
                ticket,
            )
            .await)
    }

    /// Resolves a disambiguation by running the chosen option's query. The
    /// answer is written into the same message.
    pub async fn select_option(&self, message_id: &str, index: usize) -> Result<Mutation> {
        let session_id = self.require_session()?;
        let mut option_query = String::new();

        let ticket = self.begin(|state| {
            if let Some(active) = &state.active_disambiguation {
                return Err(ClientError::InvalidSelection(format!(
                    "message {} is still resolving",
                    active
                )));
            }
            let message = state
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| ClientError::InvalidSelection(format!("no message {}", message_id)))?;
            let data = message
                .disambiguation
                .as_mut()
                .filter(|d| !d.is_loading && d.selected.is_none())
                .ok_or_else(|| {
                    ClientError::InvalidSelection("message has no pending question".to_string())
                })?;
            let option = data.options.get(index).ok_or_else(|| {
                ClientError::InvalidSelection(format!("no option {}", index + 1))
            })?;

            option_query = option.query.clone();
            data.is_loading = true;
            data.selected = Some(index);
            state.active_disambiguation = Some(message_id.to_string());
            Ok(())
        })?;
        info!(message = message_id, option = index, "disambiguation option selected");
        let _ = self
            .events
            .send(SurfaceEvent::MessageUpdated(message_id.to_string()));

        Ok(self
            .run(
                &session_id,
                QueryTarget::Resolution {
                    message_id: message_id.to_string(),
                    query: option_query,
                },
                ticket,
            )
            .await)
    }

    /// Answers a correction prompt. "No" only records the answer; "yes"
    /// resubmits an adjusted query into the same message.
    pub async fn answer_correction(&self, message_id: &str, accept: bool) -> Result<Mutation> {
        if !accept {
            {
                let mut state = lock(&self.state);
                open_correction(&mut state, message_id)?.answered = Some(false);
            }
            debug!(message = message_id, "correction declined");
            let _ = self
                .events
                .send(SurfaceEvent::MessageUpdated(message_id.to_string()));
            return Ok(Mutation::Updated(message_id.to_string()));
        }

        let session_id = self.require_session()?;
        let mut follow_up = String::new();

        let ticket = self.begin(|state| {
            let correction = open_correction(state, message_id)?;
            correction.answered = Some(true);
            follow_up = alternative_query(
                &correction.original_query,
                &correction.response_text,
                &correction.alternative_type,
            );
            Ok(())
        })?;
        info!(message = message_id, query = %follow_up, "correction accepted");

        Ok(self
            .run(
                &session_id,
                QueryTarget::Resolution {
                    message_id: message_id.to_string(),
                    query: follow_up,
                },
                ticket,
            )
            .await)
    }
}

struct Ticket {
    serial: u64,
    token: CancellationToken,
    epoch: u64,
}

fn open_correction<'s>(
    state: &'s mut ChatState,
    message_id: &str,
) -> Result<&'s mut CorrectionPrompt> {
    state
        .messages
        .iter_mut()
        .find(|m| m.id == message_id)
        .ok_or_else(|| ClientError::InvalidSelection(format!("no message {}", message_id)))?
        .correction
        .as_mut()
        .filter(|c| c.answered.is_none())
        .ok_or_else(|| ClientError::InvalidSelection("message has no open prompt".to_string()))
}

impl Drop for ChatSurface {
    fn drop(&mut self) {
        self.cancel_query();
    }
}
