// Shared helpers for chat surface tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deckchat::api::{EventStream, QueryTransport};
use deckchat::error::{ClientError, Result};
use deckchat::types::StreamEvent;
use deckchat::{ChatSurface, SurfaceMode};
use futures::stream::{self, StreamExt};
use serde_json::Value;

/// What the transport does for one `open` call.
pub enum Script {
    /// Yields the events, then ends.
    Events(Vec<Result<StreamEvent>>),
    /// Yields the events, then never yields again.
    EventsThenHang(Vec<Result<StreamEvent>>),
    /// `open` itself fails.
    Refuse(String),
}

/// A `QueryTransport` that replays scripts in order and records queries.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    async fn open(&self, _session_id: &str, query: &str) -> Result<EventStream> {
        self.queries.lock().unwrap().push(query.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Events(Vec::new()));

        match script {
            Script::Events(events) => Ok(stream::iter(events).boxed()),
            Script::EventsThenHang(events) => {
                Ok(stream::iter(events).chain(stream::pending()).boxed())
            }
            Script::Refuse(reason) => Err(ClientError::Stream(reason)),
        }
    }
}

/// Decodes one wire event the way the SSE transport would.
pub fn ev(value: Value) -> Result<StreamEvent> {
    Ok(serde_json::from_value(value).unwrap())
}

pub fn surface_with(transport: Arc<ScriptedTransport>, stall: Duration) -> Arc<ChatSurface> {
    let surface = Arc::new(ChatSurface::new(transport, stall));
    surface.attach_session(
        "session-1",
        SurfaceMode::Single {
            deck: Some("DEC_TEST".to_string()),
        },
    );
    surface
}

pub fn surface(transport: Arc<ScriptedTransport>) -> Arc<ChatSurface> {
    surface_with(transport, Duration::from_secs(5))
}

/// Polls until the surface reports a query in flight.
pub async fn wait_until_loading(surface: &ChatSurface) {
    for _ in 0..200 {
        if surface.is_loading() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("query never started");
}
