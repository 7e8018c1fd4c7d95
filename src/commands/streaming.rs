// src/commands/streaming.rs

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::api::QueryTransport;
use crate::reducer::{Flow, Mutation, Outcome, QueryRun};
use crate::state::ChatState;
use crate::types::SurfaceEvent;

pub(crate) fn lock(state: &Mutex<ChatState>) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held for the lifetime of one stream consumption. Dropping it always
/// returns the surface to idle, even if the consuming future is dropped
/// half way or unwinds.
/// Only resets a surface that has not been cleared since the query began.
pub(crate) struct InFlight {
    state: Arc<Mutex<ChatState>>,
    epoch: u64,
}

impl InFlight {
    pub(crate) fn new(state: Arc<Mutex<ChatState>>, epoch: u64) -> Self {
        Self { state, epoch }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.is_loading && state.epoch == self.epoch {
            warn!("query ended without a terminal write; resetting progress");
            state.reset_progress();
        }
    }
}

pub(crate) struct StreamContext<'a> {
    pub transport: &'a dyn QueryTransport,
    pub state: &'a Arc<Mutex<ChatState>>,
    pub events: &'a broadcast::Sender<SurfaceEvent>,
    pub stall_timeout: Duration,
}

impl StreamContext<'_> {
    fn emit(&self, event: SurfaceEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Consumes one query stream to the end and performs the terminal
    /// write. The caller must already have set `is_loading`.
    pub(crate) async fn drive(
        &self,
        session_id: &str,
        mut run: QueryRun,
        cancel: CancellationToken,
    ) -> Mutation {
        let _guard = InFlight::new(self.state.clone(), run.epoch());
        self.emit(SurfaceEvent::QueryBegin);

        let outcome = self.consume(session_id, &mut run, &cancel).await;
        let ok = outcome == Outcome::Success;
        if let Outcome::Failed(reason) = &outcome {
            error!(reason = %reason, query = run.target().query(), "query failed");
        }

        let mutation = {
            let mut state = lock(self.state);
            run.finish(&mut state, outcome)
        };

        if let Some(notice) = mutation.notice() {
            self.emit(notice);
        }
        self.emit(SurfaceEvent::QueryEnd { ok });
        mutation
    }

    async fn consume(
        &self,
        session_id: &str,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Outcome {
        let query = run.target().query().to_string();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            opened = self.transport.open(session_id, &query) => match opened {
                Ok(stream) => stream,
                Err(e) => return Outcome::Failed(e.to_string()),
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("query cancelled");
                    return Outcome::Cancelled;
                }
                next = tokio::time::timeout(self.stall_timeout, stream.next()) => next,
            };

            let event = match next {
                Err(_) => {
                    warn!(
                        timeout = ?self.stall_timeout,
                        "no stream event within the stall timeout"
                    );
                    return Outcome::Failed(format!(
                        "no response from the backend for {:?}",
                        self.stall_timeout
                    ));
                }
                Ok(None) => {
                    if run.has_content() {
                        return Outcome::Success;
                    }
                    return Outcome::Failed(
                        "the stream ended before a response arrived".to_string(),
                    );
                }
                Ok(Some(Err(e))) => return Outcome::Failed(e.to_string()),
                Ok(Some(Ok(event))) => event,
            };

            let reduced = {
                let mut state = lock(self.state);
                if run.is_stale(&state) {
                    return Outcome::Cancelled;
                }
                run.apply(&mut state, event)
            };
            for notice in reduced.notices {
                self.emit(notice);
            }
            if let Flow::Done(outcome) = reduced.flow {
                return outcome;
            }
        }
    }
}
