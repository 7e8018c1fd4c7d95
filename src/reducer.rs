// src/reducer.rs
//
// Folds the events of one query stream into `ChatState`. A `QueryRun`
// owns the accumulators for exactly one stream; `apply` is called per
// event in arrival order and `finish` performs the single terminal
// message write.

use tracing::debug;

use crate::state::ChatState;
use crate::types::{
    AgentStep, CompletionEvent, CorrectionPrompt, DisambiguationData, DisambiguationEvent,
    Message, NodeEvent, ReportPayload, RetryEvent, Row, StepStatus, StreamEvent, SurfaceEvent,
    EMPTY_RESPONSE,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryTarget {
    /// A new user turn; the answer becomes a new assistant message.
    Fresh { query: String },
    /// Follow-up to a disambiguation option or correction prompt; the
    /// answer is written into `message_id`.
    Resolution { message_id: String, query: String },
}

impl QueryTarget {
    pub fn query(&self) -> &str {
        match self {
            QueryTarget::Fresh { query } | QueryTarget::Resolution { query, .. } => query,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(String),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done(Outcome),
}

#[derive(Debug)]
pub struct Reduced {
    pub flow: Flow,
    pub notices: Vec<SurfaceEvent>,
}

impl Reduced {
    fn go(notices: Vec<SurfaceEvent>) -> Self {
        Self {
            flow: Flow::Continue,
            notices,
        }
    }

    fn done(outcome: Outcome) -> Self {
        Self {
            flow: Flow::Done(outcome),
            notices: Vec::new(),
        }
    }
}

/// The message mutation performed by [`QueryRun::finish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Added(String),
    Updated(String),
    None,
}

impl Mutation {
    pub fn notice(&self) -> Option<SurfaceEvent> {
        match self {
            Mutation::Added(id) => Some(SurfaceEvent::MessageAdded(id.clone())),
            Mutation::Updated(id) => Some(SurfaceEvent::MessageUpdated(id.clone())),
            Mutation::None => None,
        }
    }
}

#[derive(Debug)]
pub struct QueryRun {
    target: QueryTarget,
    epoch: u64,
    text: String,
    retry_count: u32,
    retry_events: u32,
    comparison: Option<ReportPayload>,
    visualization: Option<ReportPayload>,
    raw_data: Option<Vec<Row>>,
    alternative_type: Option<String>,
    disambiguation_message: Option<String>,
}

impl QueryRun {
    pub fn new(target: QueryTarget, epoch: u64) -> Self {
        Self {
            target,
            epoch,
            text: String::new(),
            retry_count: 0,
            retry_events: 0,
            comparison: None,
            visualization: None,
            raw_data: None,
            alternative_type: None,
            disambiguation_message: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_stale(&self, state: &ChatState) -> bool {
        state.epoch != self.epoch
    }

    pub fn target(&self) -> &QueryTarget {
        &self.target
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
            || self.comparison.is_some()
            || self.visualization.is_some()
            || self.raw_data.is_some()
            || self.disambiguation_message.is_some()
    }

    pub fn apply(&mut self, state: &mut ChatState, event: StreamEvent) -> Reduced {
        debug!(event = event.kind(), "stream event");
        match event {
            StreamEvent::Start => {
                state.steps.clear();
                state.streaming_text.clear();
                self.text.clear();
                Reduced::go(vec![SurfaceEvent::Progress(Vec::new())])
            }
            StreamEvent::NodeStart(node) => self.node_start(state, node),
            StreamEvent::NodeDetail(node) => {
                let Some(id) = node.node.as_deref() else {
                    return Reduced::go(Vec::new());
                };
                let detail = node.detail.or(node.description);
                match state.step_mut(id) {
                    Some(step) => {
                        step.detail = detail;
                        Reduced::go(vec![SurfaceEvent::Progress(state.steps.clone())])
                    }
                    None => Reduced::go(Vec::new()),
                }
            }
            StreamEvent::NodeComplete(node) => {
                let Some(id) = node.node.as_deref() else {
                    return Reduced::go(Vec::new());
                };
                match state.step_mut(id) {
                    Some(step) => {
                        step.status = StepStatus::Completed;
                        Reduced::go(vec![SurfaceEvent::Progress(state.steps.clone())])
                    }
                    None => Reduced::go(Vec::new()),
                }
            }
            StreamEvent::Retry(retry) => self.retry(state, retry),
            StreamEvent::ResponseStart => {
                state.is_streaming = true;
                Reduced::go(Vec::new())
            }
            StreamEvent::ResponseChunk(chunk) => match chunk.chunk {
                Some(piece) if !piece.is_empty() => {
                    self.text.push_str(&piece);
                    state.streaming_text.push_str(&piece);
                    state.is_streaming = true;
                    Reduced::go(vec![SurfaceEvent::Delta(piece)])
                }
                _ => Reduced::go(Vec::new()),
            },
            StreamEvent::ResponseComplete(body) => {
                self.fold_completion(state, body);
                Reduced::go(Vec::new())
            }
            StreamEvent::Disambiguation(body) => self.disambiguation(state, body),
            StreamEvent::Complete(body) => {
                self.fold_completion(state, body);
                Reduced::done(Outcome::Success)
            }
            StreamEvent::Error(err) => Reduced::done(Outcome::Failed(
                err.message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "the backend reported an error".to_string()),
            )),
            StreamEvent::Unknown => Reduced::go(Vec::new()),
        }
    }

    fn node_start(&mut self, state: &mut ChatState, node: NodeEvent) -> Reduced {
        let Some(id) = node.node else {
            return Reduced::go(Vec::new());
        };
        match state.step_mut(&id) {
            Some(step) => {
                step.status = StepStatus::Running;
                if let Some(name) = node.name {
                    step.name = name;
                }
                if let Some(description) = node.description {
                    step.description = description;
                }
            }
            None => state.steps.push(AgentStep {
                name: node.name.unwrap_or_else(|| id.clone()),
                node: id,
                icon: node.icon.unwrap_or_default(),
                description: node.description.unwrap_or_default(),
                detail: node.detail,
                status: StepStatus::Running,
            }),
        }
        Reduced::go(vec![SurfaceEvent::Progress(state.steps.clone())])
    }

    fn retry(&mut self, state: &mut ChatState, retry: RetryEvent) -> Reduced {
        let reported = retry.retry_count.unwrap_or(self.retry_count + 1);
        self.retry_count = self.retry_count.max(reported);
        self.retry_events += 1;

        let name = match retry.max_retries {
            Some(max) => format!("Retry {}/{}", self.retry_count, max),
            None => format!("Retry {}", self.retry_count),
        };
        state.steps.push(AgentStep {
            node: format!("retry-{}", self.retry_events),
            name,
            icon: "🔄".to_string(),
            description: retry.reason.unwrap_or_default(),
            detail: None,
            status: StepStatus::Running,
        });
        Reduced::go(vec![SurfaceEvent::Progress(state.steps.clone())])
    }

    fn fold_completion(&mut self, state: &mut ChatState, body: CompletionEvent) {
        if let Some(response) = body.response.filter(|r| !r.trim().is_empty()) {
            state.streaming_text = response.clone();
            self.text = response;
        }
        if body.comparison_data.is_some() {
            self.comparison = body.comparison_data;
        }
        if body.visualization_data.is_some() {
            self.visualization = body.visualization_data;
        }
        if body.raw_data.is_some() {
            self.raw_data = body.raw_data;
        }
        if body.requires_user_choice {
            self.alternative_type = Some(body.alternative_type.unwrap_or_default());
        }
    }

    fn disambiguation(&mut self, state: &mut ChatState, body: DisambiguationEvent) -> Reduced {
        let data = DisambiguationData {
            question: body.question.unwrap_or_default(),
            options: body.options,
            original_query: body
                .original_query
                .unwrap_or_else(|| self.target.query().to_string()),
            is_loading: false,
            selected: None,
        };

        let existing = match &self.target {
            QueryTarget::Resolution { message_id, .. } => Some(message_id.clone()),
            QueryTarget::Fresh { .. } => self.disambiguation_message.clone(),
        };

        if let Some(id) = existing {
            if state.active_disambiguation.as_deref() == Some(id.as_str()) {
                state.active_disambiguation = None;
            }
            let replaced = state.update_message(&id, |m| {
                m.content.clear();
                m.disambiguation = Some(data.clone());
            });
            if replaced {
                self.disambiguation_message = Some(id.clone());
                return Reduced::go(vec![SurfaceEvent::MessageUpdated(id)]);
            }
        }

        let mut message = Message::assistant("");
        message.disambiguation = Some(data);
        let id = state.push_message(message);
        self.disambiguation_message = Some(id.clone());
        Reduced::go(vec![SurfaceEvent::MessageAdded(id)])
    }

    fn content(&self) -> String {
        if self.text.trim().is_empty()
            && self.comparison.is_none()
            && self.visualization.is_none()
            && self.raw_data.is_none()
        {
            EMPTY_RESPONSE.to_string()
        } else {
            self.text.clone()
        }
    }

    fn correction(&self) -> Option<CorrectionPrompt> {
        self.alternative_type
            .as_ref()
            .map(|alternative_type| CorrectionPrompt {
                alternative_type: alternative_type.clone(),
                original_query: self.target.query().to_string(),
                response_text: self.text.clone(),
                answered: None,
            })
    }

    fn fill(&self, message: &mut Message) {
        message.content = self.content();
        message.is_error = false;
        message.retry_count = (self.retry_count > 0).then_some(self.retry_count);
        message.comparison = self.comparison.clone();
        message.visualization = self.visualization.clone();
        message.raw_data = self.raw_data.clone();
        // an answered prompt stays on record unless a new one replaces it
        let answered = message.correction.take().filter(|c| c.answered.is_some());
        message.correction = self.correction().or(answered);
    }

    /// Writes the terminal message and returns the surface to idle. Runs
    /// exactly once per query, whatever the outcome.
    ///
    /// A run from before the last clear touches nothing: the progress
    /// fields may already belong to a newer query.
    pub fn finish(self, state: &mut ChatState, outcome: Outcome) -> Mutation {
        if self.is_stale(state) {
            debug!("chat was cleared while the query ran; dropping result");
            return Mutation::None;
        }
        state.reset_progress();

        let reason = match outcome {
            Outcome::Success => None,
            Outcome::Failed(reason) => Some(reason),
            Outcome::Cancelled => Some("query cancelled".to_string()),
        };

        match (&self.target, reason) {
            (QueryTarget::Fresh { .. }, None) => {
                if let Some(id) = &self.disambiguation_message {
                    return Mutation::Updated(id.clone());
                }
                let mut message = Message::assistant(String::new());
                self.fill(&mut message);
                Mutation::Added(state.push_message(message))
            }
            (QueryTarget::Fresh { .. }, Some(reason)) => {
                Mutation::Added(state.push_message(Message::error(&reason)))
            }
            (QueryTarget::Resolution { message_id, .. }, None) => {
                let reopened = self.disambiguation_message.as_deref() == Some(message_id.as_str());
                let updated = state.update_message(message_id, |m| {
                    if reopened {
                        return;
                    }
                    self.fill(m);
                    if let Some(data) = m.disambiguation.as_mut() {
                        data.is_loading = false;
                    }
                });
                if updated {
                    Mutation::Updated(message_id.clone())
                } else {
                    let mut message = Message::assistant(String::new());
                    self.fill(&mut message);
                    Mutation::Added(state.push_message(message))
                }
            }
            (QueryTarget::Resolution { message_id, .. }, Some(reason)) => {
                let error = Message::error(&reason);
                let updated = state.update_message(message_id, |m| {
                    m.content = error.content.clone();
                    m.is_error = true;
                    m.disambiguation = None;
                });
                if updated {
                    Mutation::Updated(message_id.clone())
                } else {
                    Mutation::Added(state.push_message(error))
                }
            }
        }
    }
}
