// src/state.rs

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::types::{AgentStep, Message};

pub fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
    AwaitingChoice,
}

/// Everything a chat surface shows: the message list plus the live
/// progress of the query in flight.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub steps: Vec<AgentStep>,
    pub streaming_text: String,
    pub is_loading: bool,
    pub is_streaming: bool,
    /// Message whose disambiguation option is currently being resolved.
    pub active_disambiguation: Option<String>,
    /// Bumped whenever the message list is wiped; runs started under an
    /// older epoch must not write into the new list.
    pub epoch: u64,
}

impl ChatState {
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Streaming
        } else if self.messages.iter().any(Message::awaiting_choice) {
            Phase::AwaitingChoice
        } else {
            Phase::Idle
        }
    }

    pub fn push_message(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Applies `f` to the message with `id`; returns false if it is gone.
    pub fn update_message<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                f(message);
                true
            }
            None => false,
        }
    }

    pub fn step_mut(&mut self, node: &str) -> Option<&mut AgentStep> {
        self.steps.iter_mut().find(|s| s.node == node)
    }

    pub fn loading_disambiguations(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.disambiguation.as_ref().is_some_and(|d| d.is_loading))
            .count()
    }

    /// Drops all in-flight progress. Leaves the message list alone.
    pub fn reset_progress(&mut self) {
        self.steps.clear();
        self.streaming_text.clear();
        self.is_loading = false;
        self.is_streaming = false;
        if let Some(id) = self.active_disambiguation.take() {
            self.update_message(&id, |m| {
                if let Some(data) = m.disambiguation.as_mut() {
                    data.is_loading = false;
                }
            });
        }
    }

    pub fn clear(&mut self) {
        self.reset_progress();
        self.messages.clear();
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisambiguationData, DisambiguationOption};

    fn pending(loading: bool) -> Message {
        let mut msg = Message::assistant("");
        msg.disambiguation = Some(DisambiguationData {
            question: "Which deck?".to_string(),
            options: vec![DisambiguationOption {
                label: "A".to_string(),
                query: "a".to_string(),
                tool_name: None,
            }],
            original_query: "q".to_string(),
            is_loading: loading,
            selected: None,
        });
        msg
    }

    #[test]
    fn phase_follows_flags_and_pending_choices() {
        let mut state = ChatState::default();
        assert_eq!(state.phase(), Phase::Idle);

        state.push_message(pending(false));
        assert_eq!(state.phase(), Phase::AwaitingChoice);

        state.is_loading = true;
        assert_eq!(state.phase(), Phase::Streaming);
    }

    #[test]
    fn update_message_reports_missing_ids() {
        let mut state = ChatState::default();
        let id = state.push_message(Message::user("hi"));
        assert!(state.update_message(&id, |m| m.content.push('!')));
        assert_eq!(state.message(&id).unwrap().content, "hi!");
        assert!(!state.update_message("nope", |_| {}));
    }

    #[test]
    fn reset_progress_releases_active_disambiguation() {
        let mut state = ChatState::default();
        let id = state.push_message(pending(true));
        state.active_disambiguation = Some(id.clone());
        state.is_loading = true;

        state.reset_progress();

        assert!(!state.is_loading);
        assert!(state.active_disambiguation.is_none());
        assert_eq!(state.loading_disambiguations(), 0);
    }

    #[test]
    fn clear_bumps_epoch() {
        let mut state = ChatState::default();
        state.push_message(Message::user("hi"));
        state.clear();
        assert!(state.messages.is_empty());
        assert_eq!(state.epoch, 1);
    }
}
