// src/api/stream.rs

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest_eventsource::{retry::Never, Event, EventSource};
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};
use crate::types::{QueryArgs, StreamEvent};

pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Opens the event stream answering one query.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn open(&self, session_id: &str, query: &str) -> Result<EventStream>;
}

#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    Event(StreamEvent),
    Done,
    Skip,
}

pub(crate) fn decode_frame(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == "[DONE]" {
        return Frame::Done;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Frame::Event(event),
        Err(e) => {
            warn!(error = %e, "skipping undecodable stream frame");
            debug!(frame = data, "undecodable frame body");
            Frame::Skip
        }
    }
}

/// SSE transport over `POST /api/query/stream`.
#[derive(Clone, Debug)]
pub struct SseTransport {
    http: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QueryTransport for SseTransport {
    async fn open(&self, session_id: &str, query: &str) -> Result<EventStream> {
        let request_builder = self
            .http
            .post(format!("{}/api/query/stream", self.base_url))
            .header("Content-Type", "application/json")
            .json(&QueryArgs { session_id, query });

        let mut es =
            EventSource::new(request_builder).map_err(|e| ClientError::Stream(e.to_string()))?;
        // A failed query must surface once, not be silently replayed.
        es.set_retry_policy(Box::new(Never));

        let events = stream::unfold(Some(es), |state| async move {
            let mut es = state?;
            loop {
                match es.next().await {
                    None => return None,
                    Some(Ok(Event::Open)) => debug!("query stream opened"),
                    Some(Ok(Event::Message(msg))) => match decode_frame(&msg.data) {
                        Frame::Event(event) => return Some((Ok(event), Some(es))),
                        Frame::Done => {
                            es.close();
                            return None;
                        }
                        Frame::Skip => {}
                    },
                    Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                        es.close();
                        return None;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "query stream failed");
                        es.close();
                        return Some((Err(ClientError::Stream(e.to_string())), None));
                    }
                }
            }
        });

        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_marker_ends_stream() {
        assert_eq!(decode_frame("[DONE]"), Frame::Done);
        assert_eq!(decode_frame("  [DONE]\n"), Frame::Done);
    }

    #[test]
    fn bad_frames_are_skipped() {
        assert_eq!(decode_frame("not json"), Frame::Skip);
        assert_eq!(decode_frame(""), Frame::Skip);
        assert_eq!(
            decode_frame(r#"{"type":"retry","retry_count":"two"}"#),
            Frame::Skip
        );
    }

    #[test]
    fn events_decode() {
        assert_eq!(
            decode_frame(r#"{"type":"complete"}"#),
            Frame::Event(StreamEvent::Complete(Default::default()))
        );
    }
}
