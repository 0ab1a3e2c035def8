use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::protocol::raw::RawEvent;
use crate::transport::{RawEventStream, Transport, TransportError, TurnConfig};

/// Plays back a recorded event sequence for every turn it opens.
///
/// Recordings are JSON Lines, one raw event per line; blank lines and lines
/// starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    events: Arc<Vec<RawEvent>>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl ReplayTransport {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events: Arc::new(events),
            delay: None,
            failure: None,
        }
    }

    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_jsonl_str(&contents)
    }

    pub fn from_jsonl_str(contents: &str) -> Result<Self, TransportError> {
        let mut events = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event = RawEvent::from_json(line).map_err(|e| {
                TransportError::Stream(format!("recording line {}: {e}", index + 1))
            })?;
            events.push(event);
        }
        Ok(Self::new(events))
    }

    /// Pause between events, for watching a recording render live.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Ends the stream with a transport error once the recording runs out.
    pub fn failing_after(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn open(
        &self,
        config: TurnConfig,
        token: CancellationToken,
    ) -> Result<RawEventStream, TransportError> {
        tracing::debug!(
            target: "turnstream::transport::replay",
            run_id = %config.turn_id,
            events = self.events.len(),
            "Replaying recording"
        );

        let events = Arc::clone(&self.events);
        let delay = self.delay;
        let failure = self.failure.clone();

        let stream = async_stream::stream! {
            let mut cancelled = false;
            for event in events.iter() {
                cancelled = match delay {
                    Some(delay) => tokio::select! {
                        biased;
                        () = token.cancelled() => true,
                        () = tokio::time::sleep(delay) => false,
                    },
                    None => token.is_cancelled(),
                };
                if cancelled {
                    break;
                }
                yield Ok(event.clone());
            }
            if cancelled {
                yield Err(TransportError::Cancelled);
            } else if let Some(message) = failure {
                yield Err(TransportError::Stream(message));
            }
        };

        Ok(Box::pin(stream))
    }
}
