use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::protocol::raw::RawEvent;
use crate::transport::sse::{SseEvent, SseStream, parse_sse_stream};
use crate::transport::{RawEventStream, Transport, TransportError, TurnConfig};

const EVENT_STREAM_MIME: &str = "text/event-stream";
const DONE_SENTINEL: &str = "[DONE]";

/// Posts the run request and reads the agent's reply as server-sent events.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    idle_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(endpoint: Url) -> Result<Self, TransportError> {
        Self::from_config(&ClientConfig {
            endpoint: Some(endpoint.to_string()),
            ..ClientConfig::default()
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = config.endpoint_url().map_err(TransportError::InvalidEndpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        for (name, value) in &config.transport.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| TransportError::InvalidEndpoint(format!("header {name}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| TransportError::InvalidEndpoint(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.transport.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            idle_timeout: config.transport.idle_timeout(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(
        &self,
        config: TurnConfig,
        token: CancellationToken,
    ) -> Result<RawEventStream, TransportError> {
        let request = config.run_request();
        tracing::debug!(
            target: "turnstream::transport::http",
            endpoint = %self.endpoint,
            thread_id = %config.thread_id,
            run_id = %config.turn_id,
            messages = request.messages.len(),
            "Opening run"
        );

        let send = self.client.post(self.endpoint.clone()).json(&request).send();
        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(TransportError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let sse = parse_sse_stream(response.bytes_stream());
        Ok(raw_event_stream(sse, self.idle_timeout, token))
    }
}

enum Pull {
    Cancelled,
    TimedOut(Duration),
    Next(Option<Result<SseEvent, TransportError>>),
}

async fn pull_next(sse: &mut SseStream, idle_timeout: Option<Duration>) -> Pull {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, sse.next()).await {
            Ok(next) => Pull::Next(next),
            Err(_) => Pull::TimedOut(limit),
        },
        None => Pull::Next(sse.next().await),
    }
}

/// Decodes SSE frames into raw events, enforcing the idle timeout and
/// stopping on cancellation. Transport errors end the stream.
pub(crate) fn raw_event_stream(
    mut sse: SseStream,
    idle_timeout: Option<Duration>,
    token: CancellationToken,
) -> RawEventStream {
    let stream = async_stream::stream! {
        loop {
            let pull = tokio::select! {
                biased;
                () = token.cancelled() => Pull::Cancelled,
                pull = pull_next(&mut sse, idle_timeout) => pull,
            };

            match pull {
                Pull::Cancelled => {
                    yield Err(TransportError::Cancelled);
                    break;
                }
                Pull::TimedOut(limit) => {
                    yield Err(TransportError::IdleTimeout(limit));
                    break;
                }
                Pull::Next(None) => break,
                Pull::Next(Some(Err(err))) => {
                    yield Err(err);
                    break;
                }
                Pull::Next(Some(Ok(event))) => {
                    if let Some(raw) = decode_sse_event(&event) {
                        yield Ok(raw);
                    }
                }
            }
        }
    };

    Box::pin(stream)
}

/// Turns one SSE frame into a raw event. Frames that are not JSON objects
/// are protocol anomalies: logged and dropped. When the payload has no
/// `type`, the SSE event name stands in for it.
pub(crate) fn decode_sse_event(event: &SseEvent) -> Option<RawEvent> {
    let data = event.data.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    let mut value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(target: "turnstream::transport::http", error = %err, "Dropping non-JSON event payload");
            return None;
        }
    };

    if let (Value::Object(map), Some(event_type)) = (&mut value, &event.event_type)
        && !map.contains_key("type")
    {
        map.insert("type".to_string(), Value::String(event_type.clone()));
    }

    match serde_json::from_value::<RawEvent>(value) {
        Ok(raw) => Some(raw),
        Err(err) => {
            tracing::debug!(target: "turnstream::transport::http", error = %err, "Dropping malformed event payload");
            None
        }
    }
}
