use eventsource_stream::EventStreamError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseParseError {
    #[error("UTF-8 error: {details}")]
    Utf8 { details: String },
    #[error("Parse error: {details}")]
    Parser { details: String },
    #[error("Transport error: {details}")]
    Transport { details: String },
}

impl<E> From<EventStreamError<E>> for SseParseError
where
    E: std::error::Error,
{
    fn from(err: EventStreamError<E>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8 {
                details: err.to_string(),
            },
            EventStreamError::Parser(err) => Self::Parser {
                details: err.to_string(),
            },
            EventStreamError::Transport(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Agent endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SSE parse error: {0}")]
    SseParse(#[from] SseParseError),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("No event received within {0:?}")]
    IdleTimeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Message surfaced in the aggregate when this error ends a turn.
    pub fn turn_failure_message(&self) -> String {
        format!("Transport failure: {self}")
    }
}
