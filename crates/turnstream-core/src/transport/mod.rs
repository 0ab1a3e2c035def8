//! The collaborator that opens a turn against the remote agent and yields
//! its raw events. Everything here is I/O; the reducer never sees it.

use async_trait::async_trait;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::state::Message;
use crate::domain::types::{ThreadId, TurnId};
use crate::protocol::raw::RawEvent;
use crate::protocol::request::RunRequest;

pub mod error;
pub mod http;
pub mod replay;
pub mod sse;

pub use error::{SseParseError, TransportError};
pub use http::HttpTransport;
pub use replay::ReplayTransport;

pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent, TransportError>> + Send>>;

/// What the transport needs to open one turn.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub thread_id: ThreadId,
    pub turn_id: TurnId,
    /// Conversation so far, including the user message that opened the turn.
    pub history: Vec<Arc<Message>>,
}

impl TurnConfig {
    pub fn run_request(&self) -> RunRequest {
        RunRequest::from_history(
            &self.thread_id,
            &self.turn_id,
            self.history.iter().map(|m| &**m),
        )
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Opens the turn and returns its event stream. Cancelling `token` asks
    /// the transport to stop; it may still yield events already in flight.
    async fn open(
        &self,
        config: TurnConfig,
        token: CancellationToken,
    ) -> Result<RawEventStream, TransportError>;
}
