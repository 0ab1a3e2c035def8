use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::domain::effect::TurnOutcome;
use crate::domain::event::{StampedEvent, TurnEvent};
use crate::domain::reduce::reduce;
use crate::domain::state::TurnState;
use crate::domain::types::{NonEmptyString, ThreadId, TurnId, now_millis};
use crate::error::{Error, Result};
use crate::protocol::normalize;
use crate::transport::{Transport, TransportError, TurnConfig};

use super::subscription::{SnapshotEnvelope, SnapshotSubscription};

const SNAPSHOT_BROADCAST_CAPACITY: usize = 256;
const FORWARD_CHANNEL_CAPACITY: usize = 256;

pub const CANCELLED_MESSAGE: &str = "Turn cancelled";
pub const STREAM_ENDED_MESSAGE: &str =
    "Transport failure: stream ended before the turn finished";

enum DriverCmd {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<TurnHandle>>,
    },
    CancelTurn {
        reply: oneshot::Sender<bool>,
    },
    ResetThread {
        reply: oneshot::Sender<ThreadId>,
    },
    ClearError {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Arc<TurnState>>,
    },
    Subscribe {
        reply: oneshot::Sender<SnapshotSubscription>,
    },
    Shutdown,
}

/// What a forwarding task reports about its turn.
enum Forwarded {
    Event(TurnEvent),
    Failed(String),
    Ended,
}

struct ForwardedItem {
    turn_id: TurnId,
    item: Forwarded,
}

/// Returned by [`SessionDriver::submit_user_input`]; resolves once the turn
/// it names is over.
#[derive(Debug)]
pub struct TurnHandle {
    turn_id: TurnId,
    outcome_rx: oneshot::Receiver<TurnOutcome>,
}

impl TurnHandle {
    pub fn turn_id(&self) -> &TurnId {
        &self.turn_id
    }

    pub async fn outcome(self) -> TurnOutcome {
        // The driver only drops the sender when it stops mid-turn.
        self.outcome_rx.await.unwrap_or(TurnOutcome::Cancelled)
    }
}

/// Handle to a running session. Cheap to clone; the session stops when
/// the last handle is dropped or [`SessionDriver::shutdown`] is called.
#[derive(Clone)]
pub struct SessionDriver {
    cmd_tx: mpsc::Sender<DriverCmd>,
}

impl SessionDriver {
    pub fn spawn(transport: Arc<dyn Transport>) -> Self {
        Self::spawn_for_thread(transport, ThreadId::new())
    }

    pub fn spawn_for_thread(transport: Arc<dyn Transport>, thread_id: ThreadId) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = DriverActor::new(transport, TurnState::new(thread_id));

        tokio::spawn(actor.run(cmd_rx));

        Self { cmd_tx }
    }

    async fn request<T>(&self, cmd: impl FnOnce(oneshot::Sender<T>) -> DriverCmd) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(cmd(reply_tx))
            .await
            .map_err(|_| Error::DriverStopped)?;
        reply_rx.await.map_err(|_| Error::DriverStopped)
    }

    /// Starts a turn for `text`. Fails with [`Error::InvalidInput`] when the
    /// text is blank and [`Error::Conflict`] while another turn is active;
    /// neither changes any state.
    pub async fn submit_user_input(&self, text: impl Into<String>) -> Result<TurnHandle> {
        let text = text.into();
        self.request(|reply| DriverCmd::Submit { text, reply })
            .await?
    }

    /// Aborts the active turn. Returns `false` if there was none.
    pub async fn cancel_turn(&self) -> Result<bool> {
        self.request(|reply| DriverCmd::CancelTurn { reply }).await
    }

    /// Cancels any active turn and starts over on a fresh thread.
    pub async fn reset_thread(&self) -> Result<ThreadId> {
        self.request(|reply| DriverCmd::ResetThread { reply }).await
    }

    pub async fn clear_error(&self) -> Result<()> {
        self.request(|reply| DriverCmd::ClearError { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Arc<TurnState>> {
        self.request(|reply| DriverCmd::Snapshot { reply }).await
    }

    pub async fn subscribe(&self) -> Result<SnapshotSubscription> {
        self.request(|reply| DriverCmd::Subscribe { reply }).await
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(DriverCmd::Shutdown);
    }
}

struct ActiveTurn {
    turn_id: TurnId,
    token: CancellationToken,
    outcome_tx: oneshot::Sender<TurnOutcome>,
}

impl ActiveTurn {
    fn resolve(self, outcome: TurnOutcome) {
        self.token.cancel();
        let _ = self.outcome_tx.send(outcome);
    }
}

struct DriverActor {
    transport: Arc<dyn Transport>,
    state: TurnState,
    latest: Arc<TurnState>,
    active: Option<ActiveTurn>,
    seq: u64,
    snapshot_broadcast: broadcast::Sender<SnapshotEnvelope>,
    forward_tx: mpsc::Sender<ForwardedItem>,
    forward_rx: mpsc::Receiver<ForwardedItem>,
}

impl DriverActor {
    fn new(transport: Arc<dyn Transport>, state: TurnState) -> Self {
        let (snapshot_broadcast, _) = broadcast::channel(SNAPSHOT_BROADCAST_CAPACITY);
        let (forward_tx, forward_rx) = mpsc::channel(FORWARD_CHANNEL_CAPACITY);

        Self {
            transport,
            latest: Arc::new(state.clone()),
            state,
            active: None,
            seq: 0,
            snapshot_broadcast,
            forward_tx,
            forward_rx,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<DriverCmd>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(DriverCmd::Submit { text, reply }) => {
                            let _ = reply.send(self.submit(&text));
                        }
                        Some(DriverCmd::CancelTurn { reply }) => {
                            let _ = reply.send(self.cancel_turn());
                        }
                        Some(DriverCmd::ResetThread { reply }) => {
                            let _ = reply.send(self.reset_thread());
                        }
                        Some(DriverCmd::ClearError { reply }) => {
                            self.state.clear_error();
                            self.publish();
                            let _ = reply.send(());
                        }
                        Some(DriverCmd::Snapshot { reply }) => {
                            let _ = reply.send(Arc::clone(&self.latest));
                        }
                        Some(DriverCmd::Subscribe { reply }) => {
                            let rx = self.snapshot_broadcast.subscribe();
                            let _ = reply.send(SnapshotSubscription::new(rx));
                        }
                        Some(DriverCmd::Shutdown) | None => break,
                    }
                }

                Some(forwarded) = self.forward_rx.recv() => {
                    self.handle_forwarded(forwarded);
                }
            }
        }

        if let Some(active) = self.active.take() {
            active.resolve(TurnOutcome::Cancelled);
        }
        tracing::debug!(target: "turnstream::driver", thread_id = %self.state.thread_id, "Session driver stopped");
    }

    fn submit(&mut self, text: &str) -> Result<TurnHandle> {
        let Some(text) = NonEmptyString::new(text) else {
            return Err(Error::InvalidInput("message is empty".to_string()));
        };
        if let Some(active) = &self.active {
            return Err(Error::Conflict(format!(
                "turn {} is still in progress",
                active.turn_id
            )));
        }

        let at = now_millis();
        self.state.push_user_message(text.into_inner(), at);
        let turn_id = self.state.ids_mut().turn_id();
        reduce(
            &mut self.state,
            StampedEvent::new(
                TurnEvent::TurnStarted {
                    turn_id: Some(turn_id.clone()),
                },
                at,
            ),
        );
        self.publish();

        let config = TurnConfig {
            thread_id: self.state.thread_id.clone(),
            turn_id: turn_id.clone(),
            history: self.state.messages.clone(),
        };
        let token = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tracing::info!(
            target: "turnstream::driver",
            thread_id = %config.thread_id,
            turn_id = %turn_id,
            transport = self.transport.name(),
            "Turn submitted"
        );

        tokio::spawn(forward_turn(
            Arc::clone(&self.transport),
            config,
            token.clone(),
            self.forward_tx.clone(),
        ));

        self.active = Some(ActiveTurn {
            turn_id: turn_id.clone(),
            token,
            outcome_tx,
        });

        Ok(TurnHandle {
            turn_id,
            outcome_rx,
        })
    }

    fn handle_forwarded(&mut self, forwarded: ForwardedItem) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.turn_id == forwarded.turn_id);
        if !is_current {
            tracing::debug!(
                target: "turnstream::driver",
                turn_id = %forwarded.turn_id,
                "Discarding event for a superseded turn"
            );
            return;
        }

        let event = match forwarded.item {
            Forwarded::Event(event) => event,
            Forwarded::Failed(message) => {
                tracing::warn!(target: "turnstream::driver", turn_id = %forwarded.turn_id, error = %message, "Transport failed mid-turn");
                TurnEvent::TurnFailed { message }
            }
            Forwarded::Ended => {
                tracing::warn!(target: "turnstream::driver", turn_id = %forwarded.turn_id, "Stream ended without a terminal event");
                TurnEvent::TurnFailed {
                    message: STREAM_ENDED_MESSAGE.to_string(),
                }
            }
        };

        self.apply(event);
    }

    fn apply(&mut self, event: TurnEvent) {
        let effects = reduce(&mut self.state, StampedEvent::new(event, now_millis()));
        self.publish();

        for (turn_id, outcome) in effects.into_iter().filter_map(|e| e.into_outcome()) {
            let Some(active) = self.active.take_if(|active| active.turn_id == turn_id) else {
                continue;
            };
            tracing::info!(
                target: "turnstream::driver",
                turn_id = %turn_id,
                success = outcome.is_success(),
                "Turn resolved"
            );
            active.resolve(outcome);
        }
    }

    fn cancel_turn(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        tracing::info!(target: "turnstream::driver", turn_id = %active.turn_id, "Cancelling turn");
        active.token.cancel();
        // Already out of `active`: the reducer's Failed resolution is not routed here.
        self.apply(TurnEvent::TurnFailed {
            message: CANCELLED_MESSAGE.to_string(),
        });
        active.resolve(TurnOutcome::Cancelled);
        true
    }

    fn reset_thread(&mut self) -> ThreadId {
        if let Some(active) = self.active.take() {
            tracing::info!(target: "turnstream::driver", turn_id = %active.turn_id, "Cancelling turn for thread reset");
            active.resolve(TurnOutcome::Cancelled);
        }

        let thread_id = ThreadId::new();
        self.state = TurnState::new(thread_id.clone());
        self.publish();

        tracing::info!(target: "turnstream::driver", thread_id = %thread_id, "Thread reset");
        thread_id
    }

    fn publish(&mut self) {
        self.seq += 1;
        self.latest = Arc::new(self.state.clone());
        // No subscribers is not an error.
        let _ = self.snapshot_broadcast.send(SnapshotEnvelope {
            seq: self.seq,
            state: Arc::clone(&self.latest),
        });
    }
}

/// Pumps one turn's transport stream into the driver until the stream
/// ends, fails, or the turn's token is cancelled.
async fn forward_turn(
    transport: Arc<dyn Transport>,
    config: TurnConfig,
    token: CancellationToken,
    tx: mpsc::Sender<ForwardedItem>,
) {
    let turn_id = config.turn_id.clone();

    let mut stream = match transport.open(config, token.clone()).await {
        Ok(stream) => stream,
        Err(TransportError::Cancelled) => return,
        Err(err) => {
            let item = Forwarded::Failed(err.turn_failure_message());
            let _ = tx.send(ForwardedItem { turn_id, item }).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return,
            next = stream.next() => next,
        };

        let item = match next {
            Some(Ok(raw)) => match normalize(&raw) {
                Some(event) => Forwarded::Event(event),
                None => continue,
            },
            Some(Err(TransportError::Cancelled)) => return,
            Some(Err(err)) => Forwarded::Failed(err.turn_failure_message()),
            None => Forwarded::Ended,
        };

        let last = !matches!(item, Forwarded::Event(_));
        let delivered = tx
            .send(ForwardedItem {
                turn_id: turn_id.clone(),
                item,
            })
            .await
            .is_ok();
        if last || !delivered {
            return;
        }
    }
}
