use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::state::TurnState;

/// One published view of the aggregate. `seq` increases by one per
/// published snapshot for the lifetime of the driver.
#[derive(Debug, Clone)]
pub struct SnapshotEnvelope {
    pub seq: u64,
    pub state: Arc<TurnState>,
}

pub struct SnapshotSubscription {
    pub rx: broadcast::Receiver<SnapshotEnvelope>,
}

impl SnapshotSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<SnapshotEnvelope>) -> Self {
        Self { rx }
    }

    /// Next snapshot, skipping over any this subscriber fell behind on.
    /// Returns `None` once the driver has shut down.
    pub async fn recv(&mut self) -> Option<SnapshotEnvelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        target: "turnstream::session",
                        lagged = n,
                        "Snapshot subscriber lagged, some snapshots were dropped"
                    );
                }
            }
        }
    }

    /// Latest snapshot already queued, if any, without waiting.
    pub fn latest(&mut self) -> Option<SnapshotEnvelope> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => latest = Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return latest,
            }
        }
    }
}
