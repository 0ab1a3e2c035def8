//! Owns the aggregate for one conversation and runs turns against a
//! [`crate::transport::Transport`].

mod driver;
mod subscription;

pub use driver::{CANCELLED_MESSAGE, STREAM_ENDED_MESSAGE, SessionDriver, TurnHandle};
pub use subscription::{SnapshotEnvelope, SnapshotSubscription};
