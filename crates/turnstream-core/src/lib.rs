// Turn aggregation for event-streamed agent protocols, without UI dependencies

pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
