pub mod cli;
pub mod commands;
pub mod render;
pub mod utils;

pub use turnstream_core::{config, domain, protocol, session, transport};
