pub mod normalize;
pub mod raw;
pub mod request;

pub use normalize::normalize;
pub use raw::RawEvent;
pub use request::{RunRequest, WireMessage};
