pub mod adapter;
pub mod channel;
pub mod config;
pub mod negotiation;
pub mod recording;
pub mod session;

pub use adapter::*;
pub use channel::*;
pub use config::*;
pub use negotiation::*;
pub use recording::*;
pub use session::*;
