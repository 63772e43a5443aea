mod client;
mod session_controller;
mod session_event;

pub use client::*;
pub use session_controller::*;
pub use session_event::*;
