//! Streaming xargs: collect items, spawn a process once, pipe its output.

mod channel;
mod collector;
mod error;
mod events;
mod options;
mod process;
mod wiring;

pub use channel::*;
pub use collector::*;
pub use error::*;
pub use events::*;
pub use options::*;
pub use process::*;
