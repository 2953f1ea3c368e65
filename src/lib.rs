//! Stream xargs - collect items from async streams and feed them to a subprocess.

pub mod config;
pub mod display;
pub mod source;
pub mod tokenize;
pub mod xargs;

pub use xargs::{spawn, xargs, XargsChannel, XargsError, XargsEvent, XargsOptions};
