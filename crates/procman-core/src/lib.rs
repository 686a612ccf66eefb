//! procman core - platform-independent process lifecycle types
//!
//! This crate provides the command configuration and resolution, the
//! process registry, the stream buffering helpers, the traits platform
//! crates implement and the shared error types.

mod config;
mod diagnostics;
mod error;
mod process;
mod registry;
mod resolve;
pub mod stdio;

pub use config::*;
pub use diagnostics::*;
pub use error::*;
pub use process::*;
pub use registry::*;
pub use resolve::*;
