//! Aider adapter
//!
//! Runs the Aider chat wrapper as a child process and implements the
//! application's `AiderConnector` port on top of it.

pub mod connector;
pub mod demux;
pub mod error;
pub mod process;
pub mod progress;
