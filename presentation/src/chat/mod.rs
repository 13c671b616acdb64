//! Interactive chat module
//!
//! Provides a readline-based chat over the agent dispatcher, streaming each
//! response as it grows.

mod repl;
mod stream;

pub use repl::ChatRepl;
pub use stream::ResponseView;
