//! Language model providers

#[cfg(feature = "openai")]
pub mod openai;
pub mod routing;

pub use routing::PurposeRouter;
