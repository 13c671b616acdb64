//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] — domain-level errors
//! - [`error::ResponseError`] — rejected response mutations

pub mod error;
