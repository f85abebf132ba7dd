//! Core domain + download-and-relay engine for the link relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! messaging port implemented in the adapter crate.

pub mod batch;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod naming;
pub mod normalize;
pub mod outbound;
pub mod transfer;

pub use errors::{Error, Result};

#[cfg(test)]
mod test_support;
