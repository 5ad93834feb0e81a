//! Core domain + application logic for the Telegram relay bot.
//!
//! Framework-agnostic: the chat platform lives behind the
//! [`messaging::port::ChatTransport`] port, implemented in the adapter crate.

pub mod audit;
pub mod commands;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod relay_map;
pub mod security;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
