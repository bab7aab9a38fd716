//! Core domain + application logic for the vanity alias bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the KV store
//! live behind ports (traits) implemented in adapter crates.

pub mod claim;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod ports;
pub mod validation;

pub use errors::{Error, Result};
