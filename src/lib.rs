//! Snapdeck: spaced-repetition study sessions over flashcard decks.
//!
//! The scheduling math lives in `snapdeck-core`. This crate adds the SQLite
//! document store, the study session manager and the HTTP API.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod study;

pub use error::{Error, Result};
