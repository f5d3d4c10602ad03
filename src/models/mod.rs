//! Domain models for Snapdeck.
//!
//! # Core Concepts
//!
//! ## Permanent Entities
//!
//! - [`Deck`]: A named, ordered collection of [`Card`]s with per-deck settings
//!   and running review statistics. Stored as one document.
//! - [`Card`]: A question/answer pair plus the memory state the scheduler
//!   maintains for it. Content is immutable; only scheduling fields change.
//!
//! ## Ephemeral Entities
//!
//! - [`StudySession`]: A bounded pass over a snapshot of due cards. Holds the
//!   deck id and card ids only, never card content. Completed sessions stay
//!   until pruned.

mod deck;
mod session;

pub use deck::*;
pub use session::*;
