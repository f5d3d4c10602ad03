//! Forgetting-curve scheduling for SnapDeck.
//!
//! [`Scheduler::schedule`] takes a card's [`MemoryState`], a [`Rating`] and the
//! review time, and returns the next memory state together with a
//! [`ReviewLog`]. The crate does no I/O; persistence and session handling live
//! in the `snapdeck` crate.

mod error;
mod params;
mod scheduler;
mod state;

pub use error::SchedulingError;
pub use params::{
    LearningSteps, SchedulerParams, DEFAULT_MAXIMUM_INTERVAL, DEFAULT_RETENTION, DEFAULT_WEIGHTS,
};
pub use scheduler::{ReviewLog, ScheduledCard, Scheduler};
pub use state::{CardState, InvalidRating, MemoryState, Rating};
