//! Deck and session stores on top of the document database.
//!
//! Each store exclusively owns its collection. Mutations are serialized per
//! document id and written with a compare-and-swap on the document version.
//! When both locks are needed, the session lock is taken before the deck lock.

mod deck_store;
mod locks;
mod session_store;

pub use deck_store::DeckStore;
pub use locks::KeyedLocks;
pub use session_store::SessionStore;
