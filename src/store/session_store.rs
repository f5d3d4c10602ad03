use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DeckStore, KeyedLocks};
use crate::db::{Database, Document, Versioned};
use crate::error::{Error, Result};
use crate::models::StudySession;

impl Document for StudySession {
    const COLLECTION: &'static str = "sessions";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Sole owner of study session documents.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    decks: DeckStore,
    locks: Arc<KeyedLocks>,
}

impl SessionStore {
    pub fn new(db: Database, decks: DeckStore) -> Self {
        Self {
            db,
            decks,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn create_session(&self, session: &StudySession) -> Result<Versioned<StudySession>> {
        let stored = self.db.insert(session)?;
        tracing::info!(
            session_id = %session.id,
            deck_id = %session.deck_id,
            cards = session.card_queue.len(),
            "Started study session"
        );
        Ok(stored)
    }

    /// Load a session whose deck still exists.
    pub fn get_session(&self, id: Uuid) -> Result<Versioned<StudySession>> {
        let stored = self
            .db
            .get::<StudySession>(id)?
            .ok_or(Error::NotFound("Study session"))?;
        if !self.decks.exists(stored.value.deck_id)? {
            return Err(Error::DeckMissing(id));
        }
        Ok(stored)
    }

    /// Write `session` if nobody saved it since `expected_version` was read.
    pub fn save_session(&self, session: &StudySession, expected_version: i64) -> Result<i64> {
        self.db
            .compare_and_swap(session, expected_version)?
            .ok_or_else(|| {
                tracing::warn!(session_id = %session.id, expected_version, "Session save lost a race");
                Error::Conflict(format!("Study session {} was modified concurrently", session.id))
            })
    }

    /// Serialize all mutations of one session.
    pub fn with_lock<T>(&self, id: Uuid, f: impl FnOnce() -> T) -> T {
        self.locks.with_lock(id, f)
    }

    /// Delete completed sessions that finished before `before`. Returns how
    /// many were removed.
    pub fn prune_completed(&self, before: DateTime<Utc>) -> Result<usize> {
        let stale: Vec<Uuid> = self
            .db
            .list::<StudySession>()?
            .into_iter()
            .filter(|stored| {
                stored.value.is_completed()
                    && stored.value.completed_at.is_some_and(|at| at < before)
            })
            .map(|stored| stored.value.id)
            .collect();

        let mut removed = 0;
        for id in stale {
            if self.with_lock(id, || self.db.delete::<StudySession>(id))? {
                removed += 1;
            }
        }
        tracing::info!(removed, %before, "Pruned completed study sessions");
        Ok(removed)
    }
}
