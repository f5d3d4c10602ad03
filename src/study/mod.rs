//! Study sessions: building the review queue, presenting cards and applying
//! ratings.
//!
//! A review touches two documents. The card's new memory state is written to
//! the deck first, stamped with `(session, step)`; the session cursor is
//! written second. If the process dies in between, retrying the review finds
//! the stamp and reuses the stored result instead of scheduling twice.

use chrono::{DateTime, Utc};
use snapdeck_core::{Rating, ReviewLog, Scheduler};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{Database, Versioned};
use crate::error::{Error, Result};
use crate::models::{
    AppliedStep, CardView, Deck, NextCardResponse, Progress, ReviewInput, ReviewOutcome,
    ReviewRecord, SessionStatsResponse, SessionStatsView, StartSessionResponse, StudySession,
};
use crate::store::{DeckStore, SessionStore};

#[derive(Clone)]
pub struct StudyManager {
    decks: DeckStore,
    sessions: SessionStore,
    scheduler: Scheduler,
    default_max_cards: u32,
}

impl StudyManager {
    pub fn new(db: Database, scheduler: Scheduler, default_max_cards: u32) -> Self {
        let decks = DeckStore::new(db.clone());
        Self {
            sessions: SessionStore::new(db, decks.clone()),
            decks,
            scheduler,
            default_max_cards,
        }
    }

    pub fn from_config(db: Database, config: &Config) -> Result<Self> {
        let scheduler = Scheduler::new(config.scheduler_params())?;
        Ok(Self::new(db, scheduler, config.default_max_cards))
    }

    pub fn decks(&self) -> &DeckStore {
        &self.decks
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // ============================================================
    // Session lifecycle
    // ============================================================

    /// Snapshot the deck's due cards into a new session.
    pub fn start(
        &self,
        deck_id: Uuid,
        max_cards: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<StartSessionResponse> {
        let limit = match max_cards {
            Some(n) if n <= 0 => {
                return Err(Error::invalid("maxCards must be a positive integer"));
            }
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
            None => self.default_max_cards as usize,
        };

        let deck = self.decks.get_deck(deck_id)?;
        let queue = select_queue(&deck, limit, now);
        let session = StudySession::new(deck_id, queue, now);
        self.sessions.create_session(&session)?;

        Ok(StartSessionResponse {
            session_id: session.id,
            total_cards: session.card_queue.len(),
        })
    }

    /// The card at the cursor, or the final stats once the queue is done.
    /// Never mutates anything, and repeated calls return the same response:
    /// retrievability is evaluated at the session start, not the wall clock.
    pub fn next(&self, session_id: Uuid) -> Result<NextCardResponse> {
        let session = self.sessions.get_session(session_id)?.value;

        let Some(card_id) = session.current_card().filter(|_| !session.is_completed()) else {
            return Ok(NextCardResponse {
                completed: true,
                card: None,
                progress: None,
                index: None,
                stats: Some(session.stats),
            });
        };

        let deck = self
            .decks
            .get_deck(session.deck_id)
            .map_err(|err| deck_gone(err, session_id))?;
        let card = deck.card(card_id).ok_or(Error::NotFound("Card"))?;

        Ok(NextCardResponse {
            completed: false,
            card: Some(CardView {
                id: card.id,
                question: card.question.clone(),
                answer: card.answer.clone(),
                state: card.state(),
                due: card.memory.due,
                difficulty: card.memory.difficulty,
                stability: card.memory.stability,
                retrievability: self.scheduler.retrievability(&card.memory, session.started_at),
            }),
            progress: Some(session.progress_showing()),
            index: Some(session.current_index),
            stats: None,
        })
    }

    /// Rate the card at the cursor and advance the session.
    pub fn review(
        &self,
        session_id: Uuid,
        input: ReviewInput,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let rating = u8::try_from(input.rating)
            .ok()
            .and_then(|value| Rating::try_from(value).ok())
            .ok_or_else(|| Error::invalid("Rating must be 1 (Again), 2 (Hard), 3 (Good) or 4 (Easy)"))?;
        let study_time = input.study_time.unwrap_or(0);

        self.sessions.with_lock(session_id, || {
            let Versioned {
                version,
                value: mut session,
                ..
            } = self.sessions.get_session(session_id)?;
            let step = session.current_index;

            if let Some(expected) = input.expected_index {
                if expected < step {
                    tracing::debug!(%session_id, expected, step, "Replaying recorded review");
                    return outcome(&session, expected, true);
                }
                if expected > step {
                    return Err(Error::invalid(format!(
                        "expectedIndex {expected} is ahead of the session cursor {step}"
                    )));
                }
            }
            let Some(card_id) = session.current_card().filter(|_| !session.is_completed()) else {
                return Err(Error::Conflict("Study session is already completed".to_string()));
            };

            let log = self
                .decks
                .update_card(session.deck_id, card_id, now, |card, stats| {
                    if let Some(applied) = &card.last_applied {
                        if applied.session_id == session_id && applied.step == step {
                            tracing::info!(%session_id, step, %card_id, "Review already stored on card");
                            return Ok(applied.log.clone());
                        }
                    }

                    let was_new = card.memory.is_new();
                    let scheduled = self.scheduler.schedule(&card.memory, rating, now)?;
                    card.memory = scheduled.state;
                    card.last_reviewed = Some(now);
                    card.total_reviews += 1;
                    card.last_applied = Some(AppliedStep {
                        session_id,
                        step,
                        log: scheduled.log.clone(),
                    });
                    stats.record_review(rating, study_time, was_new, now);
                    Ok(scheduled.log)
                })
                .map_err(|err| deck_gone(err, session_id))?;

            session.record(review_record(card_id, study_time, &log));
            self.sessions.save_session(&session, version)?;

            tracing::debug!(
                %session_id,
                %card_id,
                rating = rating.value(),
                state = log.state_after.as_str(),
                interval = log.scheduled_days,
                "Recorded review"
            );
            outcome(&session, step, false)
        })
    }

    pub fn stats(&self, session_id: Uuid) -> Result<SessionStatsResponse> {
        let session = self.sessions.get_session(session_id)?.value;
        Ok(SessionStatsResponse {
            session_id: session.id,
            deck_id: session.deck_id,
            stats: SessionStatsView::from(&session.stats),
            completed: session.is_completed(),
            reviews: session.reviews,
        })
    }
}

/// Due reviews ordered by `(due, deck position)`, then new cards in deck
/// order, each capped by what is left of today's budget, then cut to `limit`.
fn select_queue(deck: &Deck, limit: usize, now: DateTime<Utc>) -> Vec<Uuid> {
    let (new_left, reviews_left) = deck.stats.remaining_today(&deck.settings, now);

    let mut due: Vec<_> = deck
        .cards
        .iter()
        .filter(|card| !card.memory.is_new() && card.memory.is_due(now))
        .collect();
    // Stable, so equal due times keep deck order.
    due.sort_by_key(|card| card.memory.due);

    let fresh = deck.cards.iter().filter(|card| card.memory.is_new());

    due.into_iter()
        .take(reviews_left as usize)
        .chain(fresh.take(new_left as usize))
        .take(limit)
        .map(|card| card.id)
        .collect()
}

fn review_record(card_id: Uuid, study_time_seconds: u32, log: &ReviewLog) -> ReviewRecord {
    ReviewRecord {
        card_id,
        rating: log.rating,
        timestamp: log.reviewed_at,
        study_time_seconds,
        previous_due: log.due_before,
        new_due: log.due_after,
        new_interval: log.scheduled_days,
        state: log.state_after,
        stability: log.stability_after,
        difficulty: log.difficulty_after,
    }
}

/// The outcome of queue position `step`, as seen right after it was reviewed.
fn outcome(session: &StudySession, step: usize, replayed: bool) -> Result<ReviewOutcome> {
    let record = session
        .reviews
        .get(step)
        .ok_or_else(|| Error::Conflict(format!("No review recorded at position {step}")))?;
    let total = session.card_queue.len();

    Ok(ReviewOutcome {
        next_due: record.new_due,
        interval: record.new_interval,
        stability: record.stability,
        difficulty: record.difficulty,
        state: record.state,
        completed: step + 1 >= total,
        progress: Progress::new(step + 1, total),
        replayed,
    })
}

/// A deck vanishing between the session load and the deck access.
fn deck_gone(err: Error, session_id: Uuid) -> Error {
    match err {
        Error::NotFound("Deck") => Error::DeckMissing(session_id),
        other => other,
    }
}
