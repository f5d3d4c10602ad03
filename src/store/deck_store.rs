use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::KeyedLocks;
use crate::db::{Database, Document, Versioned};
use crate::error::{Error, Result};
use crate::models::{Card, CreateDeckInput, Deck, DeckSettings, DeckStats, DeckSummary};

impl Document for Deck {
    const COLLECTION: &'static str = "decks";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Sole owner of deck documents and the cards inside them.
#[derive(Clone)]
pub struct DeckStore {
    db: Database,
    locks: Arc<KeyedLocks>,
}

impl DeckStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn create_deck(&self, input: CreateDeckInput, now: DateTime<Utc>) -> Result<Deck> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::invalid("Deck name is required"));
        }
        if input.cards.is_empty() {
            return Err(Error::invalid("Flashcards array is required"));
        }

        let defaults = DeckSettings::default();
        let settings = DeckSettings {
            difficulty: input.difficulty,
            max_new_cards_per_day: input
                .max_new_cards_per_day
                .unwrap_or(defaults.max_new_cards_per_day),
            max_reviews_per_day: input
                .max_reviews_per_day
                .unwrap_or(defaults.max_reviews_per_day),
        };
        let description = input
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Saved deck with {} flashcards", input.cards.len()));
        let cards = input
            .cards
            .into_iter()
            .map(|card| Card::new(card, input.difficulty, input.source, now))
            .collect();

        let deck = Deck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(description),
            cards,
            settings,
            stats: DeckStats::default(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&deck)?;

        tracing::info!(deck_id = %deck.id, cards = deck.cards.len(), "Created deck {:?}", deck.name);
        Ok(deck)
    }

    pub fn get_deck(&self, id: Uuid) -> Result<Deck> {
        self.load(id).map(|stored| stored.value)
    }

    pub fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.exists::<Deck>(id)?)
    }

    /// Summaries with counts computed at `now`, most recently updated first.
    pub fn list_decks(&self, now: DateTime<Utc>) -> Result<Vec<DeckSummary>> {
        let mut decks: Vec<Deck> = self
            .db
            .list::<Deck>()?
            .into_iter()
            .map(|stored| stored.value)
            .collect();
        decks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(decks.iter().map(|deck| deck.summary(now)).collect())
    }

    /// Remove the deck. Sessions pointing at it are left in place.
    pub fn delete_deck(&self, id: Uuid) -> Result<()> {
        self.locks.with_lock(id, || {
            if !self.db.delete::<Deck>(id)? {
                return Err(Error::NotFound("Deck"));
            }
            tracing::info!(deck_id = %id, "Deleted deck");
            Ok(())
        })
    }

    /// Apply `mutator` to one card and the deck's aggregates, then write the
    /// deck back as a single document.
    ///
    /// Runs under the deck's lock. The write is a compare-and-swap against the
    /// version just read, so a change from another process is reported as
    /// [`Error::Conflict`] instead of being overwritten.
    pub fn update_card<T>(
        &self,
        deck_id: Uuid,
        card_id: Uuid,
        now: DateTime<Utc>,
        mutator: impl FnOnce(&mut Card, &mut DeckStats) -> Result<T>,
    ) -> Result<T> {
        self.locks.with_lock(deck_id, || {
            let Versioned {
                version,
                value: mut deck,
                ..
            } = self.load(deck_id)?;

            let Deck { cards, stats, .. } = &mut deck;
            let card = cards
                .iter_mut()
                .find(|card| card.id == card_id)
                .ok_or(Error::NotFound("Card"))?;
            let output = mutator(card, stats)?;
            deck.updated_at = now;

            match self.db.compare_and_swap(&deck, version)? {
                Some(_) => Ok(output),
                None => {
                    tracing::warn!(%deck_id, version, "Deck changed during card update");
                    Err(Error::Conflict(format!("Deck {deck_id} was modified concurrently")))
                }
            }
        })
    }

    fn load(&self, id: Uuid) -> Result<Versioned<Deck>> {
        self.db.get::<Deck>(id)?.ok_or(Error::NotFound("Deck"))
    }
}
