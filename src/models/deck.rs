use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use snapdeck_core::{CardState, MemoryState, Rating, ReviewLog};
use uuid::Uuid;

/// One learnable fact.
///
/// `question` and `answer` never change after creation; only the memory state
/// and review bookkeeping are rewritten, always through
/// [`DeckStore::update_card`](crate::store::DeckStore::update_card).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty_label: DifficultyLevel,
    pub source: CardSource,
    pub memory: MemoryState,
    pub created_at: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub total_reviews: u32,
    /// The last session step written to this card. Lets a review retried after
    /// a crash recognise that its scheduling result is already stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<AppliedStep>,
}

impl Card {
    pub fn new(
        input: FlashcardInput,
        difficulty_label: DifficultyLevel,
        source: CardSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: input.question,
            answer: input.answer,
            tags: input.tags,
            difficulty_label,
            source,
            memory: MemoryState::new(now),
            created_at: now,
            last_reviewed: None,
            total_reviews: 0,
            last_applied: None,
        }
    }

    pub fn state(&self) -> CardState {
        self.memory.state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedStep {
    pub session_id: Uuid,
    /// Index into the session's card queue.
    pub step: usize,
    pub log: ReviewLog,
}

/// Difficulty label chosen when the deck's content was generated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Where a card's content came from.
///
/// - `Generated`: produced by the flashcard generator and saved in one step
/// - `Saved`: generated earlier, saved into a deck afterwards
/// - `Manual`: written by the learner
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardSource {
    Generated,
    Saved,
    #[default]
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSettings {
    pub difficulty: DifficultyLevel,
    pub max_new_cards_per_day: u32,
    pub max_reviews_per_day: u32,
}

impl Default for DeckSettings {
    fn default() -> Self {
        Self {
            difficulty: DifficultyLevel::default(),
            max_new_cards_per_day: 20,
            max_reviews_per_day: 100,
        }
    }
}

/// Review counters for a single UTC day, reset lazily on the first review of
/// a new day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCounts {
    pub date: NaiveDate,
    pub new_introduced: u32,
    pub reviews: u32,
}

/// Running aggregates over every review ever recorded on the deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total_reviews: u64,
    pub total_study_time_seconds: u64,
    /// Fraction of reviews rated Good or Easy.
    pub retention_rate: f64,
    pub average_grade: f64,
    #[serde(default)]
    pub today: Option<DailyCounts>,
}

impl DeckStats {
    pub fn record_review(
        &mut self,
        rating: Rating,
        study_time_seconds: u32,
        was_new: bool,
        now: DateTime<Utc>,
    ) {
        self.total_reviews += 1;
        self.total_study_time_seconds += study_time_seconds as u64;

        let n = self.total_reviews as f64;
        let correct = if rating.is_correct() { 1.0 } else { 0.0 };
        self.retention_rate = (self.retention_rate * (n - 1.0) + correct) / n;
        self.average_grade = (self.average_grade * (n - 1.0) + rating.value() as f64) / n;

        let date = now.date_naive();
        if !matches!(self.today, Some(counts) if counts.date == date) {
            self.today = Some(DailyCounts {
                date,
                new_introduced: 0,
                reviews: 0,
            });
        }
        if let Some(today) = self.today.as_mut() {
            if was_new {
                today.new_introduced += 1;
            } else {
                today.reviews += 1;
            }
        }
    }

    /// Remaining `(new, review)` allowance for the day containing `now`.
    pub fn remaining_today(&self, settings: &DeckSettings, now: DateTime<Utc>) -> (u32, u32) {
        let (new_used, reviews_used) = match self.today {
            Some(counts) if counts.date == now.date_naive() => {
                (counts.new_introduced, counts.reviews)
            }
            _ => (0, 0),
        };
        (
            settings.max_new_cards_per_day.saturating_sub(new_used),
            settings.max_reviews_per_day.saturating_sub(reviews_used),
        )
    }
}

/// A named, ordered collection of cards. Stored as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cards: Vec<Card>,
    pub settings: DeckSettings,
    pub stats: DeckStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn card(&self, id: Uuid) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Per-state counts at `now`. Always computed, never stored.
    pub fn counts(&self, now: DateTime<Utc>) -> CardCounts {
        let mut counts = CardCounts {
            total: self.cards.len(),
            ..Default::default()
        };
        for card in &self.cards {
            match card.state() {
                CardState::New => counts.new += 1,
                CardState::Learning => counts.learning += 1,
                CardState::Review => counts.review += 1,
                CardState::Relearning => counts.relearning += 1,
            }
            if card.memory.is_due(now) {
                counts.due += 1;
            }
        }
        counts
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DeckSummary {
        let counts = self.counts(now);
        DeckSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            total_cards: counts.total,
            new_cards: counts.new,
            learning_cards: counts.learning,
            review_cards: counts.review,
            relearning_cards: counts.relearning,
            due_cards: counts.due,
            created_at: self.created_at,
            updated_at: self.updated_at,
            settings: self.settings.clone(),
            stats: self.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardCounts {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub relearning: usize,
    pub due: usize,
}

/// Listing entry for `GET /decks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub relearning_cards: usize,
    pub due_cards: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: DeckSettings,
    pub stats: DeckStats,
}

/// A `(question, answer)` pair handed over by the ingestion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardInput {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for creating a deck from generated or hand-written flashcards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub source: CardSource,
    /// Missing and empty are both rejected by the store with a 400.
    #[serde(default)]
    pub cards: Vec<FlashcardInput>,
    #[serde(default)]
    pub max_new_cards_per_day: Option<u32>,
    #[serde(default)]
    pub max_reviews_per_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckResponse {
    pub deck_id: Uuid,
    pub name: String,
    pub total_cards: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn card(question: &str, now: DateTime<Utc>) -> Card {
        Card::new(
            FlashcardInput {
                question: question.to_string(),
                answer: "answer".to_string(),
                tags: vec![],
            },
            DifficultyLevel::Medium,
            CardSource::Manual,
            now,
        )
    }

    #[test]
    fn counts_are_computed_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut reviewed = card("b", now);
        reviewed.memory.state = CardState::Review;
        reviewed.memory.due = now + Duration::days(3);

        let deck = Deck {
            id: Uuid::new_v4(),
            name: "Deck".to_string(),
            description: None,
            cards: vec![card("a", now), reviewed],
            settings: DeckSettings::default(),
            stats: DeckStats::default(),
            created_at: now,
            updated_at: now,
        };

        let counts = deck.counts(now);
        assert_eq!(counts.total, 2);
        assert_eq!(counts.new, 1);
        assert_eq!(counts.review, 1);
        assert_eq!(counts.due, 1);
        assert_eq!(deck.counts(now + Duration::days(4)).due, 2);
    }

    #[test]
    fn record_review_keeps_running_averages() {
        let now = Utc::now();
        let mut stats = DeckStats::default();
        stats.record_review(Rating::Good, 10, true, now);
        stats.record_review(Rating::Again, 20, false, now);

        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.total_study_time_seconds, 30);
        assert!((stats.retention_rate - 0.5).abs() < 1e-9);
        assert!((stats.average_grade - 2.0).abs() < 1e-9);
        let today = stats.today.unwrap();
        assert_eq!((today.new_introduced, today.reviews), (1, 1));
    }

    #[test]
    fn daily_allowance_resets_on_a_new_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let settings = DeckSettings {
            max_new_cards_per_day: 2,
            max_reviews_per_day: 5,
            ..Default::default()
        };
        let mut stats = DeckStats::default();
        stats.record_review(Rating::Good, 0, true, now);
        assert_eq!(stats.remaining_today(&settings, now), (1, 5));
        assert_eq!(
            stats.remaining_today(&settings, now + Duration::hours(2)),
            (2, 5)
        );

        stats.record_review(Rating::Good, 0, true, now + Duration::hours(2));
        assert_eq!(stats.today.unwrap().new_introduced, 1);
    }
}
