use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snapdeck_core::{CardState, Rating};
use uuid::Uuid;

/// One bounded review pass over a deck's due cards.
///
/// The queue is fixed when the session starts and is never re-evaluated.
/// `current_index` only moves forward, one step per recorded review. The
/// session refers to its deck by id and never copies card content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub card_queue: Vec<Uuid>,
    pub current_index: usize,
    /// Append-only, one entry per queue position already reviewed.
    pub reviews: Vec<ReviewRecord>,
    pub stats: SessionStats,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The status of a study session.
///
/// - `InProgress`: cards remain in the queue
/// - `Completed`: every queued card has been reviewed (terminal)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_cards: usize,
    pub reviewed_cards: usize,
    pub correct_answers: usize,
    pub study_time_seconds: u64,
}

/// What happened to one card during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub card_id: Uuid,
    pub rating: Rating,
    pub timestamp: DateTime<Utc>,
    pub study_time_seconds: u32,
    pub previous_due: DateTime<Utc>,
    pub new_due: DateTime<Utc>,
    /// Whole days until `new_due`; 0 for same-day learning steps.
    pub new_interval: u32,
    pub state: CardState,
    pub stability: f64,
    pub difficulty: f64,
}

impl StudySession {
    /// A freshly started session. An empty queue is complete from the outset.
    pub fn new(deck_id: Uuid, card_queue: Vec<Uuid>, now: DateTime<Utc>) -> Self {
        let empty = card_queue.is_empty();
        Self {
            id: Uuid::new_v4(),
            deck_id,
            stats: SessionStats {
                total_cards: card_queue.len(),
                ..Default::default()
            },
            card_queue,
            current_index: 0,
            reviews: Vec::new(),
            state: if empty {
                SessionState::Completed
            } else {
                SessionState::InProgress
            },
            started_at: now,
            completed_at: empty.then_some(now),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed || self.current_index >= self.card_queue.len()
    }

    /// The card awaiting a rating, if any.
    pub fn current_card(&self) -> Option<Uuid> {
        self.card_queue.get(self.current_index).copied()
    }

    /// Append the review of the current card and advance the cursor.
    pub fn record(&mut self, record: ReviewRecord) {
        if record.rating.is_correct() {
            self.stats.correct_answers += 1;
        }
        self.stats.reviewed_cards += 1;
        self.stats.study_time_seconds += record.study_time_seconds as u64;
        let finished_at = record.timestamp;
        self.reviews.push(record);
        self.current_index += 1;

        if self.current_index >= self.card_queue.len() {
            self.state = SessionState::Completed;
            self.completed_at = Some(finished_at);
        }
    }

    /// Progress as shown while `card_queue[current_index]` is on screen.
    pub fn progress_showing(&self) -> Progress {
        Progress::new(self.current_index + 1, self.card_queue.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent.
    pub percentage: u32,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((current as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

// ============================================================
// Request / response shapes
// ============================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionInput {
    /// Upper bound on the queue length. Must be positive when given.
    pub max_cards: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub total_cards: usize,
}

/// A card as presented for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub state: CardState,
    pub due: DateTime<Utc>,
    pub difficulty: f64,
    pub stability: f64,
    /// Current recall probability; absent for new cards.
    pub retrievability: Option<f64>,
}

/// Response of `GET /study/{id}/next`: either the card to show, or the final
/// stats once the queue is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextCardResponse {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Cursor to echo back as `expectedIndex` when reviewing this card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SessionStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy.
    pub rating: i64,
    /// Seconds spent on the card.
    #[serde(default)]
    pub study_time: Option<u32>,
    /// Cursor the client believes it is answering. A stale value turns the
    /// call into a replay of the recorded outcome.
    #[serde(default)]
    pub expected_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub next_due: DateTime<Utc>,
    /// Whole days until `next_due`.
    pub interval: u32,
    pub stability: f64,
    pub difficulty: f64,
    pub state: CardState,
    pub completed: bool,
    pub progress: Progress,
    /// True when the step had already been recorded and nothing changed.
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatsView {
    #[serde(flatten)]
    pub totals: SessionStats,
    /// Percentage of Good/Easy answers, rounded.
    pub accuracy: u32,
    /// Mean seconds per reviewed card, rounded.
    pub average_time_per_card: u64,
}

impl From<&SessionStats> for SessionStatsView {
    fn from(stats: &SessionStats) -> Self {
        let (accuracy, average_time_per_card) = if stats.reviewed_cards > 0 {
            let n = stats.reviewed_cards as f64;
            (
                (stats.correct_answers as f64 / n * 100.0).round() as u32,
                (stats.study_time_seconds as f64 / n).round() as u64,
            )
        } else {
            (0, 0)
        };
        Self {
            totals: stats.clone(),
            accuracy,
            average_time_per_card,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatsResponse {
    pub session_id: Uuid,
    pub deck_id: Uuid,
    pub stats: SessionStatsView,
    pub completed: bool,
    pub reviews: Vec<ReviewRecord>,
}
