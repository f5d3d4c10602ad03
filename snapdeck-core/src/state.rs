use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The learner's self-rated recall for one review.
///
/// Serialized as its numeric value (1–4) so clients and stored review logs
/// agree on the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Rating {
    /// Complete failure to recall.
    Again = 1,
    /// Recalled with serious effort.
    Hard = 2,
    /// Recalled after a short hesitation.
    Good = 3,
    /// Effortless recall.
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Good and Easy count as a successful recall for accuracy stats.
    pub fn is_correct(self) -> bool {
        matches!(self, Rating::Good | Rating::Easy)
    }
}

/// Error returned when a numeric rating is outside 1–4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 4, got {0}")]
pub struct InvalidRating(pub u8);

impl TryFrom<u8> for Rating {
    type Error = InvalidRating;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(InvalidRating(other)),
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

/// Where a card sits in its learning lifecycle.
///
/// - `New`: never reviewed
/// - `Learning`: introduced, still on short same-day steps
/// - `Review`: graduated, scheduled in whole days
/// - `Relearning`: forgotten while in `Review`, back on short steps
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

/// Memory-model state of a single card.
///
/// `stability` and `difficulty` are sentinels (`0.0`) until the first review.
/// Retrievability is never stored; see [`crate::Scheduler::retrievability`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    pub difficulty: f64,
    /// Days until retrievability decays to the reference retention (90%).
    pub stability: f64,
    pub due: DateTime<Utc>,
    pub state: CardState,
    /// `Again` ratings given while the card was in `Review` or `Relearning`.
    pub lapses: u32,
    pub reps: u32,
    pub last_review: Option<DateTime<Utc>>,
    /// Interval of the last scheduling decision in whole days (0 for same-day steps).
    pub scheduled_days: u32,
}

impl MemoryState {
    /// A never-reviewed card, due immediately.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            difficulty: 0.0,
            stability: 0.0,
            due: created_at,
            state: CardState::New,
            lapses: 0,
            reps: 0,
            last_review: None,
            scheduled_days: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == CardState::New
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}
