use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{CardState, MemoryState, Rating, SchedulerParams, SchedulingError};

const DECAY: f64 = -0.5;
/// Chosen so that `R(S, S) = 0.9`.
const FACTOR: f64 = 19.0 / 81.0;

const MIN_STABILITY: f64 = 0.01;
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;
/// Post-lapse stability never exceeds this fraction of the pre-lapse value.
const LAPSE_STABILITY_CAP: f64 = 0.9;

/// Same-day stability multipliers, indexed by `rating - 1`.
const LEARNING_MULTIPLIERS: [f64; 4] = [0.6, 1.2, 1.6, 2.2];
const RELEARNING_MULTIPLIERS: [f64; 4] = [0.7, 1.1, 1.3, 1.7];

/// `(start, end, factor)` bands for interval fuzz, in days.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

/// Audit record of one scheduling decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub rating: Rating,
    pub state_before: CardState,
    pub state_after: CardState,
    pub due_before: DateTime<Utc>,
    pub due_after: DateTime<Utc>,
    pub stability_before: f64,
    pub stability_after: f64,
    pub difficulty_before: f64,
    pub difficulty_after: f64,
    /// Recall probability at review time; `None` for a new card.
    pub retrievability: Option<f64>,
    pub elapsed_days: f64,
    pub scheduled_days: u32,
    pub reviewed_at: DateTime<Utc>,
}

/// Result of [`Scheduler::schedule`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCard {
    pub state: MemoryState,
    pub log: ReviewLog,
}

enum Transition {
    /// Stay on short steps for this many minutes.
    Step(i64, CardState),
    /// Move to (or stay in) `Review` with a whole-day interval.
    Graduate,
}

/// Forgetting-curve scheduler.
///
/// Pure: the same memory state, rating, time and parameters always yield the
/// same result, fuzz included.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    params: SchedulerParams,
}

impl Scheduler {
    pub fn new(params: SchedulerParams) -> Result<Self, SchedulingError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SchedulerParams {
        &self.params
    }

    /// Probability that the card is recalled at `now`. `None` for new cards.
    pub fn retrievability(&self, card: &MemoryState, now: DateTime<Utc>) -> Option<f64> {
        if card.is_new() || card.stability <= 0.0 {
            return None;
        }
        let elapsed = card
            .last_review
            .map(|last| elapsed_days(last, now))
            .unwrap_or(0.0);
        Some(forgetting_curve(elapsed, card.stability))
    }

    pub fn schedule(
        &self,
        card: &MemoryState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<ScheduledCard, SchedulingError> {
        validate_state(card)?;

        let elapsed = card
            .last_review
            .map(|last| elapsed_days(last, now))
            .unwrap_or(0.0);
        let g = rating.value() as usize;
        let mut lapses = card.lapses;
        let mut retrievability = None;

        let (stability, difficulty, transition) = match card.state {
            CardState::New => {
                let steps = self.params.steps;
                let transition = match rating {
                    Rating::Again => Transition::Step(steps.again, CardState::Learning),
                    Rating::Hard => Transition::Step(steps.new_hard, CardState::Learning),
                    Rating::Good => Transition::Step(steps.new_good, CardState::Learning),
                    Rating::Easy => Transition::Graduate,
                };
                (
                    self.initial_stability(rating),
                    self.initial_difficulty(rating),
                    transition,
                )
            }
            phase @ (CardState::Learning | CardState::Relearning) => {
                let multipliers = if phase == CardState::Learning {
                    LEARNING_MULTIPLIERS
                } else {
                    RELEARNING_MULTIPLIERS
                };
                let stability = (card.stability * multipliers[g - 1]).max(MIN_STABILITY);
                let transition = match rating {
                    Rating::Again => {
                        if phase == CardState::Relearning {
                            lapses += 1;
                        }
                        Transition::Step(self.params.steps.again, phase)
                    }
                    Rating::Hard => Transition::Step(self.params.steps.hard, phase),
                    Rating::Good | Rating::Easy => Transition::Graduate,
                };
                (
                    stability,
                    self.next_difficulty(card.difficulty, rating),
                    transition,
                )
            }
            CardState::Review => {
                let r = forgetting_curve(elapsed, card.stability);
                retrievability = Some(r);
                let difficulty = self.next_difficulty(card.difficulty, rating);
                if rating == Rating::Again {
                    lapses += 1;
                    (
                        self.forget_stability(card.difficulty, card.stability, r),
                        difficulty,
                        Transition::Step(self.params.steps.relearn, CardState::Relearning),
                    )
                } else {
                    (
                        self.recall_stability(card.difficulty, card.stability, r, rating),
                        difficulty,
                        Transition::Graduate,
                    )
                }
            }
        };

        let (state, due, scheduled_days) = match transition {
            Transition::Step(minutes, phase) => (phase, now + Duration::minutes(minutes), 0),
            Transition::Graduate => {
                let days = self.day_interval(stability, self.fuzz_draw(card, now));
                (CardState::Review, now + Duration::days(days as i64), days)
            }
        };

        let next = MemoryState {
            difficulty,
            stability,
            due,
            state,
            lapses,
            reps: card.reps + 1,
            last_review: Some(now),
            scheduled_days,
        };

        let log = ReviewLog {
            rating,
            state_before: card.state,
            state_after: state,
            due_before: card.due,
            due_after: due,
            stability_before: card.stability,
            stability_after: stability,
            difficulty_before: card.difficulty,
            difficulty_after: difficulty,
            retrievability,
            elapsed_days: elapsed,
            scheduled_days,
            reviewed_at: now,
        };

        Ok(ScheduledCard { state: next, log })
    }

    fn initial_stability(&self, rating: Rating) -> f64 {
        self.params.w[rating.value() as usize - 1].max(MIN_STABILITY)
    }

    fn initial_difficulty(&self, rating: Rating) -> f64 {
        let w = &self.params.w;
        clamp_difficulty(w[4] - (rating.value() as f64 - 3.0) * w[5])
    }

    /// Steps difficulty by rating, then reverts part of the way toward the
    /// initial difficulty of a `Good` rating.
    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let w = &self.params.w;
        let stepped = difficulty - w[6] * (rating.value() as f64 - 3.0);
        let reverted = w[7] * self.initial_difficulty(Rating::Good) + (1.0 - w[7]) * stepped;
        clamp_difficulty(reverted)
    }

    fn recall_stability(&self, difficulty: f64, stability: f64, r: f64, rating: Rating) -> f64 {
        let w = &self.params.w;
        let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
        let growth = w[8].exp()
            * (11.0 - difficulty)
            * stability.powf(-w[9])
            * ((1.0 - r) * w[10]).exp_m1()
            * hard_penalty
            * easy_bonus;
        (stability * (1.0 + growth.max(0.0))).max(stability)
    }

    fn forget_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        let w = &self.params.w;
        let forgotten = w[11]
            * difficulty.powf(-w[12])
            * ((stability + 1.0).powf(w[13]) - 1.0)
            * ((1.0 - r) * w[14]).exp();
        forgotten
            .max(MIN_STABILITY)
            .min(stability * LAPSE_STABILITY_CAP)
    }

    /// Whole-day interval for `stability`, fuzzed and clamped to
    /// `[1, maximum_interval]`.
    fn day_interval(&self, stability: f64, draw: f64) -> u32 {
        let maximum = self.params.maximum_interval as f64;
        let retention = self.params.request_retention;
        let raw = stability / FACTOR * (retention.powf(1.0 / DECAY) - 1.0);
        let interval = raw.round().clamp(1.0, maximum);

        let interval = if self.params.enable_fuzz && interval >= 2.5 {
            let (lo, hi) = fuzz_range(interval, maximum);
            (draw * (hi - lo + 1.0) + lo).floor()
        } else {
            interval
        };

        interval.clamp(1.0, maximum) as u32
    }

    /// One uniform draw in `[0, 1)` per (card state, review time). Independent
    /// of the rating, so fuzzed intervals keep the order Hard <= Good <= Easy.
    fn fuzz_draw(&self, card: &MemoryState, now: DateTime<Utc>) -> f64 {
        let mut seed = self.params.fuzz_seed.unwrap_or(0);
        for part in [
            now.timestamp_millis() as u64,
            card.reps as u64,
            card.stability.to_bits(),
            card.difficulty.to_bits(),
        ] {
            seed = splitmix(seed ^ part);
        }
        StdRng::seed_from_u64(seed).random::<f64>()
    }
}

fn fuzz_range(interval: f64, maximum: f64) -> (f64, f64) {
    let delta = FUZZ_RANGES.iter().fold(1.0, |delta, (start, end, factor)| {
        delta + factor * (interval.min(*end) - start).max(0.0)
    });
    let hi = (interval + delta).round().min(maximum);
    let lo = (interval - delta).round().max(2.0).min(hi);
    (lo, hi)
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn forgetting_curve(elapsed_days: f64, stability: f64) -> f64 {
    (1.0 + FACTOR * elapsed_days / stability).powf(DECAY)
}

fn elapsed_days(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - since).num_seconds() as f64 / 86_400.0).max(0.0)
}

fn clamp_difficulty(d: f64) -> f64 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

fn validate_state(card: &MemoryState) -> Result<(), SchedulingError> {
    if card.is_new() {
        if card.reps != 0 {
            return Err(SchedulingError::CorruptState(format!(
                "new card with {} reps",
                card.reps
            )));
        }
        return Ok(());
    }
    if !card.stability.is_finite() || card.stability <= 0.0 {
        return Err(SchedulingError::CorruptState(format!(
            "stability {} on a reviewed card",
            card.stability
        )));
    }
    if !card.difficulty.is_finite()
        || !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&card.difficulty)
    {
        return Err(SchedulingError::CorruptState(format!(
            "difficulty {} outside [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]",
            card.difficulty
        )));
    }
    if card.last_review.is_none() {
        return Err(SchedulingError::CorruptState(
            "reviewed card without a last review time".to_string(),
        ));
    }
    Ok(())
}
