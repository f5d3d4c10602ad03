use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use snapdeck_core::{CardState, MemoryState, Rating, Scheduler, SchedulerParams};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn rating() -> impl Strategy<Value = Rating> {
    prop::sample::select(Rating::ALL.to_vec())
}

/// A reviewed card plus a review time at or after its last review.
fn reviewed_card(phase: CardState) -> impl Strategy<Value = (MemoryState, DateTime<Utc>)> {
    (
        0.05f64..2_000.0,
        1.0f64..=10.0,
        1u32..200,
        0u32..50,
        0i64..3_650 * 24 * 60,
    )
        .prop_map(move |(stability, difficulty, reps, lapses, elapsed_minutes)| {
            let last = epoch();
            let card = MemoryState {
                difficulty,
                stability,
                due: last + Duration::days(stability.round() as i64),
                state: phase,
                lapses: lapses.min(reps),
                reps,
                last_review: Some(last),
                scheduled_days: stability.round() as u32,
            };
            (card, last + Duration::minutes(elapsed_minutes))
        })
}

fn any_card() -> impl Strategy<Value = (MemoryState, DateTime<Utc>)> {
    prop_oneof![
        (0i64..10_000).prop_map(|minutes| {
            (MemoryState::new(epoch()), epoch() + Duration::minutes(minutes))
        }),
        reviewed_card(CardState::Learning),
        reviewed_card(CardState::Relearning),
        reviewed_card(CardState::Review),
    ]
}

fn scheduler(seed: u64) -> Scheduler {
    Scheduler::new(SchedulerParams::default().with_fuzz_seed(seed)).unwrap()
}

proptest! {
    #[test]
    fn again_on_review_card_shrinks_stability_and_counts_a_lapse(
        (card, now) in reviewed_card(CardState::Review),
        seed in any::<u64>(),
    ) {
        let result = scheduler(seed).schedule(&card, Rating::Again, now).unwrap();
        prop_assert!(result.state.stability < card.stability);
        prop_assert!(result.state.stability > 0.0);
        prop_assert_eq!(result.state.lapses, card.lapses + 1);
        prop_assert_eq!(result.state.state, CardState::Relearning);
    }

    #[test]
    fn easy_is_never_due_before_good((card, now) in any_card(), seed in any::<u64>()) {
        let scheduler = scheduler(seed);
        let good = scheduler.schedule(&card, Rating::Good, now).unwrap();
        let easy = scheduler.schedule(&card, Rating::Easy, now).unwrap();
        prop_assert!(easy.state.due >= good.state.due);
    }

    #[test]
    fn due_stays_between_now_and_maximum_interval(
        (card, now) in any_card(),
        rating in rating(),
        maximum in 1u32..40_000,
        seed in any::<u64>(),
    ) {
        let params = SchedulerParams::default()
            .with_maximum_interval(maximum)
            .with_fuzz_seed(seed);
        let result = Scheduler::new(params).unwrap().schedule(&card, rating, now).unwrap();
        prop_assert!(result.state.due >= now);
        prop_assert!(result.state.due <= now + Duration::days(maximum as i64));
        prop_assert!(result.state.scheduled_days <= maximum);
    }

    #[test]
    fn difficulty_stays_in_range_and_reps_advance(
        (card, now) in any_card(),
        rating in rating(),
    ) {
        let result = Scheduler::default().schedule(&card, rating, now).unwrap();
        prop_assert!((1.0..=10.0).contains(&result.state.difficulty));
        prop_assert_eq!(result.state.reps, card.reps + 1);
        prop_assert_eq!(result.state.last_review, Some(now));
        prop_assert!(result.state.state != CardState::New);
    }

    #[test]
    fn identical_inputs_schedule_identically(
        (card, now) in any_card(),
        rating in rating(),
        seed in any::<u64>(),
    ) {
        let a = scheduler(seed).schedule(&card, rating, now).unwrap();
        let b = scheduler(seed).schedule(&card, rating, now).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn three_consecutive_lapses_keep_the_card_due_within_a_day(
        (card, start) in reviewed_card(CardState::Review),
    ) {
        let scheduler = Scheduler::default();
        let mut state = card.clone();
        let mut now = start;
        for _ in 0..3 {
            state = scheduler.schedule(&state, Rating::Again, now).unwrap().state;
            now = state.due;
        }
        prop_assert!(state.lapses >= card.lapses + 3);
        prop_assert!(state.due - state.last_review.unwrap() <= Duration::days(1));
    }
}
