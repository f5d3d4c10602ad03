use chrono::{DateTime, Duration, TimeZone, Utc};
use snapdeck::db::Database;
use snapdeck::error::Error;
use snapdeck::models::*;
use snapdeck::study::StudyManager;
use snapdeck_core::{CardState, Scheduler, SchedulerParams};
use speculate2::speculate;
use uuid::Uuid;

fn deck_input(cards: usize) -> CreateDeckInput {
    CreateDeckInput {
        name: "Anatomy".to_string(),
        description: Some("Bones and muscles".to_string()),
        difficulty: DifficultyLevel::Medium,
        source: CardSource::Saved,
        cards: (0..cards)
            .map(|i| FlashcardInput {
                question: format!("Bone {i}?"),
                answer: format!("Answer {i}"),
                tags: vec!["skeleton".to_string()],
            })
            .collect(),
        max_new_cards_per_day: None,
        max_reviews_per_day: None,
    }
}

fn rating(value: i64) -> ReviewInput {
    ReviewInput {
        rating: value,
        study_time: Some(3),
        expected_index: None,
    }
}

/// Start a one-card session at `at` and rate whatever comes up.
fn review_once(study: &StudyManager, deck_id: Uuid, value: i64, at: DateTime<Utc>) -> ReviewOutcome {
    let started = study.start(deck_id, Some(1), at).expect("start");
    assert_eq!(started.total_cards, 1, "expected a due card at {at}");
    study.review(started.session_id, rating(value), at).expect("review")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let params = SchedulerParams::default().with_fuzz_seed(7);
        let study = StudyManager::new(db, Scheduler::new(params).expect("params"), 20);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
    }

    describe "start" {
        it "queues new cards in deck order" {
            let deck = study.decks().create_deck(deck_input(3), t0).expect("create");

            let started = study.start(deck.id, Some(3), t0).expect("start");
            let session = study.sessions().get_session(started.session_id).expect("load").value;

            assert_eq!(session.card_queue, deck.cards.iter().map(|c| c.id).collect::<Vec<_>>());
            assert_eq!(session.state, SessionState::InProgress);
        }

        it "caps new cards by the daily budget" {
            let mut input = deck_input(4);
            input.max_new_cards_per_day = Some(2);
            let deck = study.decks().create_deck(input, t0).expect("create");

            review_once(&study, deck.id, 3, t0);
            let started = study.start(deck.id, Some(10), t0).expect("start");
            assert_eq!(started.total_cards, 1);

            let next_day = study.start(deck.id, Some(10), t0 + Duration::days(1)).expect("start");
            assert_eq!(next_day.total_cards, 3);
        }

        it "rejects non-positive maxCards before touching storage" {
            let result = study.start(Uuid::new_v4(), Some(0), t0);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    describe "review" {
        it "moves a new card through learning into review" {
            let deck = study.decks().create_deck(deck_input(1), t0).expect("create");

            let learning = review_once(&study, deck.id, 3, t0);
            assert_eq!(learning.state, CardState::Learning);
            assert_eq!(learning.interval, 0);
            assert_eq!(learning.next_due, t0 + Duration::minutes(10));

            let graduated = review_once(&study, deck.id, 3, t0 + Duration::minutes(10));
            assert_eq!(graduated.state, CardState::Review);
            assert!(graduated.interval >= 1);
        }

        it "easy graduates a new card immediately" {
            let deck = study.decks().create_deck(deck_input(1), t0).expect("create");

            let outcome = review_once(&study, deck.id, 4, t0);

            assert_eq!(outcome.state, CardState::Review);
            assert!(outcome.next_due >= t0 + Duration::days(1));
        }

        it "three consecutive lapses keep the card on short steps" {
            let deck = study.decks().create_deck(deck_input(1), t0).expect("create");
            let graduated = review_once(&study, deck.id, 4, t0);
            let mut at = graduated.next_due;

            for _ in 0..3 {
                let outcome = review_once(&study, deck.id, 1, at);
                assert_eq!(outcome.state, CardState::Relearning);
                at = outcome.next_due;
            }

            let card = &study.decks().get_deck(deck.id).expect("load").cards[0];
            assert!(card.memory.lapses >= 3);
            let last_review = card.memory.last_review.expect("reviewed");
            assert!(card.memory.due - last_review <= Duration::days(1));
        }

        it "records the review in session and deck statistics" {
            let deck = study.decks().create_deck(deck_input(2), t0).expect("create");
            let started = study.start(deck.id, None, t0).expect("start");

            study.review(started.session_id, rating(4), t0).expect("review");
            study.review(started.session_id, rating(2), t0).expect("review");

            let stats = study.stats(started.session_id).expect("stats");
            assert!(stats.completed);
            assert_eq!(stats.stats.totals.reviewed_cards, 2);
            assert_eq!(stats.stats.totals.correct_answers, 1);
            assert_eq!(stats.stats.totals.study_time_seconds, 6);
            assert_eq!(stats.reviews[0].card_id, deck.cards[0].id);

            let stored = study.decks().get_deck(deck.id).expect("load");
            assert_eq!(stored.stats.total_reviews, 2);
            assert!((stored.stats.average_grade - 3.0).abs() < 1e-9);
            assert_eq!(stored.cards[0].last_reviewed, Some(t0));
        }

        it "replays a stale expectedIndex without rescheduling" {
            let deck = study.decks().create_deck(deck_input(2), t0).expect("create");
            let started = study.start(deck.id, None, t0).expect("start");
            let first = study.review(started.session_id, ReviewInput {
                rating: 3,
                study_time: None,
                expected_index: Some(0),
            }, t0).expect("review");

            let replayed = study.review(started.session_id, ReviewInput {
                rating: 1,
                study_time: None,
                expected_index: Some(0),
            }, t0 + Duration::minutes(1)).expect("replay");

            assert!(replayed.replayed);
            assert_eq!(replayed.state, first.state);
            assert_eq!(replayed.next_due, first.next_due);
            let stored = study.decks().get_deck(deck.id).expect("load");
            assert_eq!(stored.cards[0].memory.reps, 1);
            assert_eq!(stored.stats.total_reviews, 1);
        }

        it "counts every review when two sessions share a deck" {
            let mut input = deck_input(60);
            input.max_new_cards_per_day = Some(100);
            let deck = study.decks().create_deck(input, t0).expect("create");
            let first = study.start(deck.id, Some(20), t0).expect("start");
            let second = study.start(deck.id, Some(40), t0).expect("start");

            let drain = |session_id: Uuid| {
                let (mut applied, mut failed) = (0u64, 0u64);
                loop {
                    match study.review(session_id, rating(3), t0) {
                        Ok(outcome) => {
                            applied += 1;
                            if outcome.completed {
                                break;
                            }
                        }
                        Err(_) => {
                            failed += 1;
                            break;
                        }
                    }
                }
                (applied, failed)
            };
            let results = std::thread::scope(|scope| {
                let a = scope.spawn(|| drain(first.session_id));
                let b = scope.spawn(|| drain(second.session_id));
                [a.join().expect("thread"), b.join().expect("thread")]
            });

            let applied: u64 = results.iter().map(|(ok, _)| ok).sum();
            let failed: u64 = results.iter().map(|(_, err)| err).sum();
            assert_eq!(failed, 0);
            assert_eq!(applied, 60);

            let stored = study.decks().get_deck(deck.id).expect("load");
            let reps: u64 = stored.cards.iter().map(|c| u64::from(c.memory.reps)).sum();
            assert_eq!(stored.stats.total_reviews, applied);
            assert_eq!(reps, applied);
        }
    }

    describe "next" {
        it "shows retrievability only for reviewed cards" {
            let deck = study.decks().create_deck(deck_input(1), t0).expect("create");
            let started = study.start(deck.id, None, t0).expect("start");

            let fresh = study.next(started.session_id).expect("next");
            assert_eq!(fresh.card.expect("card").retrievability, None);

            review_once(&study, deck.id, 4, t0 + Duration::minutes(1));
            let later = t0 + Duration::days(60);
            let revisit = study.start(deck.id, None, later).expect("start");
            let shown = study.next(revisit.session_id).expect("next");
            let r = shown.card.expect("card").retrievability.expect("reviewed");
            assert!(r > 0.0 && r < 1.0);
        }

        it "returns the same response for a review card on every call" {
            let deck = study.decks().create_deck(deck_input(1), t0).expect("create");
            review_once(&study, deck.id, 4, t0);
            let later = t0 + Duration::days(60);
            let started = study.start(deck.id, None, later).expect("start");

            let first = study.next(started.session_id).expect("next");
            let second = study.next(started.session_id).expect("next");

            assert_eq!(first, second);
            let card = first.card.expect("card");
            assert_eq!(card.state, CardState::Review);
            let memory = &study.decks().get_deck(deck.id).expect("load").cards[0].memory;
            assert_eq!(card.retrievability, study.scheduler().retrievability(memory, later));
        }
    }
}
