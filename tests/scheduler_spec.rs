use chrono::{Duration, Utc};
use speculate2::speculate;
use study_companion::config::SchedulerConfig;
use study_companion::db::Database;
use study_companion::grading::Evaluation;
use study_companion::models::*;
use study_companion::scheduler::{
    Scheduler, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, RENORMALIZED_LAPSE_THRESHOLD,
};
use study_companion::store::StudyStore;
use study_companion::{Error, Result};
use uuid::Uuid;

/// Creates a document with one concept and `count` fresh questions.
fn seed_document(db: &Database, count: usize) -> (Document, Concept, Vec<Question>) {
    let document = db
        .create_document(CreateDocumentInput {
            filename: "lecture.pdf".to_string(),
            content: "Lecture text".to_string(),
        })
        .expect("Failed to create document");

    let concept = db
        .create_concept(
            document.id,
            CreateConceptInput {
                title: "Concept".to_string(),
                explanation: "Explanation".to_string(),
            },
        )
        .expect("Failed to create concept");

    let questions = (0..count)
        .map(|i| {
            db.create_question(
                concept.id,
                CreateQuestionInput {
                    prompt: format!("Question {}", i),
                    answer: format!("Answer {}", i),
                    difficulty: None,
                },
            )
            .expect("Failed to create question")
        })
        .collect();

    (document, concept, questions)
}

fn grade_as(is_correct: bool, score: i64) -> impl Fn(&str, &str, &str) -> Result<Evaluation> {
    move |_, _, _| {
        Ok(Evaluation {
            is_correct,
            score,
            feedback: "Graded".to_string(),
        })
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let scheduler = Scheduler::with_seed(db.clone(), 7);
    }

    describe "pick_next_due" {
        it "returns None for a document without questions" {
            let (document, _, _) = seed_document(&db, 0);

            let picked = scheduler.pick_next_due(document.id).expect("Pick failed");
            assert!(picked.is_none());
        }

        it "fails with NotFound for an unknown document" {
            let result = scheduler.pick_next_due(Uuid::new_v4());
            assert!(matches!(result, Err(Error::NotFound(_))));
        }

        it "never returns a question from another document" {
            let (document, _, questions) = seed_document(&db, 3);
            seed_document(&db, 3);

            let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
            for _ in 0..20 {
                let picked = scheduler.pick_next_due(document.id).unwrap().unwrap();
                assert!(ids.contains(&picked.id));
            }
        }

        it "always prefers never-reviewed questions over scheduled ones" {
            let (document, _, questions) = seed_document(&db, 2);
            scheduler.record_review(questions[0].id, true, 100).expect("Review failed");

            for _ in 0..10 {
                let picked = scheduler.pick_next_due(document.id).unwrap().unwrap();
                assert_eq!(picked.id, questions[1].id);
            }
        }

        it "picks the earliest scheduled question once everything was reviewed" {
            let (document, _, questions) = seed_document(&db, 2);
            let now = Utc::now();
            scheduler.record_review_at(questions[0].id, false, 10, now).unwrap();
            scheduler.record_review_at(questions[1].id, false, 10, now + Duration::hours(1)).unwrap();

            let picked = scheduler.pick_next_due(document.id).unwrap().unwrap();
            assert_eq!(picked.id, questions[0].id);
        }

        it "breaks ties between equally due questions at random" {
            let (document, _, _) = seed_document(&db, 5);

            let mut seen = std::collections::HashSet::new();
            for _ in 0..50 {
                seen.insert(scheduler.pick_next_due(document.id).unwrap().unwrap().id);
            }

            assert!(seen.len() > 1);
        }

        it "is reproducible with the same seed" {
            let (document, _, _) = seed_document(&db, 5);
            let first = Scheduler::with_seed(db.clone(), 42);
            let second = Scheduler::with_seed(db.clone(), 42);

            for _ in 0..10 {
                let a = first.pick_next_due(document.id).unwrap().unwrap();
                let b = second.pick_next_due(document.id).unwrap().unwrap();
                assert_eq!(a.id, b.id);
            }
        }

        it "does not modify any review state" {
            let (document, _, questions) = seed_document(&db, 2);

            scheduler.pick_next_due(document.id).unwrap();

            for question in &questions {
                let state = scheduler.review_state(question.id).unwrap();
                assert_eq!(state, ReviewState::new(question.id));
            }
        }
    }

    describe "due_questions" {
        it "lists questions that are unreviewed or past their due time" {
            let (document, _, questions) = seed_document(&db, 2);
            let now = Utc::now();
            scheduler.record_review_at(questions[0].id, true, 100, now).unwrap();

            let due_now = scheduler.due_questions(document.id, now).unwrap();
            assert_eq!(due_now.len(), 1);
            assert_eq!(due_now[0].id, questions[1].id);

            let due_later = scheduler.due_questions(document.id, now + Duration::days(2)).unwrap();
            assert_eq!(due_later.len(), 2);
            assert_eq!(due_later[0].id, questions[1].id);
        }
    }

    describe "record_review" {
        it "preserves the always-reset lapse policy on a fully correct answer" {
            let (_, _, questions) = seed_document(&db, 1);
            let now = Utc::now();

            let outcome = scheduler
                .record_review_at(questions[0].id, true, 100, now)
                .expect("Review failed");

            assert_eq!(outcome.attempt.quality, Quality::Success);
            assert!((outcome.state.ease_factor - 2.18).abs() < 1e-9);
            assert_eq!(outcome.state.interval, 1);
            assert_eq!(outcome.state.repetitions, 0);
            assert_eq!(outcome.state.last_reviewed, Some(now));
            assert_eq!(outcome.state.next_review, Some(now + Duration::days(1)));

            let stored = scheduler.review_state(questions[0].id).unwrap();
            assert_eq!(stored, outcome.state);
        }

        it "maps scores to quality levels" {
            let (_, _, questions) = seed_document(&db, 3);

            let partial = scheduler.record_review(questions[0].id, false, 70).unwrap();
            let failed = scheduler.record_review(questions[1].id, false, 30).unwrap();
            let lenient = scheduler.record_review(questions[2].id, false, 85).unwrap();

            assert_eq!(partial.attempt.quality, Quality::Partial);
            assert_eq!(failed.attempt.quality, Quality::Fail);
            assert_eq!(lenient.attempt.quality, Quality::Success);
        }

        it "keeps the ease factor at or above the floor" {
            let (_, _, questions) = seed_document(&db, 1);

            for _ in 0..10 {
                let outcome = scheduler.record_review(questions[0].id, false, 0).unwrap();
                assert!(outcome.state.ease_factor >= MIN_EASE_FACTOR);
            }

            let state = scheduler.review_state(questions[0].id).unwrap();
            assert_eq!(state.ease_factor, MIN_EASE_FACTOR);
        }

        it "appends a concept-scoped attempt" {
            let (document, concept, questions) = seed_document(&db, 1);

            scheduler.record_review(questions[0].id, true, 100).unwrap();
            scheduler.record_review(questions[0].id, false, 20).unwrap();

            let attempts = db.get_attempts_by_concept(concept.id).unwrap();
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|a| a.question_id == questions[0].id));

            let counts = db.attempt_counts(document.id).unwrap();
            assert_eq!(counts, AttemptCounts { total: 2, correct: 1, incorrect: 1 });
        }

        it "rejects an out-of-range score and leaves the state untouched" {
            let (document, _, questions) = seed_document(&db, 1);
            let before = scheduler.review_state(questions[0].id).unwrap();

            let result = scheduler.record_review(questions[0].id, true, 150);

            assert!(matches!(result, Err(Error::InvalidArgument(_))));
            assert_eq!(scheduler.review_state(questions[0].id).unwrap(), before);
            assert_eq!(db.attempt_counts(document.id).unwrap().total, 0);
        }

        it "rejects a negative score" {
            let (_, _, questions) = seed_document(&db, 1);

            let result = scheduler.record_review(questions[0].id, false, -1);
            assert!(matches!(result, Err(Error::InvalidArgument(_))));
        }

        it "fails with NotFound for an unknown question and records nothing" {
            let (document, _, _) = seed_document(&db, 1);

            let result = scheduler.record_review(Uuid::new_v4(), true, 100);

            assert!(matches!(result, Err(Error::NotFound(_))));
            assert_eq!(db.attempt_counts(document.id).unwrap().total, 0);
        }

        it "grows the interval when the lapse threshold is renormalized" {
            let (_, _, questions) = seed_document(&db, 1);
            let scheduler = Scheduler::with_seed(db.clone(), 7).with_config(SchedulerConfig {
                lapse_threshold: RENORMALIZED_LAPSE_THRESHOLD,
                ..SchedulerConfig::default()
            });
            let now = Utc::now();

            let first = scheduler.record_review_at(questions[0].id, true, 100, now).unwrap();
            assert_eq!((first.state.interval, first.state.repetitions), (1, 1));

            let second = scheduler.record_review_at(questions[0].id, true, 100, now).unwrap();
            assert_eq!((second.state.interval, second.state.repetitions), (3, 2));

            let lapse = scheduler.record_review_at(questions[0].id, false, 65, now).unwrap();
            assert_eq!((lapse.state.interval, lapse.state.repetitions), (1, 0));
        }

        it "caps the interval over a long run of successful reviews" {
            let (document, _, questions) = seed_document(&db, 1);
            let scheduler = Scheduler::with_seed(db.clone(), 7).with_config(SchedulerConfig {
                lapse_threshold: RENORMALIZED_LAPSE_THRESHOLD,
                ..SchedulerConfig::default()
            });
            let now = Utc::now();

            for _ in 0..200 {
                let outcome = scheduler
                    .record_review_at(questions[0].id, true, 100, now)
                    .expect("Review failed");
                assert!(outcome.state.interval <= MAX_INTERVAL_DAYS);
            }

            let state = scheduler.review_state(questions[0].id).unwrap();
            assert_eq!(state.interval, MAX_INTERVAL_DAYS);
            assert_eq!(state.repetitions, 200);
            assert_eq!(
                state.next_review,
                Some(now + Duration::days(i64::from(MAX_INTERVAL_DAYS)))
            );

            // The shared handle keeps working afterwards
            assert!(db.get_document(document.id).unwrap().is_some());
            assert_eq!(db.attempt_counts(document.id).unwrap().total, 200);
        }
    }

    describe "submit_answer" {
        it "grades the answer and records the outcome" {
            let (_, _, questions) = seed_document(&db, 1);

            let feedback = scheduler
                .submit_answer(questions[0].id, "My answer", &grade_as(true, 92))
                .expect("Submit failed");

            assert!(feedback.evaluation.is_correct);
            assert_eq!(feedback.correct_answer, "Answer 0");
            assert_eq!(feedback.outcome.attempt.score, 92);
            assert_eq!(feedback.outcome.attempt.quality, Quality::Success);
        }

        it "rejects a blank answer" {
            let (document, _, questions) = seed_document(&db, 1);

            let result = scheduler.submit_answer(questions[0].id, "   ", &grade_as(true, 100));

            assert!(matches!(result, Err(Error::InvalidArgument(_))));
            assert_eq!(db.attempt_counts(document.id).unwrap().total, 0);
        }

        it "records nothing when grading fails" {
            let (document, _, questions) = seed_document(&db, 1);
            let failing = |_: &str, _: &str, _: &str| -> Result<Evaluation> {
                Err(Error::Grading("model unavailable".to_string()))
            };

            let result = scheduler.submit_answer(questions[0].id, "An answer", &failing);

            assert!(matches!(result, Err(Error::Grading(_))));
            assert_eq!(db.attempt_counts(document.id).unwrap().total, 0);
        }

        it "fails with NotFound for an unknown question" {
            let result = scheduler.submit_answer(Uuid::new_v4(), "An answer", &grade_as(true, 100));
            assert!(matches!(result, Err(Error::NotFound(_))));
        }
    }
}

/// A store whose every operation fails, to check storage errors pass through untouched.
struct BrokenStore;

impl StudyStore for BrokenStore {
    fn document_exists(&self, _: Uuid) -> Result<bool> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn concept_ids_for_document(&self, _: Uuid) -> Result<Vec<Uuid>> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn question_ids_for_concept(&self, _: Uuid) -> Result<Vec<Uuid>> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn question(&self, _: Uuid) -> Result<Option<Question>> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn review_state(&self, _: Uuid) -> Result<Option<ReviewState>> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn apply_review(
        &self,
        _: Uuid,
        _: &dyn Fn(&Question, &ReviewState) -> ReviewOutcome,
    ) -> Result<Option<ReviewOutcome>> {
        Err(rusqlite::Error::InvalidQuery.into())
    }

    fn attempt_counts(&self, _: Uuid) -> Result<AttemptCounts> {
        Err(rusqlite::Error::InvalidQuery.into())
    }
}

mod storage_failures {
    use super::*;

    #[test]
    fn pick_next_due_propagates_storage_errors() {
        let scheduler = Scheduler::with_seed(BrokenStore, 1);
        assert!(matches!(
            scheduler.pick_next_due(Uuid::new_v4()),
            Err(Error::Storage(rusqlite::Error::InvalidQuery))
        ));
    }

    #[test]
    fn record_review_propagates_storage_errors() {
        let scheduler = Scheduler::with_seed(BrokenStore, 1);
        assert!(matches!(
            scheduler.record_review(Uuid::new_v4(), true, 100),
            Err(Error::Storage(rusqlite::Error::InvalidQuery))
        ));
    }
}

/// Delegates to the database but walks concepts and questions one at a time
/// instead of using the joined candidate query.
struct WalkingStore(Database);

impl StudyStore for WalkingStore {
    fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        self.0.document_exists(document_id)
    }

    fn concept_ids_for_document(&self, document_id: Uuid) -> Result<Vec<Uuid>> {
        self.0.concept_ids_for_document(document_id)
    }

    fn question_ids_for_concept(&self, concept_id: Uuid) -> Result<Vec<Uuid>> {
        self.0.question_ids_for_concept(concept_id)
    }

    fn question(&self, question_id: Uuid) -> Result<Option<Question>> {
        self.0.question(question_id)
    }

    fn review_state(&self, question_id: Uuid) -> Result<Option<ReviewState>> {
        self.0.review_state(question_id)
    }

    fn apply_review(
        &self,
        question_id: Uuid,
        update: &dyn Fn(&Question, &ReviewState) -> ReviewOutcome,
    ) -> Result<Option<ReviewOutcome>> {
        self.0.apply_review(question_id, update)
    }

    fn attempt_counts(&self, document_id: Uuid) -> Result<AttemptCounts> {
        self.0.attempt_counts(document_id)
    }
}

mod concept_walk {
    use super::*;

    fn add_concept(db: &Database, document_id: Uuid, questions: usize) -> Vec<Question> {
        let concept = db
            .create_concept(
                document_id,
                CreateConceptInput {
                    title: "Second concept".to_string(),
                    explanation: "More".to_string(),
                },
            )
            .expect("Failed to create concept");

        (0..questions)
            .map(|i| {
                db.create_question(
                    concept.id,
                    CreateQuestionInput {
                        prompt: format!("Extra {}", i),
                        answer: "Answer".to_string(),
                        difficulty: None,
                    },
                )
                .expect("Failed to create question")
            })
            .collect()
    }

    fn sorted_ids(questions: &[Question]) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        ids.sort();
        ids
    }

    fn setup() -> (Database, Document, Vec<Question>, Vec<Question>) {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");

        let (document, _, mut questions) = seed_document(&db, 2);
        questions.extend(add_concept(&db, document.id, 2));
        let (_, _, other_questions) = seed_document(&db, 3);

        (db, document, questions, other_questions)
    }

    #[test]
    fn default_candidates_match_the_joined_query() {
        let (db, document, _, _) = setup();
        let walking = WalkingStore(db.clone());

        let mut walked: Vec<(Uuid, Option<chrono::DateTime<Utc>>)> = walking
            .review_candidates(document.id)
            .unwrap()
            .into_iter()
            .map(|c| (c.question.id, c.next_review))
            .collect();
        let mut joined: Vec<(Uuid, Option<chrono::DateTime<Utc>>)> = db
            .review_candidates(document.id)
            .unwrap()
            .into_iter()
            .map(|c| (c.question.id, c.next_review))
            .collect();
        walked.sort();
        joined.sort();

        assert_eq!(walked.len(), 4);
        assert_eq!(walked, joined);
    }

    #[test]
    fn due_questions_agree_with_the_joined_query() {
        let (db, document, questions, _) = setup();
        let now = Utc::now();
        let joined = Scheduler::with_seed(db.clone(), 5);
        let walking = Scheduler::with_seed(WalkingStore(db.clone()), 5);

        joined.record_review_at(questions[0].id, true, 100, now).unwrap();
        joined.record_review_at(questions[3].id, false, 20, now).unwrap();

        let due_now = walking.due_questions(document.id, now).unwrap();
        assert_eq!(
            sorted_ids(&due_now),
            sorted_ids(&joined.due_questions(document.id, now).unwrap())
        );
        assert_eq!(sorted_ids(&due_now), sorted_ids(&questions[1..3]));

        let later = now + Duration::days(2);
        assert_eq!(
            sorted_ids(&walking.due_questions(document.id, later).unwrap()),
            sorted_ids(&questions)
        );
    }

    #[test]
    fn pick_next_due_stays_within_the_document() {
        let (db, document, questions, other_questions) = setup();
        let walking = Scheduler::with_seed(WalkingStore(db.clone()), 9);
        let now = Utc::now();
        for question in &questions[..3] {
            walking.record_review_at(question.id, true, 100, now).unwrap();
        }

        for _ in 0..10 {
            let picked = walking.pick_next_due(document.id).unwrap().expect("Expected a question");
            assert_eq!(picked.id, questions[3].id);
            assert!(other_questions.iter().all(|q| q.id != picked.id));
        }
    }
}
