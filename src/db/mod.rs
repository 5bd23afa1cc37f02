mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::StudyStore;

const QUESTION_COLUMNS: &str = "id, concept_id, prompt, answer, difficulty, created_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        tracing::info!("Opened database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> anyhow::Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "study-companion")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("study.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Document operations
    // ============================================================

    pub fn get_all_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, filename, content, created_at
             FROM documents ORDER BY created_at DESC, filename",
        )?;

        let documents = stmt
            .query_map([], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let document = conn
            .query_row(
                "SELECT id, filename, content, created_at FROM documents WHERE id = ?",
                [id.to_string()],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    pub fn create_document(&self, input: CreateDocumentInput) -> Result<Document> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO documents (id, filename, content, created_at) VALUES (?, ?, ?, ?)",
            (id.to_string(), &input.filename, &input.content, now.to_rfc3339()),
        )?;

        Ok(Document {
            id,
            filename: input.filename,
            content: input.content,
            created_at: now,
        })
    }

    pub fn get_document_with_concepts(&self, id: Uuid) -> Result<Option<DocumentWithConcepts>> {
        let Some(document) = self.get_document(id)? else {
            return Ok(None);
        };

        let concepts = self.get_concepts_by_document(id)?;

        Ok(Some(DocumentWithConcepts { document, concepts }))
    }

    // ============================================================
    // Concept operations
    // ============================================================

    pub fn get_concepts_by_document(&self, document_id: Uuid) -> Result<Vec<Concept>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, document_id, title, explanation, created_at
             FROM concepts WHERE document_id = ? ORDER BY created_at, title",
        )?;

        let concepts = stmt
            .query_map([document_id.to_string()], concept_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(concepts)
    }

    pub fn get_concept(&self, id: Uuid) -> Result<Option<Concept>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let concept = conn
            .query_row(
                "SELECT id, document_id, title, explanation, created_at
                 FROM concepts WHERE id = ?",
                [id.to_string()],
                concept_from_row,
            )
            .optional()?;
        Ok(concept)
    }

    pub fn create_concept(&self, document_id: Uuid, input: CreateConceptInput) -> Result<Concept> {
        self.get_document(document_id)?
            .ok_or_else(|| Error::not_found("document", document_id))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO concepts (id, document_id, title, explanation, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                document_id.to_string(),
                &input.title,
                &input.explanation,
                now.to_rfc3339(),
            ),
        )?;

        Ok(Concept {
            id,
            document_id,
            title: input.title,
            explanation: input.explanation,
            created_at: now,
        })
    }

    // ============================================================
    // Question operations
    // ============================================================

    pub fn get_questions_by_concept(&self, concept_id: Uuid) -> Result<Vec<Question>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM questions WHERE concept_id = ? ORDER BY created_at, id",
            QUESTION_COLUMNS
        ))?;

        let questions = stmt
            .query_map([concept_id.to_string()], question_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(questions)
    }

    pub fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_question(&conn, id)
    }

    /// Create a question and its default review state in one transaction.
    pub fn create_question(&self, concept_id: Uuid, input: CreateQuestionInput) -> Result<Question> {
        self.get_concept(concept_id)?
            .ok_or_else(|| Error::not_found("concept", concept_id))?;

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let difficulty = input.difficulty.unwrap_or_default();

        tx.execute(
            "INSERT INTO questions (id, concept_id, prompt, answer, difficulty, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                concept_id.to_string(),
                &input.prompt,
                &input.answer,
                difficulty.as_str(),
                now.to_rfc3339(),
            ),
        )?;
        write_review_state(&tx, &ReviewState::new(id))?;
        tx.commit()?;

        Ok(Question {
            id,
            concept_id,
            prompt: input.prompt,
            answer: input.answer,
            difficulty,
            created_at: now,
        })
    }

    // ============================================================
    // Review operations
    // ============================================================

    pub fn get_review_state(&self, question_id: Uuid) -> Result<Option<ReviewState>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_review_state(&conn, question_id)
    }

    /// Attempts recorded against a concept, newest first.
    pub fn get_attempts_by_concept(&self, concept_id: Uuid) -> Result<Vec<ReviewAttempt>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, concept_id, question_id, correct, score, quality, created_at
             FROM review_attempts WHERE concept_id = ? ORDER BY created_at DESC, id",
        )?;

        let attempts = stmt
            .query_map([concept_id.to_string()], |row| {
                Ok(ReviewAttempt {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    concept_id: parse_uuid(row.get::<_, String>(1)?),
                    question_id: parse_uuid(row.get::<_, String>(2)?),
                    correct: row.get(3)?,
                    score: row.get(4)?,
                    quality: Quality::from_value(row.get(5)?).unwrap_or(Quality::Fail),
                    created_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(attempts)
    }
}

impl StudyStore for Database {
    fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE id = ?",
            [document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn concept_ids_for_document(&self, document_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt =
            conn.prepare("SELECT id FROM concepts WHERE document_id = ? ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([document_id.to_string()], |row| {
                Ok(parse_uuid(row.get::<_, String>(0)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn concept_count(&self, document_id: Uuid) -> Result<u64> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM concepts WHERE document_id = ?",
            [document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn question_ids_for_concept(&self, concept_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt =
            conn.prepare("SELECT id FROM questions WHERE concept_id = ? ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([concept_id.to_string()], |row| {
                Ok(parse_uuid(row.get::<_, String>(0)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn question(&self, question_id: Uuid) -> Result<Option<Question>> {
        self.get_question(question_id)
    }

    fn review_state(&self, question_id: Uuid) -> Result<Option<ReviewState>> {
        self.get_review_state(question_id)
    }

    fn review_candidates(&self, document_id: Uuid) -> Result<Vec<ReviewCandidate>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT q.id, q.concept_id, q.prompt, q.answer, q.difficulty, q.created_at, rs.next_review
             FROM questions q
             JOIN concepts c ON q.concept_id = c.id
             LEFT JOIN review_states rs ON rs.question_id = q.id
             WHERE c.document_id = ?
             ORDER BY q.created_at, q.id",
        )?;

        let candidates = stmt
            .query_map([document_id.to_string()], |row| {
                Ok(ReviewCandidate {
                    question: question_from_row(row)?,
                    next_review: row.get::<_, Option<String>>(6)?.map(parse_datetime),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    fn apply_review(
        &self,
        question_id: Uuid,
        update: &dyn Fn(&Question, &ReviewState) -> ReviewOutcome,
    ) -> Result<Option<ReviewOutcome>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        // Immediate: take the write lock before reading so concurrent reviews can't interleave.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(question) = query_question(&tx, question_id)? else {
            return Ok(None);
        };
        let current =
            query_review_state(&tx, question_id)?.unwrap_or_else(|| ReviewState::new(question_id));

        let outcome = update(&question, &current);

        write_review_state(&tx, &outcome.state)?;
        tx.execute(
            "INSERT INTO review_attempts (id, concept_id, question_id, correct, score, quality, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                outcome.attempt.id.to_string(),
                outcome.attempt.concept_id.to_string(),
                outcome.attempt.question_id.to_string(),
                outcome.attempt.correct,
                outcome.attempt.score,
                outcome.attempt.quality.value(),
                outcome.attempt.created_at.to_rfc3339(),
            ),
        )?;
        tx.commit()?;

        Ok(Some(outcome))
    }

    fn attempt_counts(&self, document_id: Uuid) -> Result<AttemptCounts> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let (total, correct, incorrect): (i64, i64, i64) = conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN a.correct = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN a.correct = 0 THEN 1 ELSE 0 END), 0)
             FROM review_attempts a
             JOIN concepts c ON a.concept_id = c.id
             WHERE c.document_id = ?",
            [document_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(AttemptCounts {
            total: total as u64,
            correct: correct as u64,
            incorrect: incorrect as u64,
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn query_question(conn: &Connection, id: Uuid) -> Result<Option<Question>> {
    let question = conn
        .query_row(
            &format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS),
            [id.to_string()],
            question_from_row,
        )
        .optional()?;
    Ok(question)
}

fn query_review_state(conn: &Connection, question_id: Uuid) -> Result<Option<ReviewState>> {
    let state = conn
        .query_row(
            "SELECT question_id, ease_factor, interval_days, repetitions, last_reviewed, next_review
             FROM review_states WHERE question_id = ?",
            [question_id.to_string()],
            |row| {
                Ok(ReviewState {
                    question_id: parse_uuid(row.get::<_, String>(0)?),
                    ease_factor: row.get(1)?,
                    interval: row.get(2)?,
                    repetitions: row.get(3)?,
                    last_reviewed: row.get::<_, Option<String>>(4)?.map(parse_datetime),
                    next_review: row.get::<_, Option<String>>(5)?.map(parse_datetime),
                })
            },
        )
        .optional()?;
    Ok(state)
}

fn write_review_state(conn: &Connection, state: &ReviewState) -> Result<()> {
    conn.execute(
        "INSERT INTO review_states (question_id, ease_factor, interval_days, repetitions, last_reviewed, next_review)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(question_id) DO UPDATE SET
            ease_factor = excluded.ease_factor,
            interval_days = excluded.interval_days,
            repetitions = excluded.repetitions,
            last_reviewed = excluded.last_reviewed,
            next_review = excluded.next_review",
        (
            state.question_id.to_string(),
            state.ease_factor,
            state.interval,
            state.repetitions,
            state.last_reviewed.map(|dt| dt.to_rfc3339()),
            state.next_review.map(|dt| dt.to_rfc3339()),
        ),
    )?;
    Ok(())
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: parse_uuid(row.get::<_, String>(0)?),
        filename: row.get(1)?,
        content: row.get(2)?,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn concept_from_row(row: &Row<'_>) -> rusqlite::Result<Concept> {
    Ok(Concept {
        id: parse_uuid(row.get::<_, String>(0)?),
        document_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        explanation: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

/// Expects the columns in [`QUESTION_COLUMNS`] order at the start of the row.
fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: parse_uuid(row.get::<_, String>(0)?),
        concept_id: parse_uuid(row.get::<_, String>(1)?),
        prompt: row.get(2)?,
        answer: row.get(3)?,
        difficulty: Difficulty::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

/// Unreadable timestamps fall back to now, which makes an affected question due.
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!("Unreadable timestamp {:?} in database, using now: {}", s, e);
            Utc::now()
        })
}
