use super::{
    validate_draft_fields, Backend, ProgressPatch, QuestionDraft, QuestionPatch, Store, StoreError,
};
use crate::model::{Exam, PersonalProgress, Question, QuestionType, User};
use chrono::{DateTime, DurationRound, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DB_FILE: &str = "study.sqlite3";

/// Relational backend. Column names are snake_case on disk and mapped to the
/// camelCase wire model by the row readers below; tags live in a TEXT column
/// as a JSON array.
pub struct SqliteStore {
    workspace: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(workspace.join(DB_FILE))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS exams(
                id TEXT PRIMARY KEY,
                identifier TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS questions(
                id TEXT PRIMARY KEY,
                exam_id TEXT NOT NULL,
                question_number INTEGER NOT NULL,
                type TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(exam_id) REFERENCES exams(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_questions_exam ON questions(exam_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS personal_progress(
                user_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                solved INTEGER NOT NULL,
                notes TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY(user_id, question_id),
                FOREIGN KEY(user_id) REFERENCES users(id),
                FOREIGN KEY(question_id) REFERENCES questions(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_progress_user ON personal_progress(user_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_progress_question ON personal_progress(question_id)",
            [],
        )?;

        Ok(SqliteStore {
            workspace: workspace.to_path_buf(),
            conn,
        })
    }

    fn exam_exists(&self, exam_id: &str) -> Result<bool, StoreError> {
        let hit: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM exams WHERE id = ?", [exam_id], |r| r.get(0))
            .optional()?;
        Ok(hit.is_some())
    }

    fn read_question(&self, question_id: &str) -> Result<Question, StoreError> {
        let row: Option<(String, String, i64, String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, exam_id, question_number, type, tags, created_at, updated_at
                 FROM questions WHERE id = ?",
                [question_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                        r.get(6)?,
                    ))
                },
            )
            .optional()?;
        let Some(row) = row else {
            return Err(StoreError::NotFound("question", question_id.to_string()));
        };
        question_from_row(row)
    }
}

/// Current time at the precision the stamps are stored with, so values
/// returned from a write equal what a later read parses back.
fn now() -> DateTime<Utc> {
    let t = Utc::now();
    t.duration_trunc(chrono::Duration::microseconds(1)).unwrap_or(t)
}

fn stamp(t: DateTime<Utc>) -> String {
    // Fixed-width stamps so text ordering matches chronological ordering.
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", s, e)))
}

fn question_from_row(
    (id, exam_id, question_number, qtype, tags, created_at, updated_at): (
        String,
        String,
        i64,
        String,
        String,
        String,
        String,
    ),
) -> Result<Question, StoreError> {
    let question_type = QuestionType::parse(&qtype)
        .ok_or_else(|| StoreError::Corrupt(format!("bad question type {:?}", qtype)))?;
    let tags: Vec<String> = serde_json::from_str(&tags)?;
    Ok(Question {
        id,
        exam_id,
        question_number,
        question_type,
        tags,
        created_at: parse_stamp(&created_at)?,
        updated_at: parse_stamp(&updated_at)?,
    })
}

impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn data_files(&self) -> Vec<PathBuf> {
        vec![self.workspace.join(DB_FILE)]
    }

    fn list_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identifier, created_at, updated_at
             FROM exams ORDER BY created_at DESC, id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, identifier, created_at, updated_at)| {
                Ok(Exam {
                    id,
                    identifier,
                    created_at: parse_stamp(&created_at)?,
                    updated_at: parse_stamp(&updated_at)?,
                })
            })
            .collect()
    }

    fn create_exam(&mut self, identifier: &str) -> Result<Exam, StoreError> {
        // Uniqueness pre-check by query; the UNIQUE constraint backstops the
        // (unguarded) race between check and insert.
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM exams WHERE identifier = ?",
                [identifier],
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicateIdentifier(identifier.to_string()));
        }

        let now = now();
        let exam = Exam {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            created_at: now,
            updated_at: now,
        };
        match self.conn.execute(
            "INSERT INTO exams(id, identifier, created_at, updated_at) VALUES(?, ?, ?, ?)",
            (&exam.id, &exam.identifier, stamp(now), stamp(now)),
        ) {
            Ok(_) => Ok(exam),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateIdentifier(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_exam(&mut self, exam_id: &str) -> Result<usize, StoreError> {
        if !self.exam_exists(exam_id)? {
            return Err(StoreError::NotFound("exam", exam_id.to_string()));
        }

        let tx = self.conn.unchecked_transaction()?;
        // Explicit dependency-order deletes; no ON DELETE CASCADE.
        tx.execute(
            "DELETE FROM personal_progress
             WHERE question_id IN (SELECT id FROM questions WHERE exam_id = ?)",
            [exam_id],
        )?;
        let deleted_questions =
            tx.execute("DELETE FROM questions WHERE exam_id = ?", [exam_id])?;
        tx.execute("DELETE FROM exams WHERE id = ?", [exam_id])?;
        tx.commit()?;
        Ok(deleted_questions)
    }

    fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, exam_id, question_number, type, tags, created_at, updated_at
             FROM questions ORDER BY created_at DESC, id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(question_from_row).collect()
    }

    fn create_question(&mut self, draft: QuestionDraft) -> Result<Question, StoreError> {
        validate_draft_fields(draft.question_number)?;
        if !self.exam_exists(&draft.exam_id)? {
            return Err(StoreError::NotFound("exam", draft.exam_id));
        }

        let now = now();
        let question = Question {
            id: Uuid::new_v4().to_string(),
            exam_id: draft.exam_id,
            question_number: draft.question_number,
            question_type: draft.question_type,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO questions(id, exam_id, question_number, type, tags, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &question.id,
                &question.exam_id,
                question.question_number,
                question.question_type.as_str(),
                serde_json::to_string(&question.tags)?,
                stamp(now),
                stamp(now),
            ),
        )?;
        Ok(question)
    }

    fn update_question(
        &mut self,
        question_id: &str,
        patch: QuestionPatch,
    ) -> Result<Question, StoreError> {
        let mut question = self.read_question(question_id)?;

        if let Some(exam_id) = patch.exam_id {
            if !self.exam_exists(&exam_id)? {
                return Err(StoreError::NotFound("exam", exam_id));
            }
            question.exam_id = exam_id;
        }
        if let Some(n) = patch.question_number {
            validate_draft_fields(n)?;
            question.question_number = n;
        }
        if let Some(t) = patch.question_type {
            question.question_type = t;
        }
        if let Some(tags) = patch.tags {
            question.tags = tags;
        }
        question.updated_at = now();

        self.conn.execute(
            "UPDATE questions
             SET exam_id = ?, question_number = ?, type = ?, tags = ?, updated_at = ?
             WHERE id = ?",
            (
                &question.exam_id,
                question.question_number,
                question.question_type.as_str(),
                serde_json::to_string(&question.tags)?,
                stamp(question.updated_at),
                question_id,
            ),
        )?;
        Ok(question)
    }

    fn delete_question(&mut self, question_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM personal_progress WHERE question_id = ?",
            [question_id],
        )?;
        let removed = tx.execute("DELETE FROM questions WHERE id = ?", [question_id])?;
        if removed == 0 {
            // Nothing changed; roll back the (empty) progress delete.
            drop(tx);
            return Err(StoreError::NotFound("question", question_id.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    fn list_progress(&self, user_id: &str) -> Result<Vec<PersonalProgress>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT question_id, solved, notes, last_updated
             FROM personal_progress WHERE user_id = ?",
        )?;
        let rows = stmt
            .query_map([user_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(question_id, solved, notes, last_updated)| {
                Ok(PersonalProgress {
                    question_id,
                    solved: solved != 0,
                    notes,
                    last_updated: parse_stamp(&last_updated)?,
                })
            })
            .collect()
    }

    fn upsert_progress(
        &mut self,
        user_id: &str,
        question_id: &str,
        patch: ProgressPatch,
    ) -> Result<PersonalProgress, StoreError> {
        let question_hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM questions WHERE id = ?",
                [question_id],
                |r| r.get(0),
            )
            .optional()?;
        if question_hit.is_none() {
            return Err(StoreError::NotFound("question", question_id.to_string()));
        }

        let existing: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT solved, notes FROM personal_progress
                 WHERE user_id = ? AND question_id = ?",
                [user_id, question_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let (mut solved, mut notes) = match existing {
            Some((s, n)) => (s != 0, n),
            None => (false, String::new()),
        };
        if let Some(s) = patch.solved {
            solved = s;
        }
        if let Some(n) = patch.notes {
            notes = n;
        }
        let now = now();

        self.conn.execute(
            "INSERT INTO personal_progress(user_id, question_id, solved, notes, last_updated)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(user_id, question_id)
             DO UPDATE SET solved = excluded.solved, notes = excluded.notes,
                           last_updated = excluded.last_updated",
            (user_id, question_id, solved as i64, &notes, stamp(now)),
        )?;

        Ok(PersonalProgress {
            question_id: question_id.to_string(),
            solved,
            notes,
            last_updated: now,
        })
    }

    fn list_all_tags(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT tags FROM questions")?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut pool = std::collections::BTreeSet::new();
        for raw in rows {
            let tags: Vec<String> = serde_json::from_str(&raw)?;
            pool.extend(tags);
        }
        Ok(pool.into_iter().collect())
    }

    fn sign_in(&mut self, name: &str) -> Result<User, StoreError> {
        let existing: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, name FROM users WHERE name = ?",
                [name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        if let Some((id, name)) = existing {
            return Ok(User { id, name });
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.conn.execute(
            "INSERT INTO users(id, name) VALUES(?, ?)",
            (&user.id, &user.name),
        )?;
        Ok(user)
    }
}
