mod jsonfile;
mod sqlite;

pub use jsonfile::JsonStore;
pub use sqlite::SqliteStore;

use crate::model::{Exam, PersonalProgress, Question, QuestionType, User};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("exam identifier already exists: {0}")]
    DuplicateIdentifier(String),
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("store data is corrupt: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

impl StoreError {
    /// Stable IPC error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateIdentifier(_) => "duplicate_identifier",
            StoreError::NotFound(..) => "not_found",
            StoreError::Invalid { .. } => "bad_params",
            StoreError::Db(_) => "db_failed",
            StoreError::Io(_) => "io_failed",
            StoreError::Corrupt(_) => "store_corrupt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    JsonFiles,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::JsonFiles => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sqlite" => Some(Backend::Sqlite),
            "json" => Some(Backend::JsonFiles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub exam_id: String,
    pub question_number: i64,
    pub question_type: QuestionType,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub exam_id: Option<String>,
    pub question_number: Option<i64>,
    pub question_type: Option<QuestionType>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressPatch {
    pub solved: Option<bool>,
    pub notes: Option<String>,
}

/// Uniform data-access contract over the two storage backends. Both
/// implementations honor the same semantics: identifier uniqueness checked
/// by query before insert, cascade delete of an exam's questions (and their
/// progress rows), hard not-found on missing ids, and a case-preserving
/// derived tag pool.
pub trait Store {
    fn backend(&self) -> Backend;
    /// Files under the workspace that hold this store's data, for backup.
    fn data_files(&self) -> Vec<PathBuf>;

    fn list_exams(&self) -> Result<Vec<Exam>, StoreError>;
    fn create_exam(&mut self, identifier: &str) -> Result<Exam, StoreError>;
    /// Deletes the exam, its questions, and those questions' progress rows.
    /// Returns the number of questions removed.
    fn delete_exam(&mut self, exam_id: &str) -> Result<usize, StoreError>;

    fn list_questions(&self) -> Result<Vec<Question>, StoreError>;
    fn create_question(&mut self, draft: QuestionDraft) -> Result<Question, StoreError>;
    fn update_question(
        &mut self,
        question_id: &str,
        patch: QuestionPatch,
    ) -> Result<Question, StoreError>;
    fn delete_question(&mut self, question_id: &str) -> Result<(), StoreError>;

    fn list_progress(&self, user_id: &str) -> Result<Vec<PersonalProgress>, StoreError>;
    fn upsert_progress(
        &mut self,
        user_id: &str,
        question_id: &str,
        patch: ProgressPatch,
    ) -> Result<PersonalProgress, StoreError>;

    fn list_all_tags(&self) -> Result<Vec<String>, StoreError>;

    /// Find-or-create a user by name. Session context, not authentication.
    fn sign_in(&mut self, name: &str) -> Result<User, StoreError>;
}

pub fn open_store(workspace: &Path, backend: Backend) -> Result<Box<dyn Store>, StoreError> {
    std::fs::create_dir_all(workspace)?;
    match backend {
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(workspace)?)),
        Backend::JsonFiles => Ok(Box::new(JsonStore::open(workspace)?)),
    }
}

pub(crate) fn validate_draft_fields(
    question_number: i64,
) -> Result<(), StoreError> {
    if question_number < 1 {
        return Err(StoreError::Invalid {
            field: "questionNumber",
            message: "must be a positive integer".to_string(),
        });
    }
    Ok(())
}
