use super::{
    validate_draft_fields, Backend, ProgressPatch, QuestionDraft, QuestionPatch, Store, StoreError,
};
use crate::model::{Exam, PersonalProgress, Question, User};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const EXAMS_FILE: &str = "exams.json";
pub const QUESTIONS_FILE: &str = "questions.json";
pub const PROGRESS_FILE: &str = "progress.json";
pub const USERS_FILE: &str = "users.json";

/// Document backend: each collection is a JSON array in a fixed-name file
/// under the workspace, read and rewritten whole on every operation. A
/// missing file reads as an empty collection.
pub struct JsonStore {
    workspace: PathBuf,
}

/// Progress rows carry their user key on disk; the wire model is per-user
/// and omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRow {
    user_id: String,
    question_id: String,
    solved: bool,
    notes: String,
    last_updated: chrono::DateTime<Utc>,
}

impl ProgressRow {
    fn into_progress(self) -> PersonalProgress {
        PersonalProgress {
            question_id: self.question_id,
            solved: self.solved,
            notes: self.notes,
            last_updated: self.last_updated,
        }
    }
}

impl JsonStore {
    pub fn open(workspace: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(workspace)?;
        Ok(JsonStore {
            workspace: workspace.to_path_buf(),
        })
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
        let path = self.workspace.join(name);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<(), StoreError> {
        let path = self.workspace.join(name);
        let tmp = self.workspace.join(format!("{name}.writing"));
        std::fs::write(&tmp, serde_json::to_string_pretty(items)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn exams(&self) -> Result<Vec<Exam>, StoreError> {
        self.read(EXAMS_FILE)
    }

    fn questions(&self) -> Result<Vec<Question>, StoreError> {
        self.read(QUESTIONS_FILE)
    }

    fn progress_rows(&self) -> Result<Vec<ProgressRow>, StoreError> {
        self.read(PROGRESS_FILE)
    }
}

impl Store for JsonStore {
    fn backend(&self) -> Backend {
        Backend::JsonFiles
    }

    fn data_files(&self) -> Vec<PathBuf> {
        [EXAMS_FILE, QUESTIONS_FILE, PROGRESS_FILE, USERS_FILE]
            .iter()
            .map(|name| self.workspace.join(name))
            .collect()
    }

    fn list_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let mut exams = self.exams()?;
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(exams)
    }

    fn create_exam(&mut self, identifier: &str) -> Result<Exam, StoreError> {
        let mut exams = self.exams()?;
        // Uniqueness by scan before append, same contract as the relational
        // backend's pre-check query.
        if exams.iter().any(|e| e.identifier == identifier) {
            return Err(StoreError::DuplicateIdentifier(identifier.to_string()));
        }

        let now = Utc::now();
        let exam = Exam {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            created_at: now,
            updated_at: now,
        };
        exams.push(exam.clone());
        self.write(EXAMS_FILE, &exams)?;
        Ok(exam)
    }

    fn delete_exam(&mut self, exam_id: &str) -> Result<usize, StoreError> {
        let mut exams = self.exams()?;
        let before = exams.len();
        exams.retain(|e| e.id != exam_id);
        if exams.len() == before {
            return Err(StoreError::NotFound("exam", exam_id.to_string()));
        }

        let mut questions = self.questions()?;
        let removed_ids: Vec<String> = questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .map(|q| q.id.clone())
            .collect();
        questions.retain(|q| q.exam_id != exam_id);

        let mut progress = self.progress_rows()?;
        progress.retain(|p| !removed_ids.contains(&p.question_id));

        self.write(QUESTIONS_FILE, &questions)?;
        self.write(PROGRESS_FILE, &progress)?;
        self.write(EXAMS_FILE, &exams)?;
        Ok(removed_ids.len())
    }

    fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let mut questions = self.questions()?;
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(questions)
    }

    fn create_question(&mut self, draft: QuestionDraft) -> Result<Question, StoreError> {
        validate_draft_fields(draft.question_number)?;
        if !self.exams()?.iter().any(|e| e.id == draft.exam_id) {
            return Err(StoreError::NotFound("exam", draft.exam_id));
        }

        let now = Utc::now();
        let question = Question {
            id: Uuid::new_v4().to_string(),
            exam_id: draft.exam_id,
            question_number: draft.question_number,
            question_type: draft.question_type,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        };
        let mut questions = self.questions()?;
        questions.push(question.clone());
        self.write(QUESTIONS_FILE, &questions)?;
        Ok(question)
    }

    fn update_question(
        &mut self,
        question_id: &str,
        patch: QuestionPatch,
    ) -> Result<Question, StoreError> {
        let mut questions = self.questions()?;
        let Some(idx) = questions.iter().position(|q| q.id == question_id) else {
            return Err(StoreError::NotFound("question", question_id.to_string()));
        };

        if let Some(exam_id) = patch.exam_id {
            if !self.exams()?.iter().any(|e| e.id == exam_id) {
                return Err(StoreError::NotFound("exam", exam_id));
            }
            questions[idx].exam_id = exam_id;
        }
        if let Some(n) = patch.question_number {
            validate_draft_fields(n)?;
            questions[idx].question_number = n;
        }
        if let Some(t) = patch.question_type {
            questions[idx].question_type = t;
        }
        if let Some(tags) = patch.tags {
            questions[idx].tags = tags;
        }
        questions[idx].updated_at = Utc::now();

        let updated = questions[idx].clone();
        self.write(QUESTIONS_FILE, &questions)?;
        Ok(updated)
    }

    fn delete_question(&mut self, question_id: &str) -> Result<(), StoreError> {
        let mut questions = self.questions()?;
        let before = questions.len();
        questions.retain(|q| q.id != question_id);
        if questions.len() == before {
            return Err(StoreError::NotFound("question", question_id.to_string()));
        }

        let mut progress = self.progress_rows()?;
        progress.retain(|p| p.question_id != question_id);

        self.write(PROGRESS_FILE, &progress)?;
        self.write(QUESTIONS_FILE, &questions)?;
        Ok(())
    }

    fn list_progress(&self, user_id: &str) -> Result<Vec<PersonalProgress>, StoreError> {
        Ok(self
            .progress_rows()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .map(ProgressRow::into_progress)
            .collect())
    }

    fn upsert_progress(
        &mut self,
        user_id: &str,
        question_id: &str,
        patch: ProgressPatch,
    ) -> Result<PersonalProgress, StoreError> {
        if !self.questions()?.iter().any(|q| q.id == question_id) {
            return Err(StoreError::NotFound("question", question_id.to_string()));
        }

        let mut progress = self.progress_rows()?;
        let now = Utc::now();
        let idx = progress
            .iter()
            .position(|p| p.user_id == user_id && p.question_id == question_id);

        let row = match idx {
            Some(i) => {
                if let Some(s) = patch.solved {
                    progress[i].solved = s;
                }
                if let Some(n) = patch.notes {
                    progress[i].notes = n;
                }
                progress[i].last_updated = now;
                progress[i].clone()
            }
            None => {
                let row = ProgressRow {
                    user_id: user_id.to_string(),
                    question_id: question_id.to_string(),
                    solved: patch.solved.unwrap_or(false),
                    notes: patch.notes.unwrap_or_default(),
                    last_updated: now,
                };
                progress.push(row.clone());
                row
            }
        };

        self.write(PROGRESS_FILE, &progress)?;
        Ok(row.into_progress())
    }

    fn list_all_tags(&self) -> Result<Vec<String>, StoreError> {
        let mut pool = std::collections::BTreeSet::new();
        for question in self.questions()? {
            pool.extend(question.tags);
        }
        Ok(pool.into_iter().collect())
    }

    fn sign_in(&mut self, name: &str) -> Result<User, StoreError> {
        let mut users: Vec<User> = self.read(USERS_FILE)?;
        if let Some(user) = users.iter().find(|u| u.name == name) {
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        users.push(user.clone());
        self.write(USERS_FILE, &users)?;
        Ok(user)
    }
}
