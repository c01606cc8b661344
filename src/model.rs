use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "open-answer")]
    OpenAnswer,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::OpenAnswer => "open-answer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple-choice" => Some(QuestionType::MultipleChoice),
            "open-answer" => Some(QuestionType::OpenAnswer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub exam_id: String,
    pub question_number: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalProgress {
    pub question_id: String,
    pub solved: bool,
    pub notes: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Trim tags, drop empties, and remove duplicates keeping the first
/// occurrence. Mirrors the add-tag checks the question form performs.
pub fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let t = tag.as_ref().trim();
        if t.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen == t) {
            out.push(t.to_string());
        }
    }
    out
}
