use crate::model::{PersonalProgress, Question};
use serde::Serialize;

/// Filter selection over the loaded question list. `exam_id: None` (or an
/// empty string upstream) means "no exam selected"; an empty tag set means
/// "no tag filter". Tag matching is OR across the selected tags.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub exam_id: Option<String>,
    pub tags: Vec<String>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        let exam_ok = match self.exam_id.as_deref() {
            None | Some("") => true,
            Some(id) => question.exam_id == id,
        };
        let tags_ok = self.tags.is_empty()
            || self
                .tags
                .iter()
                .any(|t| question.tags.iter().any(|qt| qt == t));
        exam_ok && tags_ok
    }
}

pub fn filter_questions(questions: &[Question], filter: &QuestionFilter) -> Vec<Question> {
    questions
        .iter()
        .filter(|q| filter.matches(q))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySummary {
    pub total_questions: usize,
    pub solved_questions: usize,
    pub total_exams: usize,
    pub progress_percent: i64,
}

/// Dashboard numbers: solved count is per-user, percent is rounded to the
/// nearest integer and 0 when there are no questions at all.
pub fn summarize(
    questions: &[Question],
    total_exams: usize,
    progress: &[PersonalProgress],
) -> StudySummary {
    let total_questions = questions.len();
    let solved_questions = progress.iter().filter(|p| p.solved).count();
    let progress_percent = if total_questions > 0 {
        ((solved_questions as f64 / total_questions as f64) * 100.0).round() as i64
    } else {
        0
    };
    StudySummary {
        total_questions,
        solved_questions,
        total_exams,
        progress_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;
    use chrono::Utc;

    fn question(id: &str, exam_id: &str, tags: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            exam_id: exam_id.to_string(),
            question_number: 1,
            question_type: QuestionType::MultipleChoice,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_returns_everything() {
        let qs = vec![
            question("1", "e1", &["Deadlocks"]),
            question("2", "e2", &[]),
        ];
        let out = filter_questions(&qs, &QuestionFilter::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_string_exam_selection_means_none() {
        let qs = vec![question("1", "e1", &[])];
        let f = QuestionFilter {
            exam_id: Some(String::new()),
            tags: vec![],
        };
        assert_eq!(filter_questions(&qs, &f).len(), 1);
    }

    #[test]
    fn tag_filter_is_or_across_selected_tags() {
        let qs = vec![
            question("1", "e1", &["Deadlocks", "Synchronization"]),
            question("2", "e1", &["Virtual Memory"]),
            question("3", "e2", &["IPC"]),
        ];
        let f = QuestionFilter {
            exam_id: None,
            tags: vec!["Deadlocks".to_string(), "IPC".to_string()],
        };
        let out = filter_questions(&qs, &f);
        let ids: Vec<&str> = out.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn tag_match_is_case_sensitive() {
        let qs = vec![question("1", "e1", &["Deadlocks"])];
        let f = QuestionFilter {
            exam_id: None,
            tags: vec!["deadlocks".to_string()],
        };
        assert!(filter_questions(&qs, &f).is_empty());
    }

    #[test]
    fn exam_and_tag_filters_combine_with_and() {
        let qs = vec![
            question("1", "e1", &["Deadlocks"]),
            question("2", "e2", &["Deadlocks"]),
        ];
        let f = QuestionFilter {
            exam_id: Some("e1".to_string()),
            tags: vec!["Deadlocks".to_string()],
        };
        let out = filter_questions(&qs, &f);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn summary_percent_rounds_and_handles_empty() {
        let qs = vec![
            question("1", "e1", &[]),
            question("2", "e1", &[]),
            question("3", "e1", &[]),
        ];
        let progress = vec![
            PersonalProgress {
                question_id: "1".to_string(),
                solved: true,
                notes: String::new(),
                last_updated: Utc::now(),
            },
            PersonalProgress {
                question_id: "2".to_string(),
                solved: false,
                notes: String::new(),
                last_updated: Utc::now(),
            },
        ];
        let s = summarize(&qs, 1, &progress);
        assert_eq!(s.total_questions, 3);
        assert_eq!(s.solved_questions, 1);
        assert_eq!(s.total_exams, 1);
        assert_eq!(s.progress_percent, 33);

        let empty = summarize(&[], 0, &[]);
        assert_eq!(empty.progress_percent, 0);
    }
}
