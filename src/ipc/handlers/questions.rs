use crate::filter::{filter_questions, QuestionFilter};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::{clean_tags, QuestionType};
use crate::store::{QuestionDraft, QuestionPatch};
use serde_json::json;

fn parse_tags(value: Option<&serde_json::Value>) -> Result<Option<Vec<String>>, &'static str> {
    let Some(v) = value else {
        return Ok(None);
    };
    let Some(arr) = v.as_array() else {
        return Err("tags must be an array of strings");
    };
    let mut tags = Vec::with_capacity(arr.len());
    for item in arr {
        match item.as_str() {
            Some(s) => tags.push(s.to_string()),
            None => return Err("tags must be an array of strings"),
        }
    }
    Ok(Some(clean_tags(tags)))
}

fn parse_type(value: Option<&serde_json::Value>) -> Result<Option<QuestionType>, &'static str> {
    match value.and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(s) => match QuestionType::parse(s) {
            Some(t) => Ok(Some(t)),
            None => Err("type must be one of: multiple-choice, open-answer"),
        },
    }
}

fn handle_questions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };
    match store.list_questions() {
        Ok(questions) => ok(&req.id, json!({ "questions": questions })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_questions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let exam_id = match req.params.get("examId").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing examId", None),
    };
    let question_number = match req.params.get("questionNumber").and_then(|v| v.as_i64()) {
        Some(n) => n,
        None => return err(&req.id, "bad_params", "missing questionNumber", None),
    };
    let question_type = match parse_type(req.params.get("type")) {
        Ok(Some(t)) => t,
        Ok(None) => return err(&req.id, "bad_params", "missing type", None),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let tags = match parse_tags(req.params.get("tags")) {
        Ok(t) => t.unwrap_or_default(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let draft = QuestionDraft {
        exam_id,
        question_number,
        question_type,
        tags,
    };
    match store.create_question(draft) {
        Ok(question) => ok(&req.id, json!({ "question": question })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_questions_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let question_id = match req.params.get("questionId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing questionId", None),
    };

    let question_type = match parse_type(req.params.get("type")) {
        Ok(t) => t,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let tags = match parse_tags(req.params.get("tags")) {
        Ok(t) => t,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let patch = QuestionPatch {
        exam_id: req
            .params
            .get("examId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        question_number: req.params.get("questionNumber").and_then(|v| v.as_i64()),
        question_type,
        tags,
    };

    match store.update_question(question_id, patch) {
        Ok(question) => ok(&req.id, json!({ "question": question })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_questions_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let question_id = match req.params.get("questionId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing questionId", None),
    };

    match store.delete_question(question_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_questions_filter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let tags = match parse_tags(req.params.get("tags")) {
        Ok(t) => t.unwrap_or_default(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let filter = QuestionFilter {
        exam_id: req
            .params
            .get("examId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        tags,
    };

    match store.list_questions() {
        Ok(questions) => ok(
            &req.id,
            json!({ "questions": filter_questions(&questions, &filter) }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "questions.list" => Some(handle_questions_list(state, req)),
        "questions.create" => Some(handle_questions_create(state, req)),
        "questions.update" => Some(handle_questions_update(state, req)),
        "questions.delete" => Some(handle_questions_delete(state, req)),
        "questions.filter" => Some(handle_questions_filter(state, req)),
        _ => None,
    }
}
