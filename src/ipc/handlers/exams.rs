use crate::ident::is_valid_exam_identifier;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };
    match store.list_exams() {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let raw = match req.params.get("identifier").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing identifier", None),
    };
    // The form uppercases as the user types; do the same before validating.
    let identifier = raw.trim().to_ascii_uppercase();
    if identifier.is_empty() {
        return err(&req.id, "bad_params", "identifier is required", None);
    }
    if !is_valid_exam_identifier(&identifier) {
        return err(
            &req.id,
            "invalid_identifier",
            "invalid format, expected 4 digits then 2 letters (e.g. 2023AA)",
            Some(json!({ "identifier": identifier })),
        );
    }

    match store.create_exam(&identifier) {
        Ok(exam) => ok(&req.id, json!({ "exam": exam })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_exams_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let exam_id = match req.params.get("examId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing examId", None),
    };

    match store.delete_exam(exam_id) {
        Ok(deleted_questions) => ok(&req.id, json!({ "deletedQuestions": deleted_questions })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.delete" => Some(handle_exams_delete(state, req)),
        _ => None,
    }
}
