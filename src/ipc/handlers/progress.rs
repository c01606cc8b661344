use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::ProgressPatch;
use serde_json::json;

fn handle_progress_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };
    let Some(user) = state.session.as_ref() else {
        return err(&req.id, "session_required", "sign in first", None);
    };

    match store.list_progress(&user.id) {
        Ok(progress) => ok(&req.id, json!({ "progress": progress })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_progress_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(user) = state.session.clone() else {
        return err(&req.id, "session_required", "sign in first", None);
    };
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let question_id = match req.params.get("questionId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing questionId", None),
    };
    if let Some(v) = req.params.get("solved") {
        if !v.is_boolean() {
            return err(&req.id, "bad_params", "solved must be a boolean", None);
        }
    }
    if let Some(v) = req.params.get("notes") {
        if !v.is_string() {
            return err(&req.id, "bad_params", "notes must be a string", None);
        }
    }

    let patch = ProgressPatch {
        solved: req.params.get("solved").and_then(|v| v.as_bool()),
        notes: req
            .params
            .get("notes")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    };

    match store.upsert_progress(&user.id, question_id, patch) {
        Ok(progress) => ok(&req.id, json!({ "progress": progress })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.list" => Some(handle_progress_list(state, req)),
        "progress.upsert" => Some(handle_progress_upsert(state, req)),
        _ => None,
    }
}
