use crate::filter::summarize;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};

fn handle_stats_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };
    let Some(user) = state.session.as_ref() else {
        return err(&req.id, "session_required", "sign in first", None);
    };

    let questions = match store.list_questions() {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let exams = match store.list_exams() {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let progress = match store.list_progress(&user.id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    let summary = summarize(&questions, exams.len(), &progress);
    match serde_json::to_value(summary) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.summary" => Some(handle_stats_summary(state, req)),
        _ => None,
    }
}
