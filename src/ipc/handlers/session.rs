use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match store.sign_in(&name) {
        Ok(user) => {
            tracing::info!(user = %user.name, "session started");
            let body = json!({ "user": user });
            state.session = Some(user);
            ok(&req.id, body)
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session = None;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    match &state.session {
        Some(user) => ok(&req.id, json!({ "user": user })),
        None => ok(&req.id, json!({ "user": null })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(handle_sign_in(state, req)),
        "session.signOut" => Some(handle_sign_out(state, req)),
        "session.current" => Some(handle_current(state, req)),
        _ => None,
    }
}
