use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Backend};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.store.as_ref().map(|s| s.backend().as_str()),
        }),
    )
}

fn handle_workspace_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let backend = match req.params.get("backend").and_then(|v| v.as_str()) {
        None => Backend::Sqlite,
        Some(s) => match Backend::parse(s) {
            Some(b) => b,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "backend must be one of: sqlite, json",
                    Some(json!({ "backend": s })),
                )
            }
        },
    };

    match store::open_store(&path, backend) {
        Ok(store) => {
            tracing::info!(path = %path.display(), backend = backend.as_str(), "workspace opened");
            state.workspace = Some(path.clone());
            state.store = Some(store);
            // Users belong to the workspace store; any previous session is stale.
            state.session = None;
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "backend": backend.as_str(),
                }),
            )
        }
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.open" => Some(handle_workspace_open(state, req)),
        _ => None,
    }
}
