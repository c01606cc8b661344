use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_tags_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "open a workspace first", None);
    };
    match store.list_all_tags() {
        Ok(tags) => ok(&req.id, json!({ "tags": tags })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tags.list" => Some(handle_tags_list(state, req)),
        _ => None,
    }
}
