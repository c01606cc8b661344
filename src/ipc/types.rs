use std::path::PathBuf;

use crate::model::User;
use crate::store::Store;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn Store>>,
    /// Signed-in user, if any. Progress and stats methods require this.
    pub session: Option<User>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            store: None,
            session: None,
        }
    }
}
