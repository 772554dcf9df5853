use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::hover::HoverCoordinator;
use crate::narration::NarrationEngine;
use crate::prefs::SessionPrefs;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One running session: the workspace store plus the in-memory accessibility
/// state. Constructed per process and passed explicitly; nothing here is
/// global, so a multi-session server can hold several.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub identity: Option<String>,
    pub session: SessionPrefs,
    pub engine: NarrationEngine,
    pub hover: HoverCoordinator,
    /// Registered opt-in reading controls: control id -> narration text.
    pub reading_controls: HashMap<String, String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            identity: None,
            session: SessionPrefs::new(),
            engine: NarrationEngine::new(),
            hover: HoverCoordinator::default(),
            reading_controls: HashMap::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
