//! JSON session store
//!
//! One file per save target, shaped `{scenario, sessions: [...]}`. Sessions
//! are keyed by id: saving a session whose id already exists replaces the
//! old record and moves it to the end of the list. Every other stored
//! session and top-level key is written back unchanged.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parley_types::{SessionDocument, SessionRecord};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ArenaError, Result};

/// A session store file
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Open a store, creating the file (and its directories) as `{}` if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        if !path.exists() {
            debug!(path = %path.display(), "Creating session store");
            fs::write(&path, "{}").map_err(|e| io_error(&path, e))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SessionDocument> {
        let raw = fs::read_to_string(&self.path).map_err(|e| io_error(&self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| self.invalid(e))
    }

    /// Stored sessions readable as records
    pub fn sessions(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.load()?.records().collect())
    }

    /// Insert or replace a session; `scenario` is only used when the file
    /// has none yet
    pub fn upsert(&self, scenario: &str, record: &SessionRecord) -> Result<()> {
        let mut document = self.load()?;
        if document.scenario.is_empty() {
            document.scenario = scenario.to_string();
        }
        let session = serde_json::to_value(record).map_err(|e| self.invalid(e))?;
        if document.upsert(record.id, session) {
            info!(id = %record.id, "Session already exists in store, overwriting");
        }
        self.write(&document)
    }

    /// Replace the file in one rename so a failed write leaves it intact
    fn write(&self, document: &SessionDocument) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document
            .serialize(&mut serializer)
            .map_err(|e| self.invalid(e))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        tmp.write_all(&buf).map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| io_error(&self.path, e.error))?;
        Ok(())
    }

    fn invalid(&self, e: serde_json::Error) -> ArenaError {
        ArenaError::InvalidStore {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ArenaError {
    ArenaError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::{ActorDescription, Message, SessionId};

    fn record(id: u64, text: &str) -> SessionRecord {
        SessionRecord {
            id: SessionId(id),
            agents: vec![ActorDescription::new("b", "Buyer", "You buy.")],
            history: vec![Message::note("Buyer", text)],
            evaluation: None,
        }
    }

    #[test]
    fn test_open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("TEST.json");
        let store = SessionStore::open(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(store.sessions().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("s.json")).unwrap();

        store.upsert("A bike.", &record(1, "first")).unwrap();
        store.upsert("A bike.", &record(2, "other")).unwrap();
        store.upsert("Ignored scenario", &record(1, "second")).unwrap();

        let document = store.load().unwrap();
        assert_eq!(document.scenario, "A bike.");
        let ids: Vec<_> = document.records().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(document.find(SessionId(1)).unwrap().history[0].text, "second");
    }

    #[test]
    fn test_keeps_existing_scenario_and_indents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scenario.json");
        fs::write(&path, r#"{"scenario": "Original", "buyers": []}"#).unwrap();

        let store = SessionStore::open(&path).unwrap();
        store.upsert("Seed", &record(7, "hi")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("{\n    \"scenario\": \"Original\""));
        assert!(raw.contains("\"evaluation\": {}"));
        assert!(store.load().unwrap().extra.contains_key("buyers"));
    }

    #[test]
    fn test_foreign_sessions_survive_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scenario.json");
        let foreign = r#"{
            "id": 11,
            "note": "kept",
            "agents": [],
            "history": [{"role": "Seller", "text": "Seller : 90", "DI_score": 0.3}],
            "evaluation": {"result": "DEAL", "analysis": [{"utility": "nan"}], "final_price": "nan"}
        }"#;
        fs::write(
            &path,
            format!(r#"{{"scenario": "Original", "sessions": [{}]}}"#, foreign),
        )
        .unwrap();

        let store = SessionStore::open(&path).unwrap();
        store.upsert("Seed", &record(12, "new")).unwrap();

        let document = store.load().unwrap();
        let expected: serde_json::Value = serde_json::from_str(foreign).unwrap();
        assert_eq!(document.sessions.len(), 2);
        assert_eq!(document.sessions[0], expected);
        let ids: Vec<_> = store.sessions().unwrap().iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![12]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"DI_score\": 0.3"));
        assert!(raw.contains("\"utility\": \"nan\""));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("s.json")).unwrap();
        store.upsert("A bike.", &record(1, "first")).unwrap();
        store.upsert("A bike.", &record(1, "again")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let store = SessionStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(ArenaError::InvalidStore { .. })));
    }
}
