//! ``src/session.rs``
//! ============================================================================
//! # Session Persistence
//!
//! Per-pane state that outlives the process: sort keys, sort groups, the
//! manual filter, the dot-file flag and directory history. Stored as JSON.
//! Saving merges with whatever another process wrote in the meantime; per
//! directory the newer history record wins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::{debug, info};

use crate::error::{FlistError, FlistResult};
use crate::model::view::View;
use crate::sort::groups::GroupCache;
use crate::sort::keys::SortKeys;

/// Last cursor position inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub dir: PathBuf,
    /// File under the cursor when the directory was left.
    pub file: CompactString,
    /// Cursor offset from the top row.
    pub rel_pos: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSession {
    /// Signed sort keys; the sign is the direction.
    pub sort_keys: Vec<i8>,
    pub sort_groups: String,
    pub manual_filter: String,
    pub invert: bool,
    pub hide_dot: bool,
    pub history: Vec<HistoryEntry>,
}

impl PaneSession {
    #[must_use]
    pub fn capture(view: &View) -> Self {
        Self {
            sort_keys: view.sort_keys().to_vec(),
            sort_groups: view.sort_groups().to_string(),
            manual_filter: view.filters().manual_raw().to_string(),
            invert: view.filters().invert(),
            hide_dot: view.filters().dot_hidden(),
            history: view.history().to_vec(),
        }
    }

    /// Restores the saved state into `view` and rebuilds its list. Nothing
    /// is applied when any saved value is invalid.
    pub fn apply_to(&self, view: &mut View, groups: &GroupCache) -> FlistResult<usize> {
        let keys: SortKeys = if self.sort_keys.is_empty() {
            *view.global_sort_keys()
        } else {
            SortKeys::from_raw(&self.sort_keys)?
        };
        let group_list = groups.get(&self.sort_groups)?;

        view.filters.set_manual(&self.manual_filter, self.invert)?;
        view.filters.set_dot(self.hide_dot);
        view.sort = keys;
        view.sort_groups.clone_from(&self.sort_groups);
        view.groups = group_list;
        view.set_history(self.history.clone());

        view.repopulate()
    }
}

/// Merges two history stacks: per directory the later record wins,
/// directories only `theirs` knows are appended.
#[must_use]
pub fn merge_history(ours: &[HistoryEntry], theirs: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut merged: Vec<HistoryEntry> = ours.to_vec();

    for record in theirs {
        match merged.iter_mut().find(|h: &&mut HistoryEntry| -> bool { h.dir == record.dir }) {
            Some(existing) if existing.timestamp < record.timestamp => *existing = record.clone(),
            Some(_) => {}
            None => merged.push(record.clone()),
        }
    }

    merged
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFile {
    pub panes: [PaneSession; 2],
    pub active_pane: usize,
}

impl SessionFile {
    /// Default session file location.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(crate::config::Config::data_dir()?.join("session.json"))
    }

    /// Reads a session; `None` when the file does not exist.
    pub async fn load(path: &Path) -> FlistResult<Option<Self>> {
        let text: String = match TokioFs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No session file");
                return Ok(None);
            }
            Err(e) => return Err(FlistError::from_io(path, e)),
        };

        let session: Self = serde_json::from_str(&text)?;
        info!(marker = "SESSION_LOADED", path = %path.display(), "Session restored");
        Ok(Some(session))
    }

    /// Writes the session, folding in history another process saved since
    /// this one loaded.
    pub async fn save(&self, path: &Path) -> FlistResult<()> {
        let mut merged: Self = self.clone();
        if let Some(on_disk) = Self::load(path).await? {
            for (ours, theirs) in merged.panes.iter_mut().zip(&on_disk.panes) {
                ours.history = merge_history(&ours.history, &theirs.history);
            }
        }

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent)
                .await
                .map_err(|e| FlistError::from_io(parent, e))?;
        }

        let json: String = serde_json::to_string_pretty(&merged)?;
        TokioFs::write(path, json).await.map_err(|e| FlistError::from_io(path, e))?;

        info!(marker = "SESSION_SAVED", path = %path.display(), "Session written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::keys::SortKey;
    use crate::test_support::{file, root};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(dir: &str, file: &str, secs: i64) -> HistoryEntry {
        HistoryEntry {
            dir: PathBuf::from(dir),
            file: CompactString::new(file),
            rel_pos: 0,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_merge_history_prefers_newer_records() {
        let ours = vec![record("/a", "old", 10), record("/b", "mine", 30)];
        let theirs = vec![record("/a", "new", 20), record("/b", "stale", 5), record("/c", "x", 1)];

        let merged = merge_history(&ours, &theirs);
        let files: Vec<&str> = merged.iter().map(|h| h.file.as_str()).collect();
        assert_eq!(files, vec!["new", "mine", "x"]);
    }

    #[test]
    fn test_capture_and_apply() {
        let mut view = View::new(root());
        view.set_custom_list("s", crate::model::view::CustomKind::Regular, vec![file("a"), file("b")])
            .unwrap();
        view.set_manual_filter("^a$", true).unwrap();
        view.set_sort_keys(SortKeys::parse("-name").unwrap());

        let saved = PaneSession::capture(&view);
        assert_eq!(saved.manual_filter, "^a$");
        assert_eq!(saved.sort_keys, vec![-(SortKey::Name as i8)]);

        let mut other = View::new(root());
        other.set_custom_list("s", crate::model::view::CustomKind::Regular, vec![file("a"), file("b"), file("c")])
            .unwrap();
        saved.apply_to(&mut other, &GroupCache::default()).unwrap();
        assert_eq!(other.sort_keys(), view.sort_keys());
        let names: Vec<&str> = other.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_apply_rejects_bad_filter() {
        let mut view = View::new(root());
        let session = PaneSession {
            manual_filter: "(".to_string(),
            ..PaneSession::default()
        };
        assert!(session.apply_to(&mut view, &GroupCache::default()).is_err());
        assert_eq!(view.filters().manual_raw(), "");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/session.json");
        assert!(SessionFile::load(&path).await.unwrap().is_none());

        let mut session = SessionFile::default();
        session.active_pane = 1;
        session.panes[0].history.push(record("/a", "f", 1));
        session.save(&path).await.unwrap();

        let loaded = SessionFile::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_save_merges_concurrent_history() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");

        let mut first = SessionFile::default();
        first.panes[0].history = vec![record("/a", "theirs", 50), record("/b", "b", 1)];
        first.save(&path).await.unwrap();

        let mut second = SessionFile::default();
        second.panes[0].history = vec![record("/a", "ours", 10)];
        second.save(&path).await.unwrap();

        let loaded = SessionFile::load(&path).await.unwrap().unwrap();
        let files: Vec<&str> = loaded.panes[0].history.iter().map(|h| h.file.as_str()).collect();
        assert_eq!(files, vec!["theirs", "b"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serde_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = SessionFile::load(&path).await.unwrap_err();
        assert!(matches!(err, FlistError::Serde(_)));
    }
}
