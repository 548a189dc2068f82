//! ``src/model/fs_state.rs``
//! ============================================================================
//! # `FSState`: The Two Panes and What They Share
//!
//! Owns both views, the directory cache and the compiled sort-group lists.
//! Operations that span panes (two-pane comparison, diff reload and
//! exclusion, counterpart copies) go through here so both sides stay in
//! step.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::dcache::DirCache;
use crate::compare::engine::{
    CompareOptions, CompareOutcome, compare_panes, compare_single, leave_compare, materialize_counterpart,
    reload_compare, reload_compare_single, sync_cursor,
};
use crate::config::Config;
use crate::error::{FlistError, FlistResult};
use crate::fs::scanner::CancelFlag;
use crate::model::view::{CustomKind, View};
use crate::model::watch::PendingEvent;
use crate::session::{PaneSession, SessionFile};
use crate::sort::groups::{GroupCache, GroupList};

#[derive(Debug)]
pub struct FSState {
    pub panes: [View; 2],

    /// Index of the focused pane.
    pub active_pane: usize,

    pub dcache: DirCache,

    pub groups: GroupCache,

    pub config: Config,
}

impl FSState {
    /// Two panes configured from `config`. Nothing is scanned yet.
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>, config: Config) -> FlistResult<Self> {
        let dcache = DirCache::with_config(&config.dcache);
        let groups = GroupCache::new(&config.sort.groups)?;
        let list: GroupList = groups.get(&config.sort.groups)?;

        let panes: [View; 2] = [
            View::from_config(left, &config, dcache.clone(), list.clone()),
            View::from_config(right, &config, dcache.clone(), list),
        ];

        Ok(Self {
            panes,
            active_pane: 0,
            dcache,
            groups,
            config,
        })
    }

    // --------------------------------------------------------
    // Pane access
    // --------------------------------------------------------

    #[must_use]
    pub fn active_pane(&self) -> &View {
        &self.panes[self.active_pane]
    }

    pub fn active_pane_mut(&mut self) -> &mut View {
        &mut self.panes[self.active_pane]
    }

    #[must_use]
    pub fn other_pane(&self) -> &View {
        &self.panes[1 - self.active_pane]
    }

    pub fn other_pane_mut(&mut self) -> &mut View {
        &mut self.panes[1 - self.active_pane]
    }

    /// Pane `idx` and the other one, both mutable.
    fn split(&mut self, idx: usize) -> (&mut View, &mut View) {
        let (left, right) = self.panes.split_at_mut(1);
        if idx == 0 {
            (&mut left[0], &mut right[0])
        } else {
            (&mut right[0], &mut left[0])
        }
    }

    /// Active pane first.
    pub fn both_mut(&mut self) -> (&mut View, &mut View) {
        self.split(self.active_pane)
    }

    pub const fn switch_pane(&mut self) {
        self.active_pane = 1 - self.active_pane;
    }

    pub const fn set_active_pane(&mut self, idx: usize) {
        if idx < 2 {
            self.active_pane = idx;
        }
    }

    // --------------------------------------------------------
    // Sort groups
    // --------------------------------------------------------

    /// Sets the active pane's sort groups. A bad regex leaves them as they
    /// were.
    pub fn set_sort_groups(&mut self, raw: &str) -> FlistResult<()> {
        let list: GroupList = self.groups.get(raw)?;
        self.active_pane_mut().set_sort_groups(raw, list);
        Ok(())
    }

    /// Replaces the default groups. Panes still on the old default follow.
    pub fn set_global_sort_groups(&mut self, raw: &str) -> FlistResult<()> {
        let previous: String = self.groups.global_raw().to_string();
        self.groups.set_global(raw)?;
        self.config.sort.groups = raw.to_string();

        let list: GroupList = self.groups.get(raw)?;
        for pane in &mut self.panes {
            if pane.sort_groups() == previous {
                pane.set_sort_groups(raw, list.clone());
            }
        }
        Ok(())
    }

    // --------------------------------------------------------
    // Comparison
    // --------------------------------------------------------

    /// Compares the active pane alone or against the other pane.
    pub fn compare(&mut self, opts: &CompareOptions, two_panes: bool, cancel: &CancelFlag) -> FlistResult<CompareOutcome> {
        if two_panes {
            let (current, other) = self.both_mut();
            compare_panes(current, other, opts, cancel)
        } else {
            compare_single(self.active_pane_mut(), opts, cancel)
        }
    }

    pub fn leave_compare(&mut self, cancel: &CancelFlag) -> FlistResult<()> {
        let (current, other) = self.both_mut();
        leave_compare(current, other, cancel)
    }

    /// Moves the other pane's cursor to the active pane's row in diff mode.
    pub fn sync_cursor(&mut self) {
        let (current, other) = self.both_mut();
        sync_cursor(current, other);
    }

    /// Copies the real file of `row` over to the side that lacks it.
    pub fn materialize(&mut self, row: usize) -> FlistResult<bool> {
        let (current, other) = self.both_mut();
        materialize_counterpart(current, other, row)
    }

    /// Excludes the targeted entries of the active pane. In diff mode whole
    /// groups go from both panes, and an emptied diff is left.
    pub fn exclude(&mut self, cancel: &CancelFlag) -> FlistResult<usize> {
        if self.active_pane().custom_kind() != Some(CustomKind::Diff) {
            return self.active_pane_mut().exclude();
        }

        let (current, other) = self.both_mut();
        let ids: Vec<u32> = current
            .target_indices()
            .into_iter()
            .filter_map(|i: usize| -> Option<u32> { current.entry(i).map(|e| e.id) })
            .collect();

        let removed: usize = current.exclude_ids(&ids);
        other.exclude_ids(&ids);

        if current.is_empty() {
            leave_compare(current, other, cancel)?;
        }
        Ok(removed)
    }

    // --------------------------------------------------------
    // Reloading
    // --------------------------------------------------------

    /// Refreshes pane `idx`; a diff pane refreshes its partner too.
    pub fn reload_pane(&mut self, idx: usize, cancel: &CancelFlag) -> FlistResult<usize> {
        if idx > 1 {
            return Err(FlistError::invalid_input("pane", format!("no pane {idx}")));
        }

        let (pane, partner) = self.split(idx);
        match pane.custom_kind() {
            Some(CustomKind::Diff) => {
                reload_compare(pane, partner, cancel)?;
            }
            Some(CustomKind::Compare) => {
                reload_compare_single(pane, cancel)?;
            }
            _ => {
                pane.reload(cancel)?;
            }
        }
        Ok(self.panes[idx].len())
    }

    pub fn reload_all(&mut self, cancel: &CancelFlag) -> FlistResult<()> {
        let start_time: Instant = Instant::now();
        self.reload_pane(0, cancel)?;
        if self.panes[1].custom_kind() != Some(CustomKind::Diff) {
            self.reload_pane(1, cancel)?;
        }

        info!(
            marker = "PANES_RELOADED",
            operation_type = "reload_all",
            left = self.panes[0].len(),
            right = self.panes[1].len(),
            duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
            "Both panes refreshed"
        );
        Ok(())
    }

    /// Acts on what watchers requested since the last call. Reload errors
    /// are logged and leave the pane as it was.
    pub fn process_pending(&mut self, cancel: &CancelFlag) -> [PendingEvent; 2] {
        let events: [PendingEvent; 2] = [self.panes[0].take_pending(), self.panes[1].take_pending()];

        for (idx, event) in events.iter().enumerate() {
            if *event != PendingEvent::Reload {
                continue;
            }
            if idx == 1 && events[0] == PendingEvent::Reload && self.panes[1].custom_kind() == Some(CustomKind::Diff) {
                continue;
            }
            if let Err(e) = self.reload_pane(idx, cancel) {
                warn!(pane = idx, error = %e, "Pending reload failed");
            }
        }

        if events.iter().any(|e: &PendingEvent| -> bool { *e != PendingEvent::None }) {
            debug!(left = ?events[0], right = ?events[1], "Pending events processed");
        }
        events
    }

    // --------------------------------------------------------
    // Session
    // --------------------------------------------------------

    #[must_use]
    pub fn session(&self) -> SessionFile {
        SessionFile {
            panes: [PaneSession::capture(&self.panes[0]), PaneSession::capture(&self.panes[1])],
            active_pane: self.active_pane,
        }
    }

    pub fn apply_session(&mut self, session: &SessionFile) -> FlistResult<()> {
        for (pane, saved) in self.panes.iter_mut().zip(&session.panes) {
            saved.apply_to(pane, &self.groups)?;
        }
        self.set_active_pane(session.active_pane);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::engine::{CompareType, ListingMode};
    use crate::test_support::names;
    use std::fs;
    use tempfile::TempDir;

    fn panes(left: &[&str], right: &[&str]) -> (TempDir, TempDir, FSState) {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for name in left {
            fs::write(a.path().join(name), name.as_bytes()).unwrap();
        }
        for name in right {
            fs::write(b.path().join(name), name.as_bytes()).unwrap();
        }
        let state = FSState::new(a.path(), b.path(), Config::default()).unwrap();
        (a, b, state)
    }

    fn by_name() -> CompareOptions {
        CompareOptions {
            ctype: CompareType::Name,
            listing: ListingMode::All,
            ..CompareOptions::default()
        }
    }

    #[test]
    fn test_switch_and_split() {
        let (_a, b, mut state) = panes(&[], &[]);
        assert_eq!(state.active_pane, 0);
        state.switch_pane();
        assert_eq!(state.active_pane().cwd(), b.path());

        let (current, other) = state.both_mut();
        assert_eq!(current.cwd(), b.path());
        assert_ne!(other.cwd(), b.path());
    }

    #[test]
    fn test_two_pane_compare_and_exclude() {
        let (_a, _b, mut state) = panes(&["x", "y"], &["x", "z"]);
        let cancel = CancelFlag::new();

        let outcome = state.compare(&by_name(), true, &cancel).unwrap();
        assert_eq!(outcome, CompareOutcome::Entered { rows: 3 });

        state.active_pane_mut().set_cursor(0);
        state.exclude(&cancel).unwrap();
        assert_eq!(names(state.panes[0].entries()), vec!["y", ""]);
        assert_eq!(names(state.panes[1].entries()), vec!["", "z"]);
        let row_ids = |view: &View| -> Vec<u32> { view.entries().iter().map(|e| e.id).collect() };
        assert_eq!(row_ids(&state.panes[0]), row_ids(&state.panes[1]));

        state.active_pane_mut().set_cursor(0);
        state.exclude(&cancel).unwrap();
        state.active_pane_mut().set_cursor(0);
        state.exclude(&cancel).unwrap();
        assert!(!state.panes[0].is_compare());
        assert!(!state.panes[1].is_compare());
    }

    #[test]
    fn test_reload_diff_pane_updates_partner() {
        let (a, _b, mut state) = panes(&["x", "y"], &["x"]);
        let cancel = CancelFlag::new();
        state.compare(&by_name(), true, &cancel).unwrap();

        fs::remove_file(a.path().join("y")).unwrap();
        state.reload_pane(1, &cancel).unwrap();
        assert_eq!(state.panes[0].len(), 1);
        assert_eq!(state.panes[1].len(), 1);
    }

    #[test]
    fn test_sort_groups() {
        let (_a, _b, mut state) = panes(&[], &[]);
        state.set_sort_groups("[0-9]+").unwrap();
        assert_eq!(state.active_pane().sort_groups(), "[0-9]+");
        assert!(state.set_sort_groups("(").is_err());
        assert_eq!(state.active_pane().sort_groups(), "[0-9]+");

        state.set_global_sort_groups("x").unwrap();
        assert_eq!(state.panes[1].sort_groups(), "x");
        assert_eq!(state.panes[0].sort_groups(), "[0-9]+");
    }

    #[test]
    fn test_process_pending_reloads() {
        let (a, _b, mut state) = panes(&["f"], &[]);
        let cancel = CancelFlag::new();
        state.reload_all(&cancel).unwrap();
        let before = state.panes[0].len();

        fs::write(a.path().join("g"), b"g").unwrap();
        state.panes[0].request_reload();
        let events = state.process_pending(&cancel);
        assert_eq!(events, [PendingEvent::Reload, PendingEvent::None]);
        assert_eq!(state.panes[0].len(), before + 1);
    }

    #[test]
    fn test_session_round_trip() {
        let (_a, _b, mut state) = panes(&[], &[]);
        state.panes[1].set_manual_filter("tmp", true).unwrap();
        state.switch_pane();

        let saved = state.session();
        let mut fresh = FSState::new(state.panes[0].cwd(), state.panes[1].cwd(), Config::default()).unwrap();
        fresh.apply_session(&saved).unwrap();
        assert_eq!(fresh.active_pane, 1);
        assert_eq!(fresh.panes[1].filters().manual_raw(), "tmp");
    }
}
