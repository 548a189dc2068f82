//! `src/filter/local.rs`
//!
//! Interactive narrowing filter. While a local filter is active the pane
//! keeps the list it had before narrowing (`unfiltered`), so dropping the
//! filter never touches the file system. Keystroke-by-keystroke updates go
//! through [`View::local_filter_set`], which refuses patterns that would
//! leave nothing on screen; [`View::local_filter_apply`] is the
//! non-interactive variant that accepts an empty result.

use tracing::debug;

use crate::error::{FlistError, FlistResult};
use crate::filter::engine::{DotDirs, FilterState, filter_entries};
use crate::filter::matcher::Matcher;
use crate::fs::entry::{Entry, EntryKey};
use crate::model::entry_store::copy_entries;
use crate::model::view::{CustomKind, View};

/// Result of an interactive update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFilterStatus {
    Applied,
    /// The pattern compiled but nothing would stay visible. Not committed.
    AllHidden,
    Invalid,
}

#[derive(Debug, Clone, Default)]
pub struct LocalFilter {
    pub(crate) matcher: Option<Matcher>,
    pub(crate) in_progress: bool,
    /// Pattern active when the interactive session began.
    pub(crate) prev: String,
    pub(crate) unfiltered: Option<Vec<Entry>>,
    /// (pattern, cursor entry) recorded each time the pattern was extended.
    pub(crate) poshist: Vec<(String, EntryKey)>,
}

impl LocalFilter {
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.matcher.as_ref().map_or("", Matcher::raw)
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.matcher.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Updates the position history for a switch to `pattern` and returns
    /// the entry to put the cursor back on, if any.
    fn track(&mut self, pattern: &str, cursor: Option<EntryKey>) -> Option<EntryKey> {
        let current: String = self.pattern().to_string();

        if pattern.starts_with(current.as_str()) && pattern != current {
            if let Some(key) = cursor {
                self.poshist.push((current, key));
            }
            return None;
        }

        while let Some((recorded, _)) = self.poshist.last() {
            if pattern.starts_with(recorded.as_str()) {
                break;
            }
            self.poshist.pop();
        }

        if self.poshist.last().is_some_and(|(recorded, _): &(String, EntryKey)| -> bool { recorded == pattern }) {
            return self.poshist.pop().map(|(_, key): (String, EntryKey)| -> EntryKey { key });
        }
        None
    }
}

/// Filter state that lets everything through, so only the local layer
/// decides. The persistent layers already ran on the snapshot.
fn passthrough() -> FilterState {
    FilterState::new(
        false,
        true,
        DotDirs {
            root_parent: true,
            nonroot_parent: true,
        },
    )
}

/// Narrows `entries` by `matcher`, keeping tree directories with surviving
/// children.
pub(crate) fn narrow(entries: &mut Vec<Entry>, matcher: &Matcher, tree: bool) -> usize {
    filter_entries(entries, &passthrough(), Some(matcher), tree)
}

fn visible_rows(entries: &[Entry]) -> usize {
    entries
        .iter()
        .filter(|e: &&Entry| -> bool { !e.is_fake && !e.is_parent_ref() })
        .count()
}

fn compile(pattern: &str) -> FlistResult<Option<Matcher>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Matcher::parse_local(pattern).map(Some)
}

impl View {
    #[must_use]
    pub const fn local_filter(&self) -> &LocalFilter {
        &self.local
    }

    #[must_use]
    pub fn local_filter_pattern(&self) -> &str {
        self.local.pattern()
    }

    #[must_use]
    pub const fn local_filter_active(&self) -> bool {
        self.local.is_active()
    }

    fn local_allowed(&self) -> bool {
        self.custom_kind() != Some(CustomKind::Diff)
    }

    /// Snapshot of the pre-filter list, taken on first use.
    fn ensure_unfiltered(&mut self) -> FlistResult<()> {
        if self.local.unfiltered.is_none() {
            self.local.unfiltered = Some(self.store.snapshot()?);
        }
        Ok(())
    }

    /// Snapshot narrowed by `matcher`.
    fn candidate(&self, matcher: Option<&Matcher>) -> FlistResult<Vec<Entry>> {
        let base: &[Entry] = self.local.unfiltered.as_deref().unwrap_or_else(|| self.store.as_slice());
        let mut entries: Vec<Entry> = copy_entries(base)?;
        match matcher {
            Some(matcher) => {
                narrow(&mut entries, matcher, self.is_tree());
            }
            None => entries.iter_mut().for_each(|e: &mut Entry| e.match_span = None),
        }
        Ok(entries)
    }

    fn commit_local(&mut self, matcher: Option<Matcher>, entries: Vec<Entry>, anchor: Option<EntryKey>) -> usize {
        let active: bool = matcher.is_some();
        self.local.matcher = matcher;
        self.store.replace(entries, None);
        self.store.uniqueness_check();
        self.reanchor(anchor.as_ref());

        if !active && !self.local.in_progress {
            self.local.unfiltered = None;
        }
        self.store.len()
    }

    /// Interactive update. Nothing is committed unless the result is
    /// [`LocalFilterStatus::Applied`].
    pub fn local_filter_set(&mut self, pattern: &str) -> LocalFilterStatus {
        if !self.local_allowed() {
            return LocalFilterStatus::Invalid;
        }

        let matcher: Option<Matcher> = match compile(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                debug!(
                    marker = "LOCAL_FILTER_REJECTED",
                    operation_type = "local_filter_set",
                    pattern,
                    error = %e,
                    "Local filter pattern does not compile"
                );
                return LocalFilterStatus::Invalid;
            }
        };

        if !self.local.in_progress {
            if self.ensure_unfiltered().is_err() {
                return LocalFilterStatus::Invalid;
            }
            self.local.in_progress = true;
            self.local.prev = self.local.pattern().to_string();
            self.local.poshist.clear();
        }

        let Ok(entries) = self.candidate(matcher.as_ref()) else {
            return LocalFilterStatus::Invalid;
        };
        if matcher.is_some() && visible_rows(&entries) == 0 {
            return LocalFilterStatus::AllHidden;
        }

        let cursor: Option<EntryKey> = self.current().map(Entry::key);
        let restored: Option<EntryKey> = self.local.track(pattern, cursor.clone());
        self.commit_local(matcher, entries, restored.or(cursor));
        LocalFilterStatus::Applied
    }

    /// Ends the interactive session keeping the current pattern.
    pub fn local_filter_accept(&mut self) {
        self.local.in_progress = false;
        self.local.prev.clear();
        self.local.poshist.clear();
        if !self.local.is_active() {
            self.local.unfiltered = None;
        }
    }

    /// Ends the interactive session going back to the pattern active when
    /// it began.
    pub fn local_filter_cancel(&mut self) -> usize {
        if !self.local.in_progress {
            return self.store.len();
        }

        let prev: String = std::mem::take(&mut self.local.prev);
        self.local.in_progress = false;
        self.local.poshist.clear();

        // `prev` compiled when it was set.
        let matcher: Option<Matcher> = compile(&prev).ok().flatten();
        let cursor: Option<EntryKey> = self.current().map(Entry::key);
        match self.candidate(matcher.as_ref()) {
            Ok(entries) => self.commit_local(matcher, entries, cursor),
            Err(_) => self.store.len(),
        }
    }

    /// Non-interactive apply: commits `pattern` even when nothing matches.
    pub fn local_filter_apply(&mut self, pattern: &str) -> FlistResult<usize> {
        if !self.local_allowed() {
            return Err(FlistError::invalid_input("local_filter", "not available in diff views"));
        }

        let matcher: Option<Matcher> = compile(pattern)?;
        self.ensure_unfiltered()?;
        let entries: Vec<Entry> = self.candidate(matcher.as_ref())?;

        let cursor: Option<EntryKey> = self.current().map(Entry::key);
        self.local.in_progress = false;
        self.local.prev.clear();
        self.local.poshist.clear();
        let count: usize = self.commit_local(matcher, entries, cursor);

        debug!(
            marker = "LOCAL_FILTER_APPLIED",
            operation_type = "local_filter_apply",
            pattern,
            visible = count,
            "Local filter applied"
        );
        Ok(count)
    }

    /// Drops the local filter and brings back the pre-filter list.
    pub fn local_filter_remove(&mut self) -> usize {
        let cursor: Option<EntryKey> = self.current().map(Entry::key);
        let unfiltered: Option<Vec<Entry>> = self.local.unfiltered.take();
        self.local.reset();

        if let Some(mut entries) = unfiltered {
            entries.iter_mut().for_each(|e: &mut Entry| e.match_span = None);
            self.store.replace(entries, None);
            self.reanchor(cursor.as_ref());
        }
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::view::CustomView;
    use crate::test_support::{assert_tree_valid, file, names, root, tree};

    fn view_of(list: &[&str]) -> View {
        let mut view = View::new(root());
        let entries: Vec<Entry> = list.iter().map(|name| file(name)).collect();
        view.set_custom_list("list", CustomKind::Regular, entries).unwrap();
        view
    }

    #[test]
    fn test_widening_restores_cursor() {
        let mut view = view_of(&["alpha", "alps", "beta", "gamma"]);
        view.cursor_to_name("beta");

        assert_eq!(view.local_filter_set("a"), LocalFilterStatus::Applied);
        assert_eq!(view.current().unwrap().name, "beta");

        assert_eq!(view.local_filter_set("al"), LocalFilterStatus::Applied);
        assert_eq!(names(view.entries()), vec!["alpha", "alps"]);

        assert_eq!(view.local_filter_set("a"), LocalFilterStatus::Applied);
        assert_eq!(view.current().unwrap().name, "beta");
    }

    #[test]
    fn test_all_hidden_is_not_committed() {
        let mut view = view_of(&["a", "b"]);

        assert_eq!(view.local_filter_set("zzz"), LocalFilterStatus::AllHidden);
        assert_eq!(view.len(), 2);
        assert_eq!(view.local_filter_pattern(), "");
        view.local_filter_cancel();

        assert_eq!(view.local_filter_apply("zzz").unwrap(), 0);
        assert!(view.is_empty());
        assert_eq!(view.local_filter_remove(), 2);
    }

    #[test]
    fn test_invalid_pattern_keeps_state() {
        let mut view = view_of(&["a", "b"]);
        view.local_filter_apply("a").unwrap();

        assert_eq!(view.local_filter_set("("), LocalFilterStatus::Invalid);
        assert_eq!(view.local_filter_pattern(), "a");
        assert!(view.local_filter_apply("(").is_err());
        assert_eq!(names(view.entries()), vec!["a"]);
    }

    #[test]
    fn test_cancel_returns_to_previous_pattern() {
        let mut view = view_of(&["ab", "ac", "b"]);
        view.local_filter_apply("a").unwrap();

        view.local_filter_set("ab");
        assert_eq!(names(view.entries()), vec!["ab"]);

        view.local_filter_cancel();
        assert_eq!(view.local_filter_pattern(), "a");
        assert_eq!(names(view.entries()), vec!["ab", "ac"]);
    }

    #[test]
    fn test_accept_then_remove_restores_exact_list() {
        let mut view = view_of(&["one", "two", "three"]);
        let before: Vec<Entry> = view.entries().to_vec();

        view.local_filter_set("t");
        view.local_filter_accept();
        assert!(view.local_filter_active());
        assert_eq!(view.len(), 2);
        assert!(view.entries().iter().all(|e| e.match_span.is_some()));

        view.local_filter_remove();
        assert_eq!(view.entries(), before.as_slice());
    }

    #[test]
    fn test_remove_restore_round_trip() {
        let mut view = view_of(&["a.o", "b.c", "b.o"]);
        view.set_manual_filter("*.o", true).unwrap();
        let filtered: Vec<String> = names(view.entries()).iter().map(|s| s.to_string()).collect();

        view.local_filter_apply("b").unwrap();
        view.remove_filters().unwrap();
        assert!(!view.local_filter_active());
        assert_eq!(view.len(), 3);

        view.restore_filters().unwrap();
        assert_eq!(names(view.entries()), filtered);
    }

    #[test]
    fn test_local_filter_survives_repopulate() {
        let mut view = view_of(&["ab", "b", ".ab"]);
        view.local_filter_apply("a").unwrap();
        view.toggle_dot_files().unwrap();
        assert_eq!(names(view.entries()), vec![".ab", "ab"]);

        view.local_filter_remove();
        assert_eq!(names(view.entries()), vec![".ab", "ab", "b"]);
    }

    #[test]
    fn test_tree_keeps_matching_leaves() {
        let mut view = View::new(root());
        let entries = tree(&[
            (0, "src/"),
            (1, "main.rs"),
            (1, "lib.rs"),
            (0, "docs/"),
            (1, "guide.md"),
            (0, "empty/"),
        ]);
        view.install_custom(CustomView::new(CustomKind::CustomTree, "tree", root()), entries)
            .unwrap();

        view.local_filter_apply("rs").unwrap();
        assert_tree_valid(view.entries());
        assert_eq!(names(view.entries()), vec!["src", "lib.rs", "main.rs"]);

        view.local_filter_apply("s").unwrap();
        assert_tree_valid(view.entries());
        assert_eq!(names(view.entries()), vec!["docs", "src", "lib.rs", "main.rs"]);
        assert_eq!(view.entries()[0].child_count, 0);
    }

    #[test]
    fn test_diff_views_refuse_local_filter() {
        let mut view = View::new(root());
        view.install_custom(CustomView::new(CustomKind::Diff, "diff", root()), vec![file("a")])
            .unwrap();
        assert_eq!(view.local_filter_set("a"), LocalFilterStatus::Invalid);
        assert!(view.local_filter_apply("a").is_err());
    }
}
