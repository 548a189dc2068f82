//! `src/filter/engine.rs`
//! ============================================================================
//! # Filter Layers
//!
//! Visibility of an entry is the conjunction of:
//!
//! * the dot-file toggle (with separate `..` rules for root listings),
//! * the auto filter (names hidden by "hide selection" style commands),
//! * the manual filter, XOR-ed with its inversion flag,
//! * the local filter, when the caller asks for it.
//!
//! On trees a hidden directory takes its subtree with it, and a directory
//! whose children were all filtered out stays as an empty leaf unless the
//! local pattern excludes its own name.

use std::path::Path;
use std::time::Instant;

use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FlistResult;
use crate::filter::matcher::Matcher;
use crate::fs::entry::Entry;
use crate::fs::scanner::is_root_dir;
use crate::model::entry_store::{compact, parent_indices};

/// Whether `..` is listed in root and non-root directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotDirs {
    pub root_parent: bool,
    pub nonroot_parent: bool,
}

impl Default for DotDirs {
    fn default() -> Self {
        Self {
            root_parent: false,
            nonroot_parent: true,
        }
    }
}

/// Manual and auto filters put aside by `remove_all`.
#[derive(Debug, Clone, Default)]
struct SavedFilters {
    manual: Option<Matcher>,
    invert: bool,
    auto: HashSet<CompactString, RandomState>,
}

/// Persistent filter layers of one pane. The local filter lives with the
/// view and is passed in where needed.
#[derive(Debug, Clone)]
pub struct FilterState {
    manual: Option<Matcher>,
    invert: bool,
    auto: HashSet<CompactString, RandomState>,
    hide_dot: bool,
    dotdirs: DotDirs,
    saved: Option<SavedFilters>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            manual: None,
            invert: true,
            auto: HashSet::with_hasher(RandomState::new()),
            hide_dot: true,
            dotdirs: DotDirs::default(),
            saved: None,
        }
    }
}

impl FilterState {
    #[must_use]
    pub fn new(hide_dot: bool, invert: bool, dotdirs: DotDirs) -> Self {
        Self {
            hide_dot,
            invert,
            dotdirs,
            ..Self::default()
        }
    }

    // --------------------------------------------------------
    // Manual filter
    // --------------------------------------------------------

    /// Compiles and installs a manual filter. An empty pattern clears it;
    /// an invalid one leaves the current filter untouched.
    pub fn set_manual(&mut self, pattern: &str, invert: bool) -> FlistResult<()> {
        if pattern.is_empty() {
            self.manual = None;
            self.invert = invert;
            return Ok(());
        }

        let matcher: Matcher = Matcher::parse(pattern)?;
        self.manual = Some(matcher);
        self.invert = invert;
        Ok(())
    }

    pub fn clear_manual(&mut self) {
        self.manual = None;
    }

    #[must_use]
    pub fn manual_raw(&self) -> &str {
        self.manual.as_ref().map_or("", Matcher::raw)
    }

    #[inline]
    #[must_use]
    pub const fn invert(&self) -> bool {
        self.invert
    }

    pub fn toggle_invert(&mut self) {
        self.invert = !self.invert;
    }

    // --------------------------------------------------------
    // Auto filter
    // --------------------------------------------------------

    /// Adds names to the auto filter. Returns how many were new.
    pub fn hide_names<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name: &S| -> bool { self.auto.insert(CompactString::new(name.as_ref())) })
            .count()
    }

    pub fn clear_auto(&mut self) {
        self.auto.clear();
    }

    #[must_use]
    pub fn auto_len(&self) -> usize {
        self.auto.len()
    }

    /// Auto-filtered names in no particular order.
    pub fn auto_names(&self) -> impl Iterator<Item = &str> {
        self.auto.iter().map(CompactString::as_str)
    }

    // --------------------------------------------------------
    // Dot files
    // --------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn dot_hidden(&self) -> bool {
        self.hide_dot
    }

    pub fn set_dot(&mut self, hidden: bool) {
        self.hide_dot = hidden;
    }

    pub fn toggle_dot(&mut self) {
        self.hide_dot = !self.hide_dot;
    }

    #[inline]
    #[must_use]
    pub const fn dotdirs(&self) -> DotDirs {
        self.dotdirs
    }

    pub fn set_dotdirs(&mut self, dotdirs: DotDirs) {
        self.dotdirs = dotdirs;
    }

    // --------------------------------------------------------
    // Remove / restore
    // --------------------------------------------------------

    /// Puts manual and auto filters aside. Returns `false` when there was
    /// nothing to remove.
    pub fn remove_all(&mut self) -> bool {
        if self.manual.is_none() && self.auto.is_empty() {
            return false;
        }

        self.saved = Some(SavedFilters {
            manual: self.manual.take(),
            invert: self.invert,
            auto: std::mem::take(&mut self.auto),
        });
        true
    }

    /// Brings back what `remove_all` put aside.
    pub fn restore(&mut self) -> bool {
        let Some(saved) = self.saved.take() else {
            return false;
        };

        self.manual = saved.manual;
        self.invert = saved.invert;
        self.auto = saved.auto;
        true
    }

    #[must_use]
    pub const fn has_saved(&self) -> bool {
        self.saved.is_some()
    }

    // --------------------------------------------------------
    // Visibility
    // --------------------------------------------------------

    /// Whether an entry named `name` in `dir` passes the filters. The local
    /// layer only applies when `local` is given.
    #[must_use]
    pub fn is_visible(&self, dir: &Path, name: &str, is_dir: bool, local: Option<&Matcher>) -> bool {
        if name == ".." {
            return if is_root_dir(dir) {
                self.dotdirs.root_parent
            } else {
                self.dotdirs.nonroot_parent
            };
        }

        if self.hide_dot && name.starts_with('.') {
            return false;
        }
        if self.auto.contains(name) {
            return false;
        }
        if let Some(manual) = &self.manual
            && manual.matches(dir, name, is_dir) == self.invert
        {
            return false;
        }

        local.is_none_or(|m: &Matcher| -> bool { m.matches(dir, name, is_dir) })
    }

    #[must_use]
    pub fn entry_visible(&self, entry: &Entry, local: Option<&Matcher>) -> bool {
        self.is_visible(entry.origin.as_path(), &entry.name, entry.is_dir(), local)
    }
}

// ------------------------------------------------------------
// Applying filters to entry arrays
// ------------------------------------------------------------

/// Drops invisible entries from a flat list. Returns the number removed.
pub fn filter_flat(entries: &mut Vec<Entry>, filters: &FilterState, local: Option<&Matcher>) -> usize {
    let keep: Vec<bool> = entries
        .iter()
        .map(|e: &Entry| -> bool { e.is_fake || filters.entry_visible(e, local) })
        .collect();
    compact(entries, &keep)
}

/// Tree flavour of [`filter_flat`]: hidden directories lose their whole
/// subtree, directories with surviving children always stay, and childless
/// ones stay unless the local pattern rejects their name.
pub fn filter_tree(entries: &mut Vec<Entry>, filters: &FilterState, local: Option<&Matcher>) -> usize {
    let parents: Vec<Option<usize>> = parent_indices(entries);
    let mut keep: Vec<bool> = vec![false; entries.len()];
    let mut survivors: Vec<usize> = vec![0; entries.len()];

    for i in (0..entries.len()).rev() {
        let entry: &Entry = &entries[i];
        if entry.is_fake {
            keep[i] = true;
        } else if filters.entry_visible(entry, None) {
            let by_name: bool = local.is_none_or(|m: &Matcher| -> bool {
                m.matches(entry.origin.as_path(), &entry.name, entry.is_dir())
            });
            keep[i] = by_name || (entry.is_dir() && survivors[i] > 0);
        }

        if keep[i]
            && let Some(p) = parents[i]
        {
            survivors[p] += 1;
        }
    }

    compact(entries, &keep)
}

/// Filters `entries` with the algorithm matching their shape and records
/// local-filter match spans on the survivors.
pub fn filter_entries(entries: &mut Vec<Entry>, filters: &FilterState, local: Option<&Matcher>, tree: bool) -> usize {
    let start_time: Instant = Instant::now();
    let before: usize = entries.len();

    let removed: usize = if tree {
        filter_tree(entries, filters, local)
    } else {
        filter_flat(entries, filters, local)
    };

    if let Some(matcher) = local {
        for entry in entries.iter_mut() {
            entry.match_span = matcher.span(&entry.name);
        }
    }

    debug!(
        marker = "FILTER_APPLIED",
        operation_type = "filter_entries",
        before,
        removed,
        tree,
        local = local.map(Matcher::raw),
        duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
        "Filters applied"
    );

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::entry::{EntryType, Origin};
    use crate::test_support::{assert_tree_valid, dir, file, names, root, tree};
    use std::path::PathBuf;

    #[test]
    fn test_dot_and_parent_rules() {
        let mut filters = FilterState::default();
        assert!(!filters.is_visible(root(), ".hidden", false, None));
        filters.toggle_dot();
        assert!(filters.is_visible(root(), ".hidden", false, None));

        assert!(filters.is_visible(root(), "..", true, None));
        assert!(!filters.is_visible(Path::new("/"), "..", true, None));

        filters.set_dotdirs(DotDirs {
            root_parent: true,
            nonroot_parent: false,
        });
        assert!(filters.is_visible(Path::new("/"), "..", true, None));
        assert!(!filters.is_visible(root(), "..", true, None));
    }

    #[test]
    fn test_manual_invert_semantics() {
        let mut filters = FilterState::default();
        filters.set_manual("*.o", true).unwrap();
        assert!(!filters.is_visible(root(), "main.o", false, None));
        assert!(filters.is_visible(root(), "main.c", false, None));

        filters.set_manual("*.o", false).unwrap();
        assert!(filters.is_visible(root(), "main.o", false, None));
        assert!(!filters.is_visible(root(), "main.c", false, None));
    }

    #[test]
    fn test_invalid_manual_keeps_previous() {
        let mut filters = FilterState::default();
        filters.set_manual("*.o", true).unwrap();
        assert!(filters.set_manual("/(/", true).is_err());
        assert_eq!(filters.manual_raw(), "*.o");
    }

    #[test]
    fn test_auto_filter_and_restore() {
        let mut filters = FilterState::default();
        filters.set_manual("{*.log}", true).unwrap();
        assert_eq!(filters.hide_names(["a", "b", "a"]), 2);
        assert!(!filters.is_visible(root(), "a", false, None));

        assert!(filters.remove_all());
        assert!(filters.is_visible(root(), "a", false, None));
        assert!(filters.is_visible(root(), "x.log", false, None));
        assert_eq!(filters.manual_raw(), "");

        assert!(filters.restore());
        assert_eq!(filters.manual_raw(), "{*.log}");
        assert!(!filters.is_visible(root(), "a", false, None));
        assert!(!filters.restore());
    }

    #[test]
    fn test_local_layer_only_when_requested() {
        let filters = FilterState::default();
        let local = Matcher::parse_local("ab").unwrap();
        assert!(filters.is_visible(root(), "xyz", false, None));
        assert!(!filters.is_visible(root(), "xyz", false, Some(&local)));
        assert!(filters.is_visible(root(), "cabin", false, Some(&local)));
    }

    #[test]
    fn test_filter_flat_keeps_fakes() {
        let mut fake = Entry::fake(Origin::Owned(PathBuf::from("/t")), 3);
        fake.name = ".".into();
        let mut entries = vec![file("a"), file(".b"), fake, dir("c")];
        let removed = filter_flat(&mut entries, &FilterState::default(), None);
        assert_eq!(removed, 1);
        assert_eq!(entries.len(), 3);
        assert!(entries[1].is_fake);
    }

    #[test]
    fn test_tree_hidden_dir_drops_subtree() {
        let mut entries = tree(&[(0, ".git/"), (1, "HEAD"), (0, "src/"), (1, "main.rs"), (1, ".keep")]);
        filter_tree(&mut entries, &FilterState::default(), None);
        assert_tree_valid(&entries);
        assert_eq!(names(&entries), vec!["src", "main.rs"]);
        assert_eq!(entries[0].child_count, 1);
    }

    #[test]
    fn test_tree_local_leaf_suppression() {
        let mut entries = tree(&[
            (0, "docs/"),
            (1, "guide.md"),
            (0, "src/"),
            (1, "lib.rs"),
            (1, "nested/"),
            (2, "deep.rs"),
            (0, "empty/"),
            (0, "rsync/"),
        ]);
        let local = Matcher::parse_local("rs").unwrap();
        filter_tree(&mut entries, &FilterState::default(), Some(&local));

        assert_tree_valid(&entries);
        // `docs` and `empty` have no surviving children and don't match;
        // `rsync` is empty but matches by name.
        assert_eq!(names(&entries), vec!["src", "lib.rs", "nested", "deep.rs", "rsync"]);
        assert_eq!(entries[0].child_count, 3);
        assert_eq!(entries[2].child_count, 1);
        assert_eq!(entries[0].match_span, None);
    }

    #[test]
    fn test_tree_without_local_keeps_emptied_dirs() {
        let mut entries = tree(&[(0, "build/"), (1, "a.o"), (1, "b.o"), (0, "x.c")]);
        let mut filters = FilterState::default();
        filters.set_manual("*.o", true).unwrap();
        filter_tree(&mut entries, &filters, None);

        assert_tree_valid(&entries);
        assert_eq!(names(&entries), vec!["build", "x.c"]);
        assert_eq!(entries[0].child_count, 0);
        assert_eq!(entries[0].kind, EntryType::Dir);
    }

    #[test]
    fn test_filter_entries_sets_spans() {
        let mut entries = vec![file("alpha"), file("beta")];
        let local = Matcher::parse_local("ph").unwrap();
        filter_entries(&mut entries, &FilterState::default(), Some(&local), false);
        assert_eq!(names(&entries), vec!["alpha"]);
        assert_eq!(entries[0].match_span, Some((2, 4)));
    }
}
