//! ``src/model/view.rs``
//! ============================================================================
//! # `View`: One Pane's File List
//!
//! A view owns the unfiltered source list (`full`: the last directory scan,
//! tree walk or custom list) and the visible `EntryStore` derived from it by
//! the rebuild pipeline:
//!
//! 1. persistent filters (dot files, auto, manual), tree-aware
//! 2. excluded paths and folded directories (custom views)
//! 3. sort, unless the list has a fixed order
//! 4. local filter, snapshotting the pre-local list
//! 5. swap into the store, collapse duplicates, re-anchor the cursor
//!
//! Operations that only change presentation (filters, folds, sort keys)
//! rebuild from `full` without touching the file system; `reload` refreshes
//! `full` first.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use compact_str::CompactString;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::cache::dcache::DirCache;
use crate::config::Config;
use crate::error::{FlistError, FlistResult};
use crate::filter::engine::{FilterState, filter_entries};
use crate::filter::local::{LocalFilter, narrow};
use crate::filter::matcher::Matcher;
use crate::fs::entry::{Entry, EntryKey};
use crate::fs::path_trie::PathTrie;
use crate::fs::scanner::{CancelFlag, ScanOptions, scan_directory};
use crate::model::entry_store::{EntryStore, compact, copy_entries};
use crate::model::watch::{PendingEvent, PendingFlag, WatchMeta};
use crate::session::HistoryEntry;
use crate::sort::engine::{SortContext, sort_entries};
use crate::sort::groups::GroupList;
use crate::sort::keys::{SortKey, SortKeys};
use crate::tree::builder::{build_custom_tree, build_tree, common_root};
use crate::tree::fold::{collapse_folded, drop_empty_dirs, drop_excluded};

/// Directory history kept per pane.
const HISTORY_LIMIT: usize = 256;

/// Kind of a list that is not a literal directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomKind {
    /// Custom list kept sorted by the pane's keys.
    Regular,
    /// Custom list kept in insertion order.
    VeryCustom,
    /// Directory tree walked from the file system.
    Tree,
    /// Tree assembled from a custom list of paths.
    CustomTree,
    /// Single-pane comparison result.
    Compare,
    /// One side of a two-pane comparison.
    Diff,
}

impl CustomKind {
    #[inline]
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree | Self::CustomTree)
    }

    #[inline]
    #[must_use]
    pub const fn is_compare(self) -> bool {
        matches!(self, Self::Compare | Self::Diff)
    }

    /// Whether the pane's sort keys apply.
    #[inline]
    #[must_use]
    pub const fn is_sorted(self) -> bool {
        !matches!(self, Self::VeryCustom | Self::Compare | Self::Diff)
    }
}

/// Payload of a custom view.
#[derive(Debug, Clone)]
pub struct CustomView {
    pub kind: CustomKind,
    pub title: String,
    /// Directory the list is rooted at (tree root, compare root).
    pub root: PathBuf,
    pub excluded: PathTrie,
    pub folded: PathTrie,
    pub tree_depth: Option<usize>,
}

impl CustomView {
    #[must_use]
    pub fn new(kind: CustomKind, title: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            title: title.into(),
            root: root.into(),
            excluded: PathTrie::new(),
            folded: PathTrie::new(),
            tree_depth: None,
        }
    }
}

#[derive(Debug)]
pub struct View {
    pub(crate) cwd: Arc<Path>,
    /// Unfiltered source of the visible list.
    pub(crate) full: Vec<Entry>,
    pub(crate) store: EntryStore,

    pub(crate) cursor: usize,
    pub(crate) top: usize,
    pub(crate) height: usize,

    pub(crate) custom: Option<CustomView>,
    pub(crate) local: LocalFilter,
    pub(crate) filters: FilterState,

    pub(crate) sort: SortKeys,
    pub(crate) sort_global: SortKeys,
    pub(crate) sort_groups: String,
    pub(crate) groups: GroupList,
    pub(crate) natural: bool,
    pub(crate) tree_depth: Option<usize>,
    pub(crate) show_empty_dirs: bool,
    pub(crate) dcache: DirCache,

    pub(crate) history: Vec<HistoryEntry>,

    pending: PendingFlag,
    watch: Mutex<WatchMeta>,
}

impl View {
    /// Empty view of `cwd` with default settings. Nothing is scanned until
    /// [`View::reload`].
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Arc::from(cwd.into()),
            full: Vec::new(),
            store: EntryStore::new(),
            cursor: 0,
            top: 0,
            height: 20,
            custom: None,
            local: LocalFilter::default(),
            filters: FilterState::default(),
            sort: SortKeys::default(),
            sort_global: SortKeys::default(),
            sort_groups: String::new(),
            groups: Arc::from(Vec::new()),
            natural: true,
            tree_depth: None,
            show_empty_dirs: true,
            dcache: DirCache::default(),
            history: Vec::new(),
            pending: PendingFlag::new(),
            watch: Mutex::new(WatchMeta::default()),
        }
    }

    #[must_use]
    pub fn from_config(cwd: impl Into<PathBuf>, config: &Config, dcache: DirCache, groups: GroupList) -> Self {
        let mut view = Self::new(cwd);
        view.filters = FilterState::new(
            config.filter.hide_dot_files,
            config.filter.invert_manual,
            config.filter.dotdirs,
        );
        view.sort = config.sort.effective_keys();
        view.sort_global = view.sort;
        view.sort_groups = config.sort.groups.clone();
        view.groups = groups;
        view.natural = config.sort.natural;
        view.tree_depth = config.tree.depth_limit;
        view.show_empty_dirs = config.tree.show_empty_dirs;
        view.dcache = dcache;
        view
    }

    // --------------------------------------------------------
    // Accessors
    // --------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        self.store.as_slice()
    }

    #[inline]
    #[must_use]
    pub fn entry(&self, idx: usize) -> Option<&Entry> {
        self.store.get(idx)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn full(&self) -> &[Entry] {
        &self.full
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn top(&self) -> usize {
        self.top
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Entry under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        self.store.get(self.cursor)
    }

    #[must_use]
    pub const fn custom(&self) -> Option<&CustomView> {
        self.custom.as_ref()
    }

    #[must_use]
    pub fn custom_kind(&self) -> Option<CustomKind> {
        self.custom.as_ref().map(|c: &CustomView| -> CustomKind { c.kind })
    }

    #[must_use]
    pub fn is_tree(&self) -> bool {
        self.custom_kind().is_some_and(CustomKind::is_tree)
    }

    #[must_use]
    pub fn is_compare(&self) -> bool {
        self.custom_kind().is_some_and(CustomKind::is_compare)
    }

    #[must_use]
    pub fn is_sorted_kind(&self) -> bool {
        self.custom_kind().is_none_or(CustomKind::is_sorted)
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterState {
        &self.filters
    }

    #[must_use]
    pub const fn sort_keys(&self) -> &SortKeys {
        &self.sort
    }

    #[must_use]
    pub const fn global_sort_keys(&self) -> &SortKeys {
        &self.sort_global
    }

    #[must_use]
    pub fn sort_groups(&self) -> &str {
        &self.sort_groups
    }

    #[must_use]
    pub const fn natural(&self) -> bool {
        self.natural
    }

    #[must_use]
    pub const fn has_inconsistency(&self) -> bool {
        self.store.has_inconsistency()
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub(crate) fn sort_context(&self) -> SortContext<'_> {
        SortContext::new(&self.sort)
            .with_groups(&self.groups)
            .with_natural(self.natural)
            .with_dcache(Some(&self.dcache))
    }

    // --------------------------------------------------------
    // Rebuild pipeline
    // --------------------------------------------------------

    /// Persistent filters, exclusions, folds and sort applied to `entries`.
    pub(crate) fn shape(&self, entries: &mut Vec<Entry>) {
        let tree: bool = self.is_tree();

        if !self.is_compare() {
            filter_entries(entries, &self.filters, None, tree);
        }

        if let Some(custom) = &self.custom {
            if !custom.excluded.is_empty() {
                drop_excluded(entries, &custom.excluded);
            }
            if tree {
                collapse_folded(entries, &custom.folded);
                if !self.show_empty_dirs {
                    drop_empty_dirs(entries);
                }
            }
        }

        if self.is_sorted_kind() {
            sort_entries(entries, &self.sort_context());
        }
    }

    /// Rebuilds the visible list from `full`. Returns the visible count.
    pub fn repopulate(&mut self) -> FlistResult<usize> {
        let start_time: Instant = Instant::now();
        let mut entries: Vec<Entry> = copy_entries(&self.full)?;
        self.shape(&mut entries);

        if let Some(matcher) = self.local.matcher.as_ref() {
            let unfiltered: Vec<Entry> = copy_entries(&entries)?;
            narrow(&mut entries, matcher, self.is_tree());
            self.local.unfiltered = Some(unfiltered);
        }

        let count: usize = self.install(entries);

        debug!(
            marker = "VIEW_REPOPULATED",
            operation_type = "repopulate",
            dir = %self.cwd.display(),
            source = self.full.len(),
            visible = count,
            duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
            "Visible list rebuilt"
        );
        Ok(count)
    }

    /// Swaps `entries` in, keeping the cursor on the same file when it
    /// survived.
    pub(crate) fn install(&mut self, entries: Vec<Entry>) -> usize {
        let anchor: Option<Entry> = self.store.replace(entries, Some(self.cursor));
        self.store.uniqueness_check();
        self.reanchor(anchor.map(|e: Entry| -> EntryKey { e.key() }).as_ref());
        self.store.len()
    }

    /// Puts the cursor on `key` if present, otherwise clamps it.
    pub(crate) fn reanchor(&mut self, key: Option<&EntryKey>) {
        if let Some(key) = key
            && let Some(idx) = self.store.find_key(key)
        {
            self.cursor = idx;
        }
        self.ensure_cursor_valid();
    }

    /// Refreshes the source list from the file system and rebuilds.
    /// Comparison panes only rebuild; refreshing them needs both panes.
    pub fn reload(&mut self, cancel: &CancelFlag) -> FlistResult<usize> {
        if self.is_compare() {
            return self.repopulate();
        }

        let fresh: Vec<Entry> = match &self.custom {
            None => scan_directory(&self.cwd, ScanOptions { parent_entry: true }, cancel)?,
            Some(custom) if custom.kind == CustomKind::Tree => build_tree(
                &custom.root,
                custom.tree_depth,
                &custom.folded,
                &custom.excluded,
                cancel,
            )?,
            Some(_) => refresh_entries(&self.full, cancel)?,
        };

        self.full = fresh;
        self.repopulate()
    }

    // --------------------------------------------------------
    // Navigation and custom lists
    // --------------------------------------------------------

    /// Scans `dir` and makes it the pane's directory. On failure the pane
    /// is left as it was.
    pub fn change_dir(&mut self, dir: impl Into<PathBuf>, cancel: &CancelFlag) -> FlistResult<usize> {
        let dir: Arc<Path> = Arc::from(dir.into());
        let scanned: Vec<Entry> = scan_directory(&dir, ScanOptions { parent_entry: true }, cancel)?;

        self.remember_position();
        self.cwd = dir;
        self.custom = None;
        self.local.reset();
        self.full = scanned;
        self.cursor = 0;
        self.top = 0;

        let count: usize = self.repopulate()?;
        self.restore_position();

        info!(
            marker = "DIRECTORY_CHANGED",
            operation_type = "change_dir",
            dir = %self.cwd.display(),
            entries = count,
            "Pane moved to new directory"
        );
        Ok(count)
    }

    /// Replaces the pane's list with a custom one. `CustomTree` lists are
    /// nested under the common root of their paths.
    pub fn set_custom_list(&mut self, title: &str, kind: CustomKind, entries: Vec<Entry>) -> FlistResult<usize> {
        let (root, full): (PathBuf, Vec<Entry>) = match kind {
            CustomKind::Regular | CustomKind::VeryCustom => (self.cwd.to_path_buf(), entries),
            CustomKind::CustomTree => {
                let root: PathBuf = common_root(&entries).unwrap_or_else(|| self.cwd.to_path_buf());
                let tree: Vec<Entry> = build_custom_tree(&root, entries);
                (root, tree)
            }
            CustomKind::Tree | CustomKind::Compare | CustomKind::Diff => {
                return Err(FlistError::invalid_input(
                    "kind",
                    format!("{kind:?} lists are built by their own operation"),
                ));
            }
        };

        let custom = CustomView::new(kind, title, root);
        self.install_custom(custom, full)
    }

    pub(crate) fn install_custom(&mut self, custom: CustomView, full: Vec<Entry>) -> FlistResult<usize> {
        self.custom = Some(custom);
        self.local.reset();
        self.full = full;
        self.cursor = 0;
        self.top = 0;
        self.repopulate()
    }

    /// Turns the pane into a tree rooted at its directory.
    pub fn enter_tree(&mut self, depth: Option<usize>, cancel: &CancelFlag) -> FlistResult<usize> {
        let mut custom = CustomView::new(CustomKind::Tree, self.cwd.display().to_string(), self.cwd.to_path_buf());
        custom.tree_depth = depth.or(self.tree_depth);

        let full: Vec<Entry> = build_tree(&custom.root, custom.tree_depth, &custom.folded, &custom.excluded, cancel)?;
        self.install_custom(custom, full)
    }

    /// Drops any custom view and shows the plain directory again.
    pub fn leave_custom(&mut self, cancel: &CancelFlag) -> FlistResult<usize> {
        self.custom = None;
        self.local.reset();
        self.reload(cancel)
    }

    // --------------------------------------------------------
    // Sorting
    // --------------------------------------------------------

    /// Re-sorts the visible list (and the local-filter snapshot) in place.
    pub fn resort(&mut self) {
        if !self.is_sorted_kind() {
            return;
        }

        let anchor: Option<EntryKey> = self.current().map(Entry::key);
        let ctx: SortContext<'_> = SortContext::new(&self.sort)
            .with_groups(&self.groups)
            .with_natural(self.natural)
            .with_dcache(Some(&self.dcache));

        sort_entries(self.store.entries_mut(), &ctx);
        if let Some(unfiltered) = self.local.unfiltered.as_mut() {
            sort_entries(unfiltered, &ctx);
        }

        self.reanchor(anchor.as_ref());
    }

    pub fn set_sort_keys(&mut self, keys: SortKeys) {
        self.sort = keys;
        self.resort();
    }

    pub fn set_global_sort_keys(&mut self, keys: SortKeys) {
        self.sort_global = keys;
    }

    /// Drops the pane override and sorts by the global keys again.
    pub fn reset_sort(&mut self) {
        self.sort = self.sort_global;
        self.resort();
    }

    /// Installs an already compiled group list (see `GroupCache`).
    pub fn set_sort_groups(&mut self, raw: &str, groups: GroupList) {
        self.sort_groups = raw.to_string();
        self.groups = groups;
        if self.sort.contains(SortKey::Groups) {
            self.resort();
        }
    }

    /// Whether trees keep directories that have no visible children.
    pub fn set_show_empty_dirs(&mut self, show: bool) -> FlistResult<usize> {
        self.show_empty_dirs = show;
        self.repopulate()
    }

    pub fn set_natural(&mut self, natural: bool) {
        self.natural = natural;
        self.resort();
    }

    // --------------------------------------------------------
    // Persistent filters
    // --------------------------------------------------------

    /// Visibility of a would-be entry under the pane's filters.
    #[must_use]
    pub fn is_visible(&self, dir: &Path, name: &str, is_dir: bool, apply_local: bool) -> bool {
        let local: Option<&Matcher> = if apply_local { self.local.matcher.as_ref() } else { None };
        self.filters.is_visible(dir, name, is_dir, local)
    }

    /// Sets the manual filter. A bad pattern leaves filter and list as they
    /// were.
    pub fn set_manual_filter(&mut self, pattern: &str, invert: bool) -> FlistResult<usize> {
        self.filters.set_manual(pattern, invert)?;
        self.repopulate()
    }

    /// Hides the selection (or the cursor entry). Plain listings grow the
    /// auto filter; custom views exclude the entries.
    pub fn hide_entries(&mut self) -> FlistResult<usize> {
        if self.custom.is_some() {
            self.exclude()?;
            return Ok(self.len());
        }

        let names: Vec<CompactString> = self
            .target_indices()
            .into_iter()
            .filter_map(|i: usize| -> Option<CompactString> {
                let entry: &Entry = &self.store.as_slice()[i];
                (!entry.is_parent_ref()).then(|| entry.name.clone())
            })
            .collect();

        self.filters.hide_names(&names);
        self.clear_selection();
        self.repopulate()
    }

    pub fn clear_auto_filter(&mut self) -> FlistResult<usize> {
        self.filters.clear_auto();
        self.repopulate()
    }

    pub fn toggle_dot_files(&mut self) -> FlistResult<usize> {
        self.filters.toggle_dot();
        self.repopulate()
    }

    pub fn set_dot_files(&mut self, hidden: bool) -> FlistResult<usize> {
        self.filters.set_dot(hidden);
        self.repopulate()
    }

    /// Drops the local filter and puts manual and auto filters aside.
    pub fn remove_filters(&mut self) -> FlistResult<usize> {
        self.filters.remove_all();
        self.local.reset();
        self.repopulate()
    }

    /// Brings back the filters put aside by [`View::remove_filters`].
    pub fn restore_filters(&mut self) -> FlistResult<usize> {
        self.filters.restore();
        self.repopulate()
    }

    // --------------------------------------------------------
    // Cursor and viewport
    // --------------------------------------------------------

    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        self.adjust_scroll();
    }

    pub fn set_cursor(&mut self, idx: usize) {
        self.cursor = idx;
        self.ensure_cursor_valid();
    }

    /// Clamps the cursor into the list and scrolls it into view.
    pub fn ensure_cursor_valid(&mut self) {
        self.cursor = self.cursor.min(self.store.len().saturating_sub(1));
        self.adjust_scroll();
    }

    /// Keeps the cursor inside `top .. top + height`.
    const fn adjust_scroll(&mut self) {
        if self.cursor < self.top {
            self.top = self.cursor;
        } else if self.height > 0 && self.cursor >= self.top + self.height {
            self.top = self.cursor + 1 - self.height;
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.adjust_scroll();
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.store.len() {
            self.cursor += 1;
            self.adjust_scroll();
        }
    }

    pub fn select_first(&mut self) {
        self.cursor = 0;
        self.top = 0;
    }

    pub fn select_last(&mut self) {
        self.cursor = self.store.len().saturating_sub(1);
        self.adjust_scroll();
    }

    pub fn page_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(self.height);
        self.adjust_scroll();
    }

    pub fn page_down(&mut self) {
        self.cursor = (self.cursor + self.height).min(self.store.len().saturating_sub(1));
        self.adjust_scroll();
    }

    #[must_use]
    pub fn find_entry(&self, name: &str, dir: &Path) -> Option<usize> {
        self.store.find(name, dir)
    }

    /// Moves the cursor to the first entry called `name`.
    pub fn cursor_to_name(&mut self, name: &str) -> bool {
        match self.store.iter().position(|e: &Entry| -> bool { e.name == name }) {
            Some(idx) => {
                self.set_cursor(idx);
                true
            }
            None => false,
        }
    }

    // --------------------------------------------------------
    // Tree navigation
    // --------------------------------------------------------

    #[must_use]
    pub fn parent_index(&self, idx: usize) -> Option<usize> {
        let entry: &Entry = self.store.get(idx)?;
        (entry.child_pos > 0).then(|| idx - entry.child_pos)
    }

    #[must_use]
    pub fn next_sibling(&self, idx: usize) -> Option<usize> {
        let entry: &Entry = self.store.get(idx)?;
        let next: usize = idx + entry.child_count + 1;
        self.store.get(next)?;
        (self.parent_index(next) == self.parent_index(idx)).then_some(next)
    }

    #[must_use]
    pub fn prev_sibling(&self, idx: usize) -> Option<usize> {
        let parent: Option<usize> = self.parent_index(idx);
        let mut sibling: usize = parent.map_or(0, |p: usize| -> usize { p + 1 });
        while sibling < idx {
            let next: usize = sibling + self.store.as_slice()[sibling].child_count + 1;
            if next == idx {
                return Some(sibling);
            }
            sibling = next;
        }
        None
    }

    // --------------------------------------------------------
    // Selection
    // --------------------------------------------------------

    const fn selectable(entry: &Entry) -> bool {
        !entry.is_fake
    }

    pub fn select(&mut self, idx: usize, selected: bool) {
        if let Some(entry) = self.store.get_mut(idx)
            && Self::selectable(entry)
            && !entry.is_parent_ref()
        {
            entry.selected = selected;
        }
    }

    pub fn toggle_selection(&mut self, idx: usize) {
        if let Some(selected) = self.store.get(idx).map(|e: &Entry| -> bool { e.selected }) {
            self.select(idx, !selected);
        }
    }

    pub fn select_all(&mut self) {
        for entry in self.store.as_mut_slice() {
            entry.selected = Self::selectable(entry) && !entry.is_parent_ref();
        }
    }

    pub fn invert_selection(&mut self) {
        for entry in self.store.as_mut_slice() {
            entry.selected = !entry.selected && Self::selectable(entry) && !entry.is_parent_ref();
        }
    }

    pub fn clear_selection(&mut self) {
        for entry in self.store.as_mut_slice() {
            entry.selected = false;
        }
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.store.iter().filter(|e: &&Entry| -> bool { e.selected }).count()
    }

    /// Starts visual mode: the current selection is saved so the range can
    /// be added on top of it.
    pub fn begin_visual(&mut self) {
        for entry in self.store.as_mut_slice() {
            entry.was_selected = entry.selected;
        }
    }

    /// Selects the range between `anchor` and `cursor` on top of the saved
    /// selection.
    pub fn update_visual(&mut self, anchor: usize, cursor: usize) {
        let (lo, hi): (usize, usize) = (anchor.min(cursor), anchor.max(cursor));
        for (i, entry) in self.store.as_mut_slice().iter_mut().enumerate() {
            let in_range: bool = (lo..=hi).contains(&i) && Self::selectable(entry) && !entry.is_parent_ref();
            entry.selected = entry.was_selected || in_range;
        }
    }

    pub fn restore_previous_selection(&mut self) {
        for entry in self.store.as_mut_slice() {
            entry.selected = entry.was_selected;
        }
    }

    /// Selected rows, or the cursor row when nothing is selected.
    pub(crate) fn target_indices(&self) -> Vec<usize> {
        let selected: Vec<usize> = self
            .store
            .iter()
            .enumerate()
            .filter(|(_, e): &(usize, &Entry)| -> bool { e.selected })
            .map(|(i, _): (usize, &Entry)| -> usize { i })
            .collect();

        if !selected.is_empty() {
            return selected;
        }
        if self.cursor < self.store.len() {
            vec![self.cursor]
        } else {
            Vec::new()
        }
    }

    /// Marks the entries the next file operation works on. Fake entries
    /// and `..` are never marked.
    pub fn mark_for_operation(&mut self) -> usize {
        let targets: Vec<usize> = self.target_indices();
        for entry in self.store.as_mut_slice() {
            entry.marked = false;
        }

        let mut marked: usize = 0;
        for idx in targets {
            if let Some(entry) = self.store.get_mut(idx)
                && !entry.is_fake
                && !entry.is_parent_ref()
            {
                entry.marked = true;
                marked += 1;
            }
        }
        marked
    }

    #[must_use]
    pub fn marked_paths(&self) -> Vec<PathBuf> {
        self.store
            .iter()
            .filter(|e: &&Entry| -> bool { e.marked && !e.is_fake })
            .map(Entry::path)
            .collect()
    }

    #[must_use]
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.store
            .iter()
            .filter(|e: &&Entry| -> bool { e.selected && !e.is_fake })
            .map(Entry::path)
            .collect()
    }

    // --------------------------------------------------------
    // Pending events and watcher metadata
    // --------------------------------------------------------

    pub fn request_redraw(&self) {
        self.pending.request(PendingEvent::Redraw);
    }

    pub fn request_reload(&self) {
        self.pending.request(PendingEvent::Reload);
    }

    #[must_use]
    pub fn pending(&self) -> PendingEvent {
        self.pending.peek()
    }

    pub fn take_pending(&self) -> PendingEvent {
        self.pending.take()
    }

    /// Locks the watcher-writable metadata.
    pub fn watch_meta(&self) -> MutexGuard<'_, WatchMeta> {
        self.watch.lock()
    }

    /// Records what the pane showed last, for a watcher to compare with.
    pub fn remember_seen(&self) {
        let file: Option<CompactString> = self.current().map(|e: &Entry| -> CompactString { e.name.clone() });
        let mut meta = self.watch.lock();
        meta.last_seen_file = file;
        meta.last_seen_top = self.top;
    }

    // --------------------------------------------------------
    // Directory history
    // --------------------------------------------------------

    /// Records the cursor file and its offset from the top for the current
    /// directory.
    pub fn remember_position(&mut self) {
        if self.custom.is_some() {
            return;
        }
        let Some(entry) = self.current() else {
            return;
        };

        let record = HistoryEntry {
            dir: self.cwd.to_path_buf(),
            file: entry.name.clone(),
            rel_pos: self.cursor.saturating_sub(self.top),
            timestamp: Utc::now(),
        };

        self.history.retain(|h: &HistoryEntry| -> bool { h.dir != record.dir });
        self.history.push(record);
        if self.history.len() > HISTORY_LIMIT {
            let excess: usize = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Puts the cursor back where it was the last time the current
    /// directory was left.
    pub fn restore_position(&mut self) -> bool {
        let Some(record) = self
            .history
            .iter()
            .rev()
            .find(|h: &&HistoryEntry| -> bool { h.dir.as_path() == &*self.cwd })
            .cloned()
        else {
            return false;
        };

        let Some(idx) = self.store.find(&record.file, &self.cwd) else {
            return false;
        };

        self.cursor = idx;
        self.top = idx.saturating_sub(record.rel_pos);
        self.adjust_scroll();
        true
    }

    pub fn set_history(&mut self, history: Vec<HistoryEntry>) {
        self.history = history;
    }
}

/// Re-stats every entry of a custom list. Vanished entries are dropped
/// along with their subtrees; fake rows and `..` are kept as they are.
pub fn refresh_entries(entries: &[Entry], cancel: &CancelFlag) -> FlistResult<Vec<Entry>> {
    let mut fresh: Vec<Entry> = copy_entries(entries)?;
    let mut keep: Vec<bool> = vec![true; fresh.len()];

    for (i, entry) in fresh.iter_mut().enumerate() {
        cancel.check()?;
        if entry.is_fake || entry.is_parent_ref() {
            continue;
        }

        match Entry::from_path(&entry.path(), entry.origin.clone()) {
            Ok(mut updated) => {
                updated.child_count = entry.child_count;
                updated.child_pos = entry.child_pos;
                updated.folded = entry.folded;
                updated.id = entry.id;
                updated.selected = entry.selected;
                updated.marked = entry.marked;
                *entry = updated;
            }
            Err(_) => keep[i] = false,
        }
    }

    let removed: usize = compact(&mut fresh, &keep);
    if removed > 0 {
        debug!(
            marker = "CUSTOM_LIST_REFRESHED",
            operation_type = "refresh_entries",
            removed,
            "Vanished entries dropped from custom list"
        );
    }
    Ok(fresh)
}
