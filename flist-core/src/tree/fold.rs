//! `src/tree/fold.rs`
//!
//! Folding, lazy expansion and exclusion for tree views. Folded and
//! excluded paths live in the view's path tries so a reload rebuilds the
//! same shape; `full` keeps the children of folded nodes around, and only
//! nodes that were never walked (depth limit, folded at reload) are walked
//! again on unfold.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{FlistError, FlistResult};
use crate::filter::engine::filter_entries;
use crate::filter::local::narrow;
use crate::fs::entry::{Entry, EntryKey};
use crate::fs::path_trie::PathTrie;
use crate::fs::scanner::CancelFlag;
use crate::model::entry_store::{compact, copy_entries, insert_subtree, relink, take_subtree};
use crate::model::view::{CustomKind, View};
use crate::sort::engine::sort_forest;
use crate::tree::builder::build_tree;

/// Marks directories folded by flag or by `folded` and drops their
/// descendants. Returns the number of removed entries.
pub fn collapse_folded(entries: &mut Vec<Entry>, folded: &PathTrie) -> usize {
    let mut keep: Vec<bool> = vec![true; entries.len()];
    let mut i: usize = 0;

    while i < entries.len() {
        let entry: &mut Entry = &mut entries[i];
        let count: usize = entry.child_count;

        if entry.is_dir() && (entry.folded || (!folded.is_empty() && folded.contains(&entry.path()))) {
            entry.folded = true;
            keep[i + 1..=i + count].fill(false);
            i += count + 1;
        } else {
            i += 1;
        }
    }

    if keep.iter().all(|&k: &bool| -> bool { k }) {
        return 0;
    }
    compact(entries, &keep)
}

/// Drops entries whose path is in `excluded`, with their subtrees.
pub fn drop_excluded(entries: &mut Vec<Entry>, excluded: &PathTrie) -> usize {
    let keep: Vec<bool> = entries
        .iter()
        .map(|e: &Entry| -> bool { e.is_fake || !excluded.contains(&e.path()) })
        .collect();

    if keep.iter().all(|&k: &bool| -> bool { k }) {
        return 0;
    }
    compact(entries, &keep)
}

/// Drops directories without children, repeating so that parents emptied
/// this way go as well. Folded directories and fakes stay.
pub fn drop_empty_dirs(entries: &mut Vec<Entry>) -> usize {
    let mut removed: usize = 0;
    loop {
        let keep: Vec<bool> = entries
            .iter()
            .map(|e: &Entry| -> bool {
                !(e.is_dir() && e.child_count == 0 && !e.folded && !e.is_fake && !e.is_parent_ref())
            })
            .collect();

        if keep.iter().all(|&k: &bool| -> bool { k }) {
            return removed;
        }
        removed += compact(entries, &keep);
    }
}

fn position_of(entries: &[Entry], key: &EntryKey) -> Option<usize> {
    entries.iter().position(|e: &Entry| -> bool { key.matches(e) })
}

impl View {
    /// Folds the directory at `idx`. Childless directories are left alone.
    pub fn fold(&mut self, idx: usize) -> bool {
        if !self.is_tree() {
            return false;
        }
        let Some(entry) = self.store.get(idx) else {
            return false;
        };
        if !entry.is_dir() || entry.child_count == 0 {
            return false;
        }

        let path: PathBuf = entry.path();
        let key: EntryKey = entry.key();
        let removed: usize = take_subtree(self.store.entries_mut(), idx).len();
        self.store.as_mut_slice()[idx].folded = true;

        if let Some(unfiltered) = self.local.unfiltered.as_mut()
            && let Some(at) = position_of(unfiltered, &key)
        {
            take_subtree(unfiltered, at);
            unfiltered[at].folded = true;
        }
        if let Some(custom) = self.custom.as_mut() {
            custom.folded.insert(&path);
        }

        if self.cursor > idx + removed {
            self.cursor -= removed;
        } else if self.cursor > idx {
            self.cursor = idx;
        }
        self.ensure_cursor_valid();

        debug!(
            marker = "TREE_FOLD",
            operation_type = "fold",
            path = %path.display(),
            hidden = removed,
            "Directory folded"
        );
        true
    }

    /// Unfolds the directory at `idx`. Children come from the retained
    /// source list, or from a fresh walk in file-system trees.
    pub fn unfold(&mut self, idx: usize, cancel: &CancelFlag) -> FlistResult<bool> {
        if !self.is_tree() {
            return Ok(false);
        }
        let Some(entry) = self.store.get(idx) else {
            return Ok(false);
        };
        if !entry.is_dir() || !entry.folded {
            return Ok(false);
        }

        let path: PathBuf = entry.path();
        let key: EntryKey = entry.key();
        let source: Option<usize> = position_of(&self.full, &key);

        let mut children: Vec<Entry> = match source {
            Some(at) if self.full[at].child_count > 0 => {
                let count: usize = self.full[at].child_count;
                let mut kept: Vec<Entry> = copy_entries(&self.full[at + 1..=at + count])?;
                relink(&mut kept);
                kept
            }
            Some(at) if self.custom_kind() == Some(CustomKind::Tree) => {
                let Some(custom) = self.custom.as_mut() else {
                    return Ok(false);
                };
                custom.folded.remove(&path);
                let walked: Vec<Entry> = build_tree(&path, custom.tree_depth, &custom.folded, &custom.excluded, cancel)?;
                insert_subtree(&mut self.full, at, copy_entries(&walked)?);
                walked
            }
            _ => Vec::new(),
        };

        if let Some(at) = source {
            self.full[at].folded = false;
        }
        if let Some(custom) = self.custom.as_mut() {
            custom.folded.remove(&path);
        }

        filter_entries(&mut children, &self.filters, None, true);
        if let Some(custom) = &self.custom {
            drop_excluded(&mut children, &custom.excluded);
            collapse_folded(&mut children, &custom.folded);
        }
        if !self.show_empty_dirs {
            drop_empty_dirs(&mut children);
        }
        let mut children: Vec<Entry> = sort_forest(children, &self.sort_context());
        relink(&mut children);

        if let Some(unfiltered) = self.local.unfiltered.as_mut()
            && let Some(at) = position_of(unfiltered, &key)
        {
            unfiltered[at].folded = false;
            insert_subtree(unfiltered, at, copy_entries(&children)?);
        }
        if let Some(matcher) = self.local.matcher.as_ref() {
            narrow(&mut children, matcher, true);
        }

        let added: usize = children.len();
        self.store.as_mut_slice()[idx].folded = false;
        insert_subtree(self.store.entries_mut(), idx, children);
        if self.cursor > idx {
            self.cursor += added;
        }
        self.ensure_cursor_valid();

        debug!(
            marker = "TREE_UNFOLD",
            operation_type = "unfold",
            path = %path.display(),
            shown = added,
            "Directory unfolded"
        );
        Ok(true)
    }

    pub fn toggle_fold(&mut self, idx: usize, cancel: &CancelFlag) -> FlistResult<bool> {
        match self.store.get(idx) {
            Some(entry) if entry.folded => self.unfold(idx, cancel),
            Some(_) => Ok(self.fold(idx)),
            None => Ok(false),
        }
    }

    /// Removes the selection (or the cursor entry) from a custom view and
    /// remembers the paths so reloads keep them out. Plain listings hide
    /// the names through the auto filter instead. Diff panes are refused:
    /// their rows pair with the other pane, see `FSState::exclude`.
    pub fn exclude(&mut self) -> FlistResult<usize> {
        if self.custom.is_none() {
            return self.hide_entries();
        }
        if self.custom_kind() == Some(CustomKind::Diff) {
            return Err(FlistError::invalid_input(
                "exclude",
                "diff rows are excluded from both panes at once",
            ));
        }

        let targets: Vec<usize> = self.target_indices();
        if self.is_compare() {
            let ids: Vec<u32> = targets
                .iter()
                .filter_map(|&i: &usize| -> Option<u32> { self.entry(i).map(|e: &Entry| -> u32 { e.id }) })
                .collect();
            return Ok(self.exclude_ids(&ids));
        }

        let mut paths: Vec<PathBuf> = Vec::with_capacity(targets.len());
        for idx in targets {
            if let Some(entry) = self.store.get_mut(idx)
                && !entry.is_fake
                && !entry.is_parent_ref()
            {
                entry.temporary = true;
                paths.push(entry.path());
            }
        }

        if let Some(custom) = self.custom.as_mut() {
            for path in &paths {
                custom.excluded.insert(path);
            }
        }

        let removed: usize = self.store.remove_temporary();
        if let Some(custom) = &self.custom {
            drop_excluded(&mut self.full, &custom.excluded);
            if let Some(unfiltered) = self.local.unfiltered.as_mut() {
                drop_excluded(unfiltered, &custom.excluded);
            }
        }
        self.ensure_cursor_valid();

        debug!(
            marker = "ENTRIES_EXCLUDED",
            operation_type = "exclude",
            paths = paths.len(),
            removed,
            "Entries excluded from custom view"
        );
        Ok(removed)
    }
}
