//! ``src/model/entry_store.rs``
//! ============================================================================
//! # `EntryStore`: Flat Entry Array with Tree Invariants
//!
//! The array is a pre-order flattening of a forest. For the entry at `i`
//! with `child_count = c`, indices `i+1 ..= i+c` are exactly its
//! descendants, and every descendant `j` satisfies
//! `j - child_pos(j) == parent(j)`.
//!
//! `child_count` is the source of truth for shape. `relink` derives
//! `child_pos` from it, `compact` removes nodes and fixes ancestors, and
//! `insert_subtree` splices a forest under a node. Every structural
//! mutation in the crate funnels through these functions.

use std::path::{Path, PathBuf};

use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashSet;
use tracing::warn;

use crate::error::{FlistError, FlistResult};
use crate::fs::entry::{Entry, EntryKey, Origin};

// ------------------------------------------------------------
// Tree invariant helpers (pure)
// ------------------------------------------------------------

/// Where the tree invariant is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeViolation {
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for TreeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {}: {}", self.index, self.reason)
    }
}

/// Parent of every entry, derived from `child_count`.
#[must_use]
pub fn parent_indices(entries: &[Entry]) -> Vec<Option<usize>> {
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(entries.len());
    // (index, last descendant index)
    let mut open: Vec<(usize, usize)> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        while open.last().is_some_and(|&(_, end): &(usize, usize)| -> bool { end < i }) {
            open.pop();
        }
        parents.push(open.last().map(|&(idx, _): &(usize, usize)| -> usize { idx }));
        if entry.child_count > 0 {
            open.push((i, i + entry.child_count));
        }
    }

    parents
}

/// Recomputes every `child_pos` from `child_count`.
pub fn relink(entries: &mut [Entry]) {
    let parents: Vec<Option<usize>> = parent_indices(entries);
    for (i, parent) in parents.into_iter().enumerate() {
        entries[i].child_pos = parent.map_or(0, |p: usize| -> usize { i - p });
    }
}

/// Removes every entry whose `keep` flag is false together with its
/// descendants, then fixes `child_count` of surviving ancestors and
/// `child_pos` of everything. Returns the number of removed entries.
pub fn compact(entries: &mut Vec<Entry>, keep: &[bool]) -> usize {
    debug_assert_eq!(entries.len(), keep.len());

    let parents: Vec<Option<usize>> = parent_indices(entries);

    // A node survives only when all its ancestors survive.
    let mut alive: Vec<bool> = keep.to_vec();
    for i in 0..entries.len() {
        if let Some(p) = parents[i]
            && !alive[p]
        {
            alive[i] = false;
        }
    }

    // New descendant counts, accumulated bottom-up over survivors.
    let mut counts: Vec<usize> = vec![0; entries.len()];
    for i in (0..entries.len()).rev() {
        if !alive[i] {
            continue;
        }
        if let Some(p) = parents[i] {
            counts[p] += 1 + counts[i];
        }
    }

    let before: usize = entries.len();
    let old: Vec<Entry> = std::mem::take(entries);
    entries.reserve(before);
    for (i, mut entry) in old.into_iter().enumerate() {
        if alive[i] {
            entry.child_count = counts[i];
            entries.push(entry);
        }
    }

    relink(entries);
    before - entries.len()
}

/// Splices `children` (a forest with valid `child_count`s) right after the
/// existing descendants of `parent`, updating all ancestors.
pub fn insert_subtree(entries: &mut Vec<Entry>, parent: usize, children: Vec<Entry>) {
    if children.is_empty() {
        return;
    }

    let added: usize = children.len();
    let at: usize = parent + entries[parent].child_count + 1;
    let parents: Vec<Option<usize>> = parent_indices(entries);

    let mut node: Option<usize> = Some(parent);
    while let Some(idx) = node {
        entries[idx].child_count += added;
        node = parents[idx];
    }

    entries.splice(at..at, children);
    relink(entries);
}

/// Removes the descendants of `parent`, returning them as a forest.
pub fn take_subtree(entries: &mut Vec<Entry>, parent: usize) -> Vec<Entry> {
    let count: usize = entries[parent].child_count;
    if count == 0 {
        return Vec::new();
    }

    let parents: Vec<Option<usize>> = parent_indices(entries);
    let mut node: Option<usize> = Some(parent);
    while let Some(idx) = node {
        entries[idx].child_count -= count;
        node = parents[idx];
    }

    let mut removed: Vec<Entry> = entries.drain(parent + 1..=parent + count).collect();
    relink(&mut removed);
    relink(entries);
    removed
}

/// Checks the pre-order invariant for the whole array.
pub fn validate_tree(entries: &[Entry]) -> Result<(), TreeViolation> {
    let mut open: Vec<(usize, usize)> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        while open.last().is_some_and(|&(_, end): &(usize, usize)| -> bool { end < i }) {
            open.pop();
        }

        let end: usize = i + entry.child_count;
        if end >= entries.len() && entry.child_count > 0 {
            return Err(TreeViolation {
                index: i,
                reason: format!("child_count {} runs past the end", entry.child_count),
            });
        }
        if let Some(&(_, parent_end)) = open.last()
            && end > parent_end
        {
            return Err(TreeViolation {
                index: i,
                reason: "subtree overlaps its parent's span".to_string(),
            });
        }

        let expected: usize = open.last().map_or(0, |&(p, _): &(usize, usize)| -> usize { i - p });
        if entry.child_pos != expected {
            return Err(TreeViolation {
                index: i,
                reason: format!("child_pos {} but parent offset is {}", entry.child_pos, expected),
            });
        }

        if entry.child_count > 0 {
            open.push((i, end));
        }
    }

    Ok(())
}

/// Whether the array carries any nesting.
#[must_use]
pub fn is_nested(entries: &[Entry]) -> bool {
    entries.iter().any(|e: &Entry| -> bool { e.child_count > 0 })
}

// ------------------------------------------------------------
// EntryStore
// ------------------------------------------------------------

/// Owner of one pane's entry array.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    inconsistent: bool,
}

impl EntryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            inconsistent: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Entry> {
        self.entries.get(idx)
    }

    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Entry> {
        self.entries.get_mut(idx)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Entry] {
        &self.entries
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Direct access for structural algorithms (sort, fold, compact).
    #[inline]
    pub fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Appends one entry, reporting allocation failure instead of aborting.
    pub fn append(&mut self, entry: Entry) -> FlistResult<()> {
        self.entries
            .try_reserve(1)
            .map_err(|_| FlistError::AllocationFailure {
                requested: self.entries.len() + 1,
            })?;
        self.entries.push(entry);
        Ok(())
    }

    /// Full copy of the array, or an error with the array left untouched.
    pub fn snapshot(&self) -> FlistResult<Vec<Entry>> {
        copy_entries(&self.entries)
    }

    /// Swaps in `new_entries`. The entry at `preserve` (in the old array) is
    /// kept alive across the swap and returned so the caller can re-anchor
    /// the cursor on its name.
    pub fn replace(&mut self, new_entries: Vec<Entry>, preserve: Option<usize>) -> Option<Entry> {
        let anchor: Option<Entry> = preserve.and_then(|idx: usize| -> Option<Entry> {
            self.entries.get(idx).cloned()
        });
        self.entries = new_entries;
        self.inconsistent = false;
        anchor
    }

    pub fn take(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.entries)
    }

    #[inline]
    #[must_use]
    pub const fn has_inconsistency(&self) -> bool {
        self.inconsistent
    }

    /// Index of the entry named `name` living in `dir`.
    #[must_use]
    pub fn find(&self, name: &str, dir: &Path) -> Option<usize> {
        self.entries
            .iter()
            .position(|e: &Entry| -> bool { e.name == name && e.origin.as_path() == dir })
    }

    #[must_use]
    pub fn find_key(&self, key: &EntryKey) -> Option<usize> {
        self.entries.iter().position(|e: &Entry| -> bool { key.matches(e) })
    }

    /// Collapses duplicate (name, origin) pairs, keeping the first one, and
    /// flags the list as inconsistent. Returns the number of dropped rows.
    pub fn uniqueness_check(&mut self) -> usize {
        let mut seen: HashSet<(CompactString, PathBuf), RandomState> =
            HashSet::with_capacity_and_hasher(self.entries.len(), RandomState::new());
        let keep: Vec<bool> = self
            .entries
            .iter()
            .map(|e: &Entry| -> bool {
                e.is_fake || seen.insert((e.name.clone(), e.origin.as_path().to_path_buf()))
            })
            .collect();

        if keep.iter().all(|&k: &bool| -> bool { k }) {
            return 0;
        }

        let dropped: usize = compact(&mut self.entries, &keep);
        self.inconsistent = true;
        warn!(
            marker = "LIST_INCONSISTENT",
            operation_type = "uniqueness_check",
            dropped,
            "Duplicate entries collapsed"
        );
        dropped
    }

    /// Drops every entry flagged `temporary` (and its descendants).
    pub fn remove_temporary(&mut self) -> usize {
        let keep: Vec<bool> = self.entries.iter().map(|e: &Entry| -> bool { !e.temporary }).collect();
        compact(&mut self.entries, &keep)
    }

    /// Renames the entry at `idx`. Descendants storing an owned origin under
    /// the old path get their origin prefix rewritten.
    pub fn rename(&mut self, idx: usize, new_name: &str) -> FlistResult<usize> {
        if new_name.is_empty() || new_name.contains('/') {
            return Err(FlistError::invalid_input("name", format!("bad file name '{new_name}'")));
        }

        let entry: &mut Entry = self
            .entries
            .get_mut(idx)
            .ok_or_else(|| FlistError::invalid_input("index", format!("no entry at {idx}")))?;

        let old_path: PathBuf = entry.path();
        entry.name = CompactString::new(new_name);
        let new_path: PathBuf = entry.path();
        let count: usize = entry.child_count;

        let mut rewritten: usize = 0;
        for child in &mut self.entries[idx + 1..=idx + count] {
            if let Origin::Owned(dir) = &mut child.origin
                && let Ok(rest) = dir.strip_prefix(&old_path)
            {
                let moved: PathBuf = if rest.as_os_str().is_empty() {
                    new_path.clone()
                } else {
                    new_path.join(rest)
                };
                *dir = moved;
                rewritten += 1;
            }
        }

        Ok(rewritten)
    }
}

/// Copy-then-swap helper: allocates the whole copy up front.
pub fn copy_entries(entries: &[Entry]) -> FlistResult<Vec<Entry>> {
    let mut copy: Vec<Entry> = Vec::new();
    copy.try_reserve_exact(entries.len())
        .map_err(|_| FlistError::AllocationFailure {
            requested: entries.len(),
        })?;
    copy.extend_from_slice(entries);
    Ok(copy)
}
