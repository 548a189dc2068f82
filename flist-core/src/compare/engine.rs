//! ``src/compare/engine.rs``
//! ============================================================================
//! # Compare Engine
//!
//! Groups files by name, size or contents and turns one or two panes into
//! comparison views. Every file gets the id of its group; ids are handed
//! out densely from 1 in first-seen order, current pane first.
//!
//! * single pane: one `Compare` list ordered by id
//! * two panes: two `Diff` lists with equal row counts; a row pairs two
//!   files of the same group or a file with a fake placeholder carrying the
//!   group id, standing where the missing file would be

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::CompareConfig;
use crate::error::{FlistError, FlistResult};
use crate::fs::entry::{Entry, Origin};
use crate::fs::scanner::CancelFlag;
use crate::model::entry_store::compact;
use crate::model::view::{CustomKind, CustomView, View};

use super::align::{Row, align};
use super::hashing::{Digest, hash_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareType {
    Name,
    Size,
    Contents,
}

impl CompareType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Contents => "contents",
        }
    }
}

/// Which groups end up in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    All,
    /// Single pane: groups with more than one file. Two panes: groups
    /// present on both sides.
    Dups,
    /// Single pane: groups of one file. Two panes: groups present on one
    /// side only.
    Unique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub ctype: CompareType,
    pub listing: ListingMode,
    /// Files only group with files in the same relative directory.
    pub group_paths: bool,
    pub skip_empty: bool,
    /// Name comparison ignores case.
    pub ignore_case: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::from(&CompareConfig::default())
    }
}

impl From<&CompareConfig> for CompareOptions {
    fn from(config: &CompareConfig) -> Self {
        Self {
            ctype: config.compare_type,
            listing: config.listing,
            group_paths: config.group_paths,
            skip_empty: config.skip_empty,
            ignore_case: config.ignore_case,
        }
    }
}

/// Soft result of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    Entered { rows: usize },
    /// Nothing to show; panes were left as they were.
    Empty,
}

// ------------------------------------------------------------
// Collecting files
// ------------------------------------------------------------

#[derive(Debug, Clone)]
struct Item {
    entry: Entry,
    /// Path relative to the side's root.
    rel: PathBuf,
}

impl Item {
    fn rel_dir(&self) -> PathBuf {
        self.rel.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// Regular files under `root`, symlinks not followed.
fn walk_files(root: &Path, cancel: &CancelFlag) -> FlistResult<Vec<Entry>> {
    let mut files: Vec<Entry> = Vec::new();

    for item in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        cancel.check()?;

        let item: DirEntry = match item {
            Ok(item) => item,
            Err(e) if e.depth() == 0 => return Err(FlistError::tree_walk(root, e.to_string())),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping unreadable path");
                continue;
            }
        };
        if !item.file_type().is_file() {
            continue;
        }

        let (Some(name), Ok(meta)) = (item.file_name().to_str(), item.metadata()) else {
            continue;
        };
        let parent: PathBuf = item.path().parent().unwrap_or(root).to_path_buf();
        files.push(Entry::from_metadata(name, Origin::Owned(parent), &meta));
    }

    Ok(files)
}

/// Files a pane contributes, ordered by relative path. Custom panes offer
/// their visible files; plain panes their whole directory tree.
fn collect(view: &View, opts: &CompareOptions, cancel: &CancelFlag) -> FlistResult<(PathBuf, Vec<Item>)> {
    let (root, entries): (PathBuf, Vec<Entry>) = match view.custom() {
        Some(custom) => (
            custom.root.clone(),
            view.entries()
                .iter()
                .filter(|e: &&Entry| -> bool { !e.is_fake && !e.is_dir() && !e.is_parent_ref() })
                .cloned()
                .collect(),
        ),
        None => (view.cwd().to_path_buf(), walk_files(view.cwd(), cancel)?),
    };

    let mut items: Vec<Item> = entries
        .into_iter()
        .filter(|e: &Entry| -> bool { !(opts.skip_empty && e.size == 0) })
        .map(|mut entry: Entry| -> Item {
            entry.child_count = 0;
            entry.child_pos = 0;
            entry.selected = false;
            entry.marked = false;
            entry.match_span = None;

            let path: PathBuf = entry.path();
            let rel: PathBuf = path
                .strip_prefix(&root)
                .map_or_else(|_| PathBuf::from(entry.name.as_str()), Path::to_path_buf);
            Item { entry, rel }
        })
        .collect();

    items.sort_by(|a: &Item, b: &Item| a.rel.cmp(&b.rel));
    Ok((root, items))
}

// ------------------------------------------------------------
// Grouping
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Fingerprint {
    Name(CompactString),
    Size(u64),
    /// Digest is only computed when another file has the same size.
    Contents(u64, Option<Digest>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    dir: Option<PathBuf>,
    print: Fingerprint,
}

/// Assigns group ids over all sides, in order. Files that cannot be read
/// for hashing are dropped.
fn group(sides: &mut [Vec<Item>], opts: &CompareOptions, cancel: &CancelFlag) -> FlistResult<()> {
    let mut sizes: HashMap<u64, usize, RandomState> = HashMap::default();
    if opts.ctype == CompareType::Contents {
        for item in sides.iter().flatten() {
            *sizes.entry(item.entry.size).or_default() += 1;
        }
    }

    let mut ids: HashMap<GroupKey, u32, RandomState> = HashMap::default();
    let mut next: u32 = 1;

    for side in sides.iter_mut() {
        let mut kept: Vec<Item> = Vec::with_capacity(side.len());

        for mut item in side.drain(..) {
            cancel.check()?;

            let print: Fingerprint = match opts.ctype {
                CompareType::Name if opts.ignore_case => {
                    Fingerprint::Name(CompactString::new(item.entry.name.to_lowercase()))
                }
                CompareType::Name => Fingerprint::Name(item.entry.name.clone()),
                CompareType::Size => Fingerprint::Size(item.entry.size),
                CompareType::Contents => {
                    let size: u64 = item.entry.size;
                    if sizes.get(&size).copied().unwrap_or(0) > 1 {
                        match hash_file(&item.entry.path()) {
                            Ok(digest) => Fingerprint::Contents(size, Some(digest)),
                            Err(e) => {
                                debug!(path = %item.entry.path().display(), error = %e, "Skipping unreadable file");
                                continue;
                            }
                        }
                    } else {
                        Fingerprint::Contents(size, None)
                    }
                }
            };

            let key = GroupKey {
                dir: opts.group_paths.then(|| item.rel_dir()),
                print,
            };
            item.entry.id = *ids.entry(key).or_insert_with(|| {
                next += 1;
                next - 1
            });
            kept.push(item);
        }

        *side = kept;
    }

    Ok(())
}

/// Drops groups the listing mode excludes, then renumbers the remaining
/// ids densely in first-seen order.
fn apply_listing(sides: &mut [Vec<Item>], listing: ListingMode) {
    // per id: (files, sides holding it)
    let mut stats: HashMap<u32, (usize, usize), RandomState> = HashMap::default();
    for side in sides.iter() {
        let mut seen: HashMap<u32, (), RandomState> = HashMap::default();
        for item in side {
            let stat = stats.entry(item.entry.id).or_default();
            stat.0 += 1;
            if seen.insert(item.entry.id, ()).is_none() {
                stat.1 += 1;
            }
        }
    }

    let two_sides: bool = sides.len() > 1;
    let wanted = |id: u32| -> bool {
        let (files, holders): (usize, usize) = stats.get(&id).copied().unwrap_or_default();
        match (listing, two_sides) {
            (ListingMode::All, _) => true,
            (ListingMode::Dups, false) => files > 1,
            (ListingMode::Unique, false) => files == 1,
            (ListingMode::Dups, true) => holders > 1,
            (ListingMode::Unique, true) => holders == 1,
        }
    };

    let mut dense: HashMap<u32, u32, RandomState> = HashMap::default();
    for side in sides.iter_mut() {
        side.retain(|item: &Item| -> bool { wanted(item.entry.id) });
        for item in side.iter_mut() {
            let next: u32 = u32::try_from(dense.len() + 1).unwrap_or(u32::MAX);
            item.entry.id = *dense.entry(item.entry.id).or_insert(next);
        }
    }
}

/// Placeholder standing where `counterpart` would be under `root`.
fn fake_for(root: &Path, counterpart: &Item) -> Entry {
    Entry::fake(Origin::Owned(root.join(counterpart.rel_dir())), counterpart.entry.id)
}

fn title(opts: &CompareOptions) -> String {
    format!("compare by {}", opts.ctype.name())
}

// ------------------------------------------------------------
// Entering comparison
// ------------------------------------------------------------

/// Compares the files of one pane with each other.
pub fn compare_single(view: &mut View, opts: &CompareOptions, cancel: &CancelFlag) -> FlistResult<CompareOutcome> {
    let start_time: Instant = Instant::now();
    let (root, items) = collect(view, opts, cancel)?;

    let mut sides: [Vec<Item>; 1] = [items];
    group(&mut sides, opts, cancel)?;
    apply_listing(&mut sides, opts.listing);

    let [mut items] = sides;
    if items.is_empty() {
        info!(marker = "COMPARE_EMPTY", operation_type = "compare_single", "Comparison found nothing to show");
        return Ok(CompareOutcome::Empty);
    }

    items.sort_by(|a: &Item, b: &Item| a.entry.id.cmp(&b.entry.id).then_with(|| a.rel.cmp(&b.rel)));
    let rows: Vec<Entry> = items.into_iter().map(|item: Item| -> Entry { item.entry }).collect();
    let count: usize = rows.len();

    view.install_custom(CustomView::new(CustomKind::Compare, title(opts), root), rows)?;

    info!(
        marker = "COMPARE_COMPLETED",
        operation_type = "compare_single",
        compare_type = opts.ctype.name(),
        rows = count,
        duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
        "Single pane comparison built"
    );
    Ok(CompareOutcome::Entered { rows: count })
}

/// Compares the files of `current` with those of `other` and turns both
/// into aligned diff views.
pub fn compare_panes(
    current: &mut View,
    other: &mut View,
    opts: &CompareOptions,
    cancel: &CancelFlag,
) -> FlistResult<CompareOutcome> {
    let start_time: Instant = Instant::now();
    let (cur_root, cur_items) = collect(current, opts, cancel)?;
    let (other_root, other_items) = collect(other, opts, cancel)?;

    let mut sides: [Vec<Item>; 2] = [cur_items, other_items];
    group(&mut sides, opts, cancel)?;
    apply_listing(&mut sides, opts.listing);

    let [cur_items, other_items] = sides;
    if cur_items.is_empty() && other_items.is_empty() {
        info!(marker = "COMPARE_EMPTY", operation_type = "compare_panes", "Comparison found nothing to show");
        return Ok(CompareOutcome::Empty);
    }

    let cur_ids: Vec<u32> = cur_items.iter().map(|item: &Item| -> u32 { item.entry.id }).collect();
    let other_ids: Vec<u32> = other_items.iter().map(|item: &Item| -> u32 { item.entry.id }).collect();
    let rows: Vec<Row> = align(&cur_ids, &other_ids)?;

    let mut cur_rows: Vec<Entry> = Vec::with_capacity(rows.len());
    let mut other_rows: Vec<Entry> = Vec::with_capacity(rows.len());
    for row in &rows {
        match *row {
            (Some(c), Some(o)) => {
                cur_rows.push(cur_items[c].entry.clone());
                other_rows.push(other_items[o].entry.clone());
            }
            (Some(c), None) => {
                cur_rows.push(cur_items[c].entry.clone());
                other_rows.push(fake_for(&other_root, &cur_items[c]));
            }
            (None, Some(o)) => {
                cur_rows.push(fake_for(&cur_root, &other_items[o]));
                other_rows.push(other_items[o].entry.clone());
            }
            (None, None) => {}
        }
    }

    let count: usize = cur_rows.len();
    current.install_custom(CustomView::new(CustomKind::Diff, title(opts), cur_root), cur_rows)?;
    other.install_custom(CustomView::new(CustomKind::Diff, title(opts), other_root), other_rows)?;

    info!(
        marker = "COMPARE_COMPLETED",
        operation_type = "compare_panes",
        compare_type = opts.ctype.name(),
        rows = count,
        duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
        "Two pane comparison built"
    );
    Ok(CompareOutcome::Entered { rows: count })
}

// ------------------------------------------------------------
// Maintaining comparison views
// ------------------------------------------------------------

/// Re-stats `entry`; `None` when the file is gone. Fakes stay as they are.
fn restat(entry: &Entry) -> Option<Entry> {
    if entry.is_fake {
        return Some(entry.clone());
    }

    Entry::from_path(&entry.path(), entry.origin.clone())
        .ok()
        .map(|mut fresh: Entry| -> Entry {
            fresh.id = entry.id;
            fresh.selected = entry.selected;
            fresh
        })
}

/// Refreshes a pair of diff views. Rows whose files are both gone (or a
/// gone file paired with a fake) are dropped; a gone file paired with a
/// real one becomes a fake. When nothing remains both panes go back to
/// their directories.
pub fn reload_compare(current: &mut View, other: &mut View, cancel: &CancelFlag) -> FlistResult<CompareOutcome> {
    let both_diff: bool = current.custom_kind() == Some(CustomKind::Diff) && other.custom_kind() == Some(CustomKind::Diff);
    if !both_diff {
        return Err(FlistError::invalid_input("pane", "not a two pane comparison"));
    }

    let rows: usize = current.full.len().min(other.full.len());
    let mut cur_rows: Vec<Entry> = Vec::with_capacity(rows);
    let mut other_rows: Vec<Entry> = Vec::with_capacity(rows);

    for i in 0..rows {
        cancel.check()?;
        let (old_cur, old_other): (&Entry, &Entry) = (&current.full[i], &other.full[i]);

        match (restat(old_cur), restat(old_other)) {
            (Some(c), Some(o)) if c.is_fake && o.is_fake => {}
            (Some(c), Some(o)) => {
                cur_rows.push(c);
                other_rows.push(o);
            }
            (Some(c), None) if !c.is_fake => {
                other_rows.push(Entry::fake(old_other.origin.clone(), old_other.id));
                cur_rows.push(c);
            }
            (None, Some(o)) if !o.is_fake => {
                cur_rows.push(Entry::fake(old_cur.origin.clone(), old_cur.id));
                other_rows.push(o);
            }
            _ => {}
        }
    }

    if cur_rows.is_empty() {
        leave_compare(current, other, cancel)?;
        return Ok(CompareOutcome::Empty);
    }

    let count: usize = cur_rows.len();
    current.full = cur_rows;
    other.full = other_rows;
    current.repopulate()?;
    other.repopulate()?;

    debug!(
        marker = "COMPARE_RELOADED",
        operation_type = "reload_compare",
        rows = count,
        dropped = rows - count,
        "Diff views refreshed"
    );
    Ok(CompareOutcome::Entered { rows: count })
}

/// Single-pane flavour of [`reload_compare`].
pub fn reload_compare_single(view: &mut View, cancel: &CancelFlag) -> FlistResult<CompareOutcome> {
    let mut rows: Vec<Entry> = Vec::with_capacity(view.full.len());
    for entry in &view.full {
        cancel.check()?;
        if let Some(fresh) = restat(entry) {
            rows.push(fresh);
        }
    }

    if rows.is_empty() {
        view.leave_custom(cancel)?;
        return Ok(CompareOutcome::Empty);
    }

    let count: usize = rows.len();
    view.full = rows;
    view.repopulate()?;
    Ok(CompareOutcome::Entered { rows: count })
}

/// Takes both panes out of comparison mode.
pub fn leave_compare(current: &mut View, other: &mut View, cancel: &CancelFlag) -> FlistResult<()> {
    if current.is_compare() {
        current.leave_custom(cancel)?;
    }
    if other.is_compare() {
        other.leave_custom(cancel)?;
    }
    Ok(())
}

/// Puts `to`'s cursor on the row `from`'s cursor is on.
pub fn sync_cursor(from: &View, to: &mut View) {
    if from.custom_kind() == Some(CustomKind::Diff) && to.custom_kind() == Some(CustomKind::Diff) {
        to.cursor = from.cursor;
        to.top = from.top;
        to.ensure_cursor_valid();
    }
}

/// Replaces the fake entry on `row` with a copy of its real counterpart.
pub fn materialize_counterpart(current: &mut View, other: &mut View, row: usize) -> FlistResult<bool> {
    let both_diff: bool = current.custom_kind() == Some(CustomKind::Diff) && other.custom_kind() == Some(CustomKind::Diff);
    if !both_diff {
        return Err(FlistError::invalid_input("row", "not a two pane comparison"));
    }

    let (Some(cur), Some(oth)) = (current.entry(row), other.entry(row)) else {
        return Err(FlistError::invalid_input("row", format!("no row {row}")));
    };

    match (cur.is_fake, oth.is_fake) {
        (true, false) => copy_into(other, current, row),
        (false, true) => copy_into(current, other, row),
        _ => Ok(false),
    }
}

fn copy_into(src: &View, dst: &mut View, row: usize) -> FlistResult<bool> {
    let (Some(real), Some(fake)) = (src.entry(row), dst.entry(row)) else {
        return Ok(false);
    };

    let dir: PathBuf = fake.origin.as_path().to_path_buf();
    let target: PathBuf = dir.join(real.name.as_str());
    if fs::symlink_metadata(&target).is_ok() {
        return Err(FlistError::invalid_input(
            "target",
            format!("{} already exists", target.display()),
        ));
    }

    fs::create_dir_all(&dir).map_err(|e| FlistError::from_io(&dir, e))?;
    fs::copy(real.path(), &target).map_err(|e| FlistError::from_io(&target, e))?;

    let mut entry: Entry = Entry::from_path(&target, Origin::Owned(dir))?;
    entry.id = fake.id;

    if let Some(slot) = dst.full.get_mut(row) {
        *slot = entry.clone();
    }
    if let Some(slot) = dst.store.get_mut(row) {
        *slot = entry;
    }

    info!(
        marker = "COUNTERPART_MATERIALIZED",
        operation_type = "materialize_counterpart",
        target = %target.display(),
        "Missing file copied from the other pane"
    );
    Ok(true)
}

impl View {
    /// Next row whose group differs from the one at `idx`.
    #[must_use]
    pub fn next_group(&self, idx: usize) -> Option<usize> {
        let id: u32 = self.entry(idx)?.id;
        (idx + 1..self.len()).find(|&i: &usize| -> bool { self.entries()[i].id != id })
    }

    /// First row of the group before the one at `idx`.
    #[must_use]
    pub fn prev_group(&self, idx: usize) -> Option<usize> {
        let entries: &[Entry] = self.entries();
        let id: u32 = entries.get(idx)?.id;

        let mut i: usize = (0..idx).rev().find(|&i: &usize| -> bool { entries[i].id != id })?;
        let prev: u32 = entries[i].id;
        while i > 0 && entries[i - 1].id == prev {
            i -= 1;
        }
        Some(i)
    }

    /// Removes every row of the given groups. Returns the number of rows
    /// removed from the visible list.
    pub fn exclude_ids(&mut self, ids: &[u32]) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let keep: Vec<bool> = self.store.iter().map(|e: &Entry| -> bool { !ids.contains(&e.id) }).collect();
        let removed: usize = compact(self.store.entries_mut(), &keep);
        self.full.retain(|e: &Entry| -> bool { !ids.contains(&e.id) });
        self.ensure_cursor_valid();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::names;
    use tempfile::TempDir;

    fn dir_with(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, contents) in files {
            let path = tmp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        tmp
    }

    fn opts(ctype: CompareType, listing: ListingMode) -> CompareOptions {
        CompareOptions {
            ctype,
            listing,
            group_paths: false,
            skip_empty: false,
            ignore_case: false,
        }
    }

    fn ids(view: &View) -> Vec<u32> {
        view.entries().iter().map(|e| e.id).collect()
    }

    fn fakes(view: &View) -> Vec<bool> {
        view.entries().iter().map(|e| e.is_fake).collect()
    }

    #[test]
    fn test_two_panes_by_name() {
        let a = dir_with(&[("x", "1"), ("y", "2")]);
        let b = dir_with(&[("x", "3"), ("z", "4")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());

        let outcome = compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();
        assert_eq!(outcome, CompareOutcome::Entered { rows: 3 });

        assert_eq!(names(left.entries()), vec!["x", "y", ""]);
        assert_eq!(names(right.entries()), vec!["x", "", "z"]);
        assert_eq!(ids(&left), vec![1, 2, 3]);
        assert_eq!(ids(&right), vec![1, 2, 3]);
        assert_eq!(fakes(&left), vec![false, false, true]);
        assert_eq!(fakes(&right), vec![false, true, false]);
        assert_eq!(left.custom_kind(), Some(CustomKind::Diff));
        assert_eq!(left.entries()[2].origin.as_path(), a.path());
    }

    #[test]
    fn test_two_panes_by_contents() {
        let a = dir_with(&[("x", "same"), ("y", "yyyy")]);
        let b = dir_with(&[("x", "same"), ("z", "zzzz")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());

        let outcome =
            compare_panes(&mut left, &mut right, &opts(CompareType::Contents, ListingMode::All), &cancel).unwrap();
        assert_eq!(outcome, CompareOutcome::Entered { rows: 3 });

        assert_eq!(names(left.entries()), vec!["x", "y", ""]);
        assert_eq!(names(right.entries()), vec!["x", "", "z"]);
        assert_eq!(ids(&left), vec![1, 2, 3]);
        assert_eq!(ids(&right), vec![1, 2, 3]);
        assert_eq!(fakes(&left), vec![false, false, true]);
        assert_eq!(fakes(&right), vec![false, true, false]);
    }

    #[test]
    fn test_listing_modes_ignore_pane_order() {
        let a = dir_with(&[("p", "aa"), ("q", "bb"), ("r", "ccc")]);
        let b = dir_with(&[("p2", "aa"), ("s", "dd"), ("t", "eeee")]);
        let cancel = CancelFlag::new();

        let real_names = |view: &View| -> Vec<String> {
            let mut out: Vec<String> = view
                .entries()
                .iter()
                .filter(|e| !e.is_fake)
                .map(|e| e.name.to_string())
                .collect();
            out.sort();
            out
        };

        for (listing, in_a, in_b) in [
            (ListingMode::Unique, vec!["q", "r"], vec!["s", "t"]),
            (ListingMode::Dups, vec!["p"], vec!["p2"]),
        ] {
            let o = opts(CompareType::Contents, listing);

            let mut left = View::new(a.path());
            let mut right = View::new(b.path());
            compare_panes(&mut left, &mut right, &o, &cancel).unwrap();
            assert_eq!(real_names(&left), in_a, "{listing:?}");
            assert_eq!(real_names(&right), in_b, "{listing:?}");

            let mut left = View::new(b.path());
            let mut right = View::new(a.path());
            compare_panes(&mut left, &mut right, &o, &cancel).unwrap();
            assert_eq!(real_names(&left), in_b, "{listing:?}");
            assert_eq!(real_names(&right), in_a, "{listing:?}");
            assert_eq!(left.len(), right.len());
        }
    }

    #[test]
    fn test_single_diff_pane_refuses_exclusion() {
        let a = dir_with(&[("x", "1"), ("y", "2")]);
        let b = dir_with(&[("x", "3"), ("z", "4")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        left.set_cursor(1);
        assert!(matches!(left.exclude(), Err(FlistError::InvalidInput { .. })));
        assert!(left.hide_entries().is_err());

        assert_eq!(left.len(), right.len());
        assert_eq!(ids(&left), ids(&right));
        assert_eq!(ids(&left), vec![1, 2, 3]);
    }

    #[test]
    fn test_reload_requires_two_diff_panes() {
        let a = dir_with(&[("x", "1")]);
        let b = dir_with(&[("x", "1")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        right.leave_custom(&cancel).unwrap();
        assert!(reload_compare(&mut left, &mut right, &cancel).is_err());
        assert_eq!(left.custom_kind(), Some(CustomKind::Diff));
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_rows_are_symmetric() {
        let a = dir_with(&[("d/p", "1"), ("q", "22"), ("r", "333")]);
        let b = dir_with(&[("q", "x"), ("s", "4444"), ("d/p", "5")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        assert_eq!(left.len(), right.len());
        for (l, r) in left.entries().iter().zip(right.entries()) {
            assert_eq!(l.id, r.id);
            assert!(!(l.is_fake && r.is_fake));
        }

        let mut seen: Vec<u32> = ids(&left);
        seen.dedup();
        let max = *seen.iter().max().unwrap();
        assert_eq!(max as usize, seen.len());
    }

    #[test]
    fn test_single_pane_by_contents() {
        let a = dir_with(&[("a", "same"), ("b", "same"), ("c", "diff"), ("d", "longer")]);
        let cancel = CancelFlag::new();

        let mut view = View::new(a.path());
        compare_single(&mut view, &opts(CompareType::Contents, ListingMode::Dups), &cancel).unwrap();
        assert_eq!(names(view.entries()), vec!["a", "b"]);
        assert_eq!(ids(&view), vec![1, 1]);
        assert_eq!(view.custom_kind(), Some(CustomKind::Compare));

        let mut view = View::new(a.path());
        compare_single(&mut view, &opts(CompareType::Contents, ListingMode::Unique), &cancel).unwrap();
        assert_eq!(names(view.entries()), vec!["c", "d"]);
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_group_paths_and_ignore_case() {
        let a = dir_with(&[("one/f", "1"), ("two/f", "2"), ("F", "3")]);
        let cancel = CancelFlag::new();

        let mut o = opts(CompareType::Name, ListingMode::Dups);
        let mut view = View::new(a.path());
        compare_single(&mut view, &o, &cancel).unwrap();
        assert_eq!(view.len(), 2);

        o.group_paths = true;
        let mut view = View::new(a.path());
        assert_eq!(compare_single(&mut view, &o, &cancel).unwrap(), CompareOutcome::Empty);
        assert_eq!(view.custom_kind(), None);

        o.group_paths = false;
        o.ignore_case = true;
        let mut view = View::new(a.path());
        compare_single(&mut view, &o, &cancel).unwrap();
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn test_skip_empty_files() {
        let a = dir_with(&[("e1", ""), ("e2", ""), ("f", "x")]);
        let cancel = CancelFlag::new();
        let mut o = opts(CompareType::Size, ListingMode::All);
        o.skip_empty = true;

        let mut view = View::new(a.path());
        compare_single(&mut view, &o, &cancel).unwrap();
        assert_eq!(names(view.entries()), vec!["f"]);
    }

    #[test]
    fn test_materialize_counterpart() {
        let a = dir_with(&[("x", "1"), ("y", "2")]);
        let b = dir_with(&[("x", "1")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        assert!(materialize_counterpart(&mut left, &mut right, 1).unwrap());
        assert_eq!(fs::read_to_string(b.path().join("y")).unwrap(), "2");
        assert!(!right.entries()[1].is_fake);
        assert_eq!(right.entries()[1].id, left.entries()[1].id);

        assert!(!materialize_counterpart(&mut left, &mut right, 0).unwrap());
    }

    #[test]
    fn test_reload_replaces_vanished_with_fake() {
        let a = dir_with(&[("x", "1"), ("y", "2")]);
        let b = dir_with(&[("x", "1")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        fs::remove_file(a.path().join("x")).unwrap();
        fs::remove_file(a.path().join("y")).unwrap();
        let outcome = reload_compare(&mut left, &mut right, &cancel).unwrap();
        assert_eq!(outcome, CompareOutcome::Entered { rows: 1 });
        assert_eq!(fakes(&left), vec![true]);
        assert_eq!(names(right.entries()), vec!["x"]);

        fs::remove_file(b.path().join("x")).unwrap();
        assert_eq!(reload_compare(&mut left, &mut right, &cancel).unwrap(), CompareOutcome::Empty);
        assert!(!left.is_compare());
        assert!(!right.is_compare());
    }

    #[test]
    fn test_group_navigation_and_exclusion() {
        let a = dir_with(&[("a", "1"), ("b", "1"), ("c", "22"), ("d", "22"), ("e", "333")]);
        let cancel = CancelFlag::new();
        let mut view = View::new(a.path());
        compare_single(&mut view, &opts(CompareType::Size, ListingMode::All), &cancel).unwrap();
        assert_eq!(ids(&view), vec![1, 1, 2, 2, 3]);

        assert_eq!(view.next_group(0), Some(2));
        assert_eq!(view.next_group(4), None);
        assert_eq!(view.prev_group(4), Some(2));
        assert_eq!(view.prev_group(1), None);

        view.set_cursor(2);
        view.exclude().unwrap();
        assert_eq!(names(view.entries()), vec!["a", "b", "e"]);
        assert_eq!(view.full().len(), 3);
    }

    #[test]
    fn test_sync_cursor_between_diff_views() {
        let a = dir_with(&[("x", "1"), ("y", "2")]);
        let b = dir_with(&[("x", "1")]);
        let cancel = CancelFlag::new();
        let mut left = View::new(a.path());
        let mut right = View::new(b.path());
        compare_panes(&mut left, &mut right, &opts(CompareType::Name, ListingMode::All), &cancel).unwrap();

        left.set_cursor(1);
        sync_cursor(&left, &mut right);
        assert_eq!(right.cursor(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut view = View::new(tmp.path().join("gone"));
        let err = compare_single(&mut view, &CompareOptions::default(), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, FlistError::TreeWalk { .. }));
    }
}
