//! `src/sort/engine.rs`
//! ============================================================================
//! # Multi-Pass Stable Sort
//!
//! Keys are applied one at a time from the least to the most significant,
//! each pass being a single-key sort. Before every pass each entry's `tag`
//! receives its current position and the comparator falls back to it on
//! ties, so the unstable primitive behaves stably and the final order is
//! lexicographic over all keys.
//!
//! Unless `Dir` is one of the keys an implicit directories-first pass runs
//! last. `..` always sorts first. Trees are sorted level by level keeping
//! every subtree attached to its root.

use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use compact_str::CompactString;
use regex::Regex;
use smallvec::SmallVec;
use tracing::debug;

use crate::cache::dcache::DirCache;
use crate::fs::entry::{Entry, EntryType};
use crate::model::entry_store::{is_nested, relink};
use crate::sort::groups::group_key;
use crate::sort::keys::{SignedKey, SortKey, SortKeys};
use crate::sort::strnum::{compare_names, strnumcmp};

/// Everything a comparator may consult during one sort invocation.
#[derive(Debug, Clone, Copy)]
pub struct SortContext<'a> {
    pub keys: &'a SortKeys,
    pub groups: &'a [Regex],
    pub natural: bool,
    pub dcache: Option<&'a DirCache>,
}

impl<'a> SortContext<'a> {
    #[must_use]
    pub const fn new(keys: &'a SortKeys) -> Self {
        Self {
            keys,
            groups: &[],
            natural: false,
            dcache: None,
        }
    }

    #[must_use]
    pub const fn with_groups(mut self, groups: &'a [Regex]) -> Self {
        self.groups = groups;
        self
    }

    #[must_use]
    pub const fn with_natural(mut self, natural: bool) -> Self {
        self.natural = natural;
        self
    }

    #[must_use]
    pub const fn with_dcache(mut self, dcache: Option<&'a DirCache>) -> Self {
        self.dcache = dcache;
        self
    }
}

// ------------------------------------------------------------
// Passes
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Key(SignedKey),
    /// One group regex, by index into `SortContext::groups`.
    Group { index: usize, descending: bool },
}

impl Pass {
    const fn descending(self) -> bool {
        match self {
            Self::Key(key) => key.descending,
            Self::Group { descending, .. } => descending,
        }
    }

    /// Name passes keep dot files first in either direction.
    const fn dot_first(self) -> bool {
        matches!(
            self,
            Self::Key(SignedKey {
                key: SortKey::Name | SortKey::IName,
                ..
            })
        )
    }
}

/// Passes in execution order: least significant first.
fn plan(ctx: &SortContext<'_>) -> SmallVec<[Pass; 8]> {
    let mut passes: SmallVec<[Pass; 8]> = SmallVec::new();

    for key in ctx.keys.iter().rev() {
        if key.key == SortKey::Groups {
            // The first group is the most significant one.
            for index in (0..ctx.groups.len()).rev() {
                passes.push(Pass::Group {
                    index,
                    descending: key.descending,
                });
            }
        } else {
            passes.push(Pass::Key(key));
        }
    }

    if !ctx.keys.contains(SortKey::Dir) {
        passes.push(Pass::Key(SignedKey::asc(SortKey::Dir)));
    }

    passes
}

/// Per-entry values a pass compares, computed once per pass and indexed by
/// original position.
enum PassData {
    /// Compare the entries' own fields.
    Fields,
    Lowered(Vec<CompactString>),
    Sizes(Vec<u64>),
    Items(Vec<Option<u64>>),
    Targets(Vec<Option<PathBuf>>),
    Perms(Vec<String>),
    Groups(Vec<CompactString>),
}

fn prepare(pass: Pass, entries: &[Entry], ctx: &SortContext<'_>) -> PassData {
    match pass {
        Pass::Key(key) => match key.key {
            SortKey::IName => PassData::Lowered(
                entries
                    .iter()
                    .map(|e: &Entry| -> CompactString { e.name.to_lowercase().into() })
                    .collect(),
            ),
            SortKey::Size => PassData::Sizes(
                entries
                    .iter()
                    .map(|e: &Entry| -> u64 {
                        if e.is_dir()
                            && let Some(cache) = ctx.dcache
                            && let Some(size) = cache.size(&e.path())
                        {
                            return size;
                        }
                        e.size
                    })
                    .collect(),
            ),
            SortKey::NItems => PassData::Items(
                entries
                    .iter()
                    .map(|e: &Entry| -> Option<u64> {
                        if !e.is_dir() || e.is_parent_ref() {
                            return None;
                        }
                        ctx.dcache.map(|cache: &DirCache| -> u64 { cache.nitems(&e.path()) })
                    })
                    .collect(),
            ),
            SortKey::Target => PassData::Targets(
                entries
                    .iter()
                    .map(|e: &Entry| -> Option<PathBuf> {
                        if e.kind != EntryType::Symlink {
                            return None;
                        }
                        fs::read_link(e.path()).ok()
                    })
                    .collect(),
            ),
            SortKey::Permissions => {
                PassData::Perms(entries.iter().map(Entry::permissions_string).collect())
            }
            _ => PassData::Fields,
        },
        Pass::Group { index, .. } => {
            let re: &Regex = &ctx.groups[index];
            PassData::Groups(
                entries
                    .iter()
                    .map(|e: &Entry| -> CompactString { CompactString::new(group_key(re, &e.name)) })
                    .collect(),
            )
        }
    }
}

/// Extension ordering: no extension first, then by extension text.
fn compare_ext(a: &Entry, b: &Entry) -> Ordering {
    a.extension().cmp(&b.extension())
}

fn compare_key(
    pass: Pass,
    data: &PassData,
    entries: &[Entry],
    i: usize,
    j: usize,
    ctx: &SortContext<'_>,
) -> Ordering {
    let (a, b): (&Entry, &Entry) = (&entries[i], &entries[j]);

    match (pass, data) {
        (Pass::Key(_), PassData::Lowered(names)) => compare_names(&names[i], &names[j], false, ctx.natural),
        (Pass::Key(_), PassData::Sizes(sizes)) => sizes[i].cmp(&sizes[j]),
        (Pass::Key(_), PassData::Items(items)) => items[i].cmp(&items[j]),
        (Pass::Key(_), PassData::Targets(targets)) => match (&targets[i], &targets[j]) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        },
        (Pass::Key(_), PassData::Perms(perms)) => perms[i].cmp(&perms[j]),
        (Pass::Group { .. }, PassData::Groups(keys)) => {
            if ctx.natural {
                strnumcmp(&keys[i], &keys[j])
            } else {
                keys[i].cmp(&keys[j])
            }
        }
        (Pass::Key(key), _) => match key.key {
            SortKey::Name => compare_names(&a.name, &b.name, false, ctx.natural),
            SortKey::Extension => compare_ext(a, b),
            SortKey::FileExt => match (a.is_dir(), b.is_dir()) {
                (true, true) => compare_names(&a.name, &b.name, false, ctx.natural),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare_ext(a, b),
            },
            SortKey::Dir => b.is_dir().cmp(&a.is_dir()),
            SortKey::Type => a.kind.rank().cmp(&b.kind.rank()),
            SortKey::Mtime => a.mtime.cmp(&b.mtime),
            SortKey::Atime => a.atime.cmp(&b.atime),
            SortKey::Ctime => a.ctime.cmp(&b.ctime),
            SortKey::Mode => a.mode.cmp(&b.mode),
            SortKey::Uid => a.uid.cmp(&b.uid),
            SortKey::Gid => a.gid.cmp(&b.gid),
            SortKey::Inode => a.inode.cmp(&b.inode),
            SortKey::NLinks => a.nlinks.cmp(&b.nlinks),
            // Served by precomputed data above.
            SortKey::IName
            | SortKey::Size
            | SortKey::NItems
            | SortKey::Target
            | SortKey::Permissions
            | SortKey::Groups => Ordering::Equal,
        },
        (Pass::Group { .. }, _) => Ordering::Equal,
    }
}

/// Computes the sorted order of `entries` as a permutation of their
/// indices. `tag` fields are rewritten on every pass.
pub fn sort_order(entries: &mut [Entry], ctx: &SortContext<'_>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    if entries.len() < 2 {
        return order;
    }

    for pass in plan(ctx) {
        for (pos, &orig) in order.iter().enumerate() {
            entries[orig].tag = pos;
        }

        let entries: &[Entry] = entries;
        let data: PassData = prepare(pass, entries, ctx);
        let descending: bool = pass.descending();
        let dot_first: bool = pass.dot_first();

        order.sort_unstable_by(|&i: &usize, &j: &usize| -> Ordering {
            let (a, b): (&Entry, &Entry) = (&entries[i], &entries[j]);
            match (a.is_parent_ref(), b.is_parent_ref()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }

            if dot_first {
                let dots: Ordering = b.name.starts_with('.').cmp(&a.name.starts_with('.'));
                if dots != Ordering::Equal {
                    return dots;
                }
            }

            let ord: Ordering = compare_key(pass, &data, entries, i, j, ctx);
            let ord: Ordering = if descending { ord.reverse() } else { ord };
            ord.then_with(|| a.tag.cmp(&b.tag))
        });
    }

    order
}

/// Reorders a vector by a permutation of its indices.
fn apply_order(entries: Vec<Entry>, order: &[usize]) -> Vec<Entry> {
    let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|&i: &usize| -> Option<Entry> { slots[i].take() })
        .collect()
}

/// Sorts a flat list.
pub fn sort_flat(entries: &mut Vec<Entry>, ctx: &SortContext<'_>) {
    let order: Vec<usize> = sort_order(entries, ctx);
    *entries = apply_order(std::mem::take(entries), &order);
}

/// Sorts a forest given in pre-order: top-level nodes are ordered among
/// themselves and every subtree is sorted recursively in place under its
/// root. `child_pos` is left for the caller to recompute.
#[must_use]
pub fn sort_forest(block: Vec<Entry>, ctx: &SortContext<'_>) -> Vec<Entry> {
    let total: usize = block.len();
    let mut roots: Vec<Entry> = Vec::new();
    let mut subtrees: Vec<Vec<Entry>> = Vec::new();

    let mut iter = block.into_iter();
    while let Some(root) = iter.next() {
        let descendants: Vec<Entry> = iter.by_ref().take(root.child_count).collect();
        roots.push(root);
        subtrees.push(descendants);
    }

    let order: Vec<usize> = sort_order(&mut roots, ctx);

    let mut nodes: Vec<Option<(Entry, Vec<Entry>)>> =
        roots.into_iter().zip(subtrees).map(Some).collect();
    let mut out: Vec<Entry> = Vec::with_capacity(total);
    for i in order {
        if let Some((root, descendants)) = nodes[i].take() {
            out.push(root);
            if !descendants.is_empty() {
                out.extend(sort_forest(descendants, ctx));
            }
        }
    }
    out
}

/// Sorts a tree-shaped list level by level and relinks it.
pub fn sort_tree(entries: &mut Vec<Entry>, ctx: &SortContext<'_>) {
    *entries = sort_forest(std::mem::take(entries), ctx);
    relink(entries);
}

/// Sorts `entries`, choosing the tree algorithm when the list is nested.
pub fn sort_entries(entries: &mut Vec<Entry>, ctx: &SortContext<'_>) {
    let start_time: Instant = Instant::now();
    let nested: bool = is_nested(entries);

    if nested {
        sort_tree(entries, ctx);
    } else {
        sort_flat(entries, ctx);
    }

    let duration: Duration = start_time.elapsed();
    debug!(
        marker = "SORT_COMPLETED",
        operation_type = "sort_entries",
        entries = entries.len(),
        keys = %ctx.keys,
        nested,
        duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
        "Sorted entries"
    );
}
