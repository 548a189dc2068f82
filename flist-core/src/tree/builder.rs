//! ``src/tree/builder.rs``
//! ============================================================================
//! # Tree Builder
//!
//! Flattens a directory hierarchy into the pre-order entry layout. The walk
//! is depth-first in file-name order; each open directory's index sits on a
//! stack and every appended entry bumps the `child_count` of all open
//! ancestors, so counts are final as soon as a directory is left.

use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use compact_str::CompactString;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{FlistError, FlistResult};
use crate::fs::entry::{Entry, EntryType, Origin};
use crate::fs::path_trie::PathTrie;
use crate::fs::scanner::CancelFlag;
use crate::model::entry_store::relink;

/// Walks `root` into a forest of its descendants.
///
/// * `depth`: levels materialized below `root`; directories on the last
///   level are recorded folded with no children.
/// * `folded`: directories kept folded (present, children not walked).
/// * `excluded`: paths left out together with their subtrees.
pub fn build_tree(
    root: &Path,
    depth: Option<usize>,
    folded: &PathTrie,
    excluded: &PathTrie,
    cancel: &CancelFlag,
) -> FlistResult<Vec<Entry>> {
    let start_time: Instant = Instant::now();

    let meta: Metadata = fs::metadata(root).map_err(|e| FlistError::tree_walk(root, e.to_string()))?;
    if !meta.is_dir() {
        return Err(FlistError::tree_walk(root, "not a directory"));
    }

    let max_depth: usize = depth.unwrap_or(usize::MAX).max(1);
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    let mut entries: Vec<Entry> = Vec::new();
    // (walk depth, index) of directories whose subtree is still open
    let mut open: Vec<(usize, usize)> = Vec::new();

    while let Some(item) = walker.next() {
        cancel.check()?;

        let item: DirEntry = match item {
            Ok(item) => item,
            Err(e) if e.depth() == 0 => return Err(FlistError::tree_walk(root, e.to_string())),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping unreadable tree node");
                continue;
            }
        };

        let level: usize = item.depth();
        let is_dir: bool = item.file_type().is_dir();
        while open.last().is_some_and(|&(d, _): &(usize, usize)| -> bool { d >= level }) {
            open.pop();
        }

        if excluded.contains(item.path()) {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let Some(name) = item.file_name().to_str() else {
            debug!(path = ?item.path(), "Skipping entry with non UTF-8 name");
            continue;
        };
        let meta: Metadata = match item.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = ?item.path(), error = %e, "Entry vanished during walk");
                continue;
            }
        };

        let parent: PathBuf = item.path().parent().unwrap_or(root).to_path_buf();
        let mut entry = Entry::from_metadata(name, Origin::Owned(parent), &meta);
        let idx: usize = entries.len();

        for &(_, ancestor) in &open {
            entries[ancestor].child_count += 1;
        }

        if is_dir {
            if level >= max_depth || folded.contains(item.path()) {
                entry.folded = true;
                walker.skip_current_dir();
            } else {
                open.push((level, idx));
            }
        }
        entries.push(entry);
    }

    relink(&mut entries);

    info!(
        marker = "TREE_BUILD",
        operation_type = "build_tree",
        root = %root.display(),
        entries = entries.len(),
        depth_limit = depth,
        duration_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX),
        "Tree walked"
    );

    Ok(entries)
}

// ------------------------------------------------------------
// Custom trees
// ------------------------------------------------------------

#[derive(Default)]
struct Node {
    entry: Option<Entry>,
    children: BTreeMap<CompactString, Node>,
}

fn flatten(children: BTreeMap<CompactString, Node>, dir: &Path, out: &mut Vec<Entry>) {
    for (name, node) in children {
        let path: PathBuf = dir.join(name.as_str());
        let entry: Entry = node.entry.unwrap_or_else(|| intermediate(&path, dir, &name));

        let idx: usize = out.len();
        out.push(entry);
        flatten(node.children, &path, out);
        out[idx].child_count = out.len() - idx - 1;
    }
}

/// Directory row for a path that is only implied by deeper entries.
fn intermediate(path: &Path, dir: &Path, name: &str) -> Entry {
    Entry::from_owned_path(path)
        .unwrap_or_else(|_| Entry::synthetic(name, Origin::Owned(dir.to_path_buf()), EntryType::Dir))
}

/// Nests a flat custom list under `root`, adding the directories the paths
/// imply. Entries outside `root` are dropped; duplicates keep the first.
#[must_use]
pub fn build_custom_tree(root: &Path, entries: Vec<Entry>) -> Vec<Entry> {
    let mut top = Node::default();
    let given: usize = entries.len();

    for mut entry in entries {
        let path: PathBuf = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };

        let parts: Vec<CompactString> = rel
            .components()
            .filter_map(|c: Component<'_>| -> Option<CompactString> {
                match c {
                    Component::Normal(part) => Some(CompactString::new(part.to_string_lossy())),
                    _ => None,
                }
            })
            .collect();
        if parts.is_empty() {
            continue;
        }

        let mut node: &mut Node = &mut top;
        for part in parts {
            node = node.children.entry(part).or_default();
        }
        if node.entry.is_none() {
            entry.child_count = 0;
            entry.child_pos = 0;
            node.entry = Some(entry);
        }
    }

    let mut out: Vec<Entry> = Vec::with_capacity(given);
    flatten(top.children, root, &mut out);
    relink(&mut out);
    out
}

/// Deepest directory containing every entry of the list.
#[must_use]
pub fn common_root(entries: &[Entry]) -> Option<PathBuf> {
    let mut dirs = entries.iter().map(|e| e.origin.as_path());
    let first: PathBuf = dirs.next()?.to_path_buf();

    Some(dirs.fold(first, |acc: PathBuf, dir: &Path| -> PathBuf {
        acc.components()
            .zip(dir.components())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_tree_valid, names};
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/c"), b"c").unwrap();
        fs::write(root.join("a/x"), b"x").unwrap();
        fs::write(root.join("top"), b"t").unwrap();
        tmp
    }

    fn walk(root: &Path, depth: Option<usize>, folded: &PathTrie, excluded: &PathTrie) -> Vec<Entry> {
        build_tree(root, depth, folded, excluded, &CancelFlag::new()).unwrap()
    }

    #[test]
    fn test_build_nested() {
        let tmp = fixture();
        let entries = walk(tmp.path(), None, &PathTrie::new(), &PathTrie::new());

        assert_tree_valid(&entries);
        assert_eq!(names(&entries), vec!["a", "b", "c", "x", "top"]);
        assert_eq!(entries[0].child_count, 3);
        assert_eq!(entries[1].child_count, 1);
        assert_eq!(entries[2].origin.as_path(), tmp.path().join("a/b"));
        assert_eq!(entries[4].child_pos, 0);
    }

    #[test]
    fn test_empty_subdirectory_is_a_leaf() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let entries = walk(tmp.path(), None, &PathTrie::new(), &PathTrie::new());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].child_count, 0);
        assert!(!entries[0].folded);
    }

    #[test]
    fn test_depth_limit_records_folded_dirs() {
        let tmp = fixture();
        let entries = walk(tmp.path(), Some(1), &PathTrie::new(), &PathTrie::new());

        assert_eq!(names(&entries), vec!["a", "top"]);
        assert!(entries[0].folded);
        assert_eq!(entries[0].child_count, 0);
    }

    #[test]
    fn test_folded_and_excluded_paths() {
        let tmp = fixture();
        let mut folded = PathTrie::new();
        folded.insert(&tmp.path().join("a/b"));
        let mut excluded = PathTrie::new();
        excluded.insert(&tmp.path().join("top"));

        let entries = walk(tmp.path(), None, &folded, &excluded);
        assert_tree_valid(&entries);
        assert_eq!(names(&entries), vec!["a", "b", "x"]);
        assert!(entries[1].folded);
        assert_eq!(entries[0].child_count, 2);
    }

    #[test]
    fn test_missing_root_is_tree_walk_error() {
        let tmp = TempDir::new().unwrap();
        let err = build_tree(
            &tmp.path().join("missing"),
            None,
            &PathTrie::new(),
            &PathTrie::new(),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FlistError::TreeWalk { .. }));
    }

    #[test]
    fn test_cancelled_walk() {
        let tmp = fixture();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = build_tree(tmp.path(), None, &PathTrie::new(), &PathTrie::new(), &cancel).unwrap_err();
        assert!(matches!(err, FlistError::Cancelled));
    }

    #[test]
    fn test_custom_tree_adds_intermediate_dirs() {
        let mk = |dir: &str, name: &str| Entry::synthetic(name, Origin::Owned(PathBuf::from(dir)), EntryType::Regular);
        let list = vec![mk("/r/a/b", "f1"), mk("/r", "f2"), mk("/r/a", "f3"), mk("/elsewhere", "f4")];

        let entries = build_custom_tree(Path::new("/r"), list);
        assert_tree_valid(&entries);
        assert_eq!(names(&entries), vec!["a", "b", "f1", "f3", "f2"]);
        assert_eq!(entries[0].child_count, 3);
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].origin.as_path(), Path::new("/r/a"));
    }

    #[test]
    fn test_common_root() {
        let mk = |dir: &str| Entry::synthetic("f", Origin::Owned(PathBuf::from(dir)), EntryType::Regular);
        assert_eq!(
            common_root(&[mk("/r/a/b"), mk("/r/a/c"), mk("/r/a")]),
            Some(PathBuf::from("/r/a"))
        );
        assert_eq!(common_root(&[]), None);
    }
}
