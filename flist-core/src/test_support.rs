//! Fixtures shared by unit tests: synthetic entries and nested trees built
//! without touching the file system.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use crate::fs::entry::{Entry, EntryType, Origin};
use crate::model::entry_store::{relink, validate_tree};

pub const ROOT: &str = "/t";

pub fn file(name: &str) -> Entry {
    Entry::synthetic(name, Origin::Owned(PathBuf::from(ROOT)), EntryType::Regular)
}

pub fn dir(name: &str) -> Entry {
    Entry::synthetic(name, Origin::Owned(PathBuf::from(ROOT)), EntryType::Dir)
}

pub fn sized(name: &str, size: u64) -> Entry {
    let mut entry = file(name);
    entry.size = size;
    entry
}

pub fn modified(name: &str, secs: u64) -> Entry {
    let mut entry = file(name);
    entry.mtime = UNIX_EPOCH + Duration::from_secs(secs);
    entry
}

/// Builds a flattened tree from `(depth, name)` pairs in pre-order.
/// Names ending in `/` are directories; origins follow the nesting below
/// [`ROOT`].
pub fn tree(spec: &[(usize, &str)]) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::with_capacity(spec.len());
    // (depth, index, path)
    let mut open: Vec<(usize, usize, PathBuf)> = Vec::new();

    for &(depth, raw) in spec {
        while open.last().is_some_and(|(d, _, _)| *d >= depth) {
            open.pop();
        }

        let parent_dir: PathBuf = open
            .last()
            .map_or_else(|| PathBuf::from(ROOT), |(_, _, path)| path.clone());
        let (name, kind) = match raw.strip_suffix('/') {
            Some(name) => (name, EntryType::Dir),
            None => (raw, EntryType::Regular),
        };

        let entry = Entry::synthetic(name, Origin::Owned(parent_dir.clone()), kind);
        let idx = entries.len();
        entries.push(entry);

        for (_, ancestor, _) in &open {
            entries[*ancestor].child_count += 1;
        }
        if kind == EntryType::Dir {
            open.push((depth, idx, parent_dir.join(name)));
        }
    }

    relink(&mut entries);
    entries
}

pub fn names(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

pub fn assert_tree_valid(entries: &[Entry]) {
    if let Err(violation) = validate_tree(entries) {
        panic!("tree invariant broken: {violation}\n{:#?}", names(entries));
    }
}

pub fn root() -> &'static Path {
    Path::new(ROOT)
}
