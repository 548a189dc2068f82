//! `src/fs/path_trie.rs`
//!
//! Set of paths stored component by component. Used to remember folded
//! and excluded tree nodes across reloads.

use std::path::{Component, Path};

use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<CompactString, TrieNode, RandomState>,
    terminal: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PathTrie {
    root: TrieNode,
    len: usize,
}

fn components(path: &Path) -> impl Iterator<Item = CompactString> + '_ {
    path.components()
        .filter(|c: &Component<'_>| -> bool { !matches!(c, Component::CurDir) })
        .map(|c: Component<'_>| -> CompactString {
            CompactString::new(c.as_os_str().to_string_lossy())
        })
}

impl PathTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the path was not present yet.
    pub fn insert(&mut self, path: &Path) -> bool {
        let mut node: &mut TrieNode = &mut self.root;
        for part in components(path) {
            node = node.children.entry(part).or_default();
        }

        let added = !node.terminal;
        node.terminal = true;
        if added {
            self.len += 1;
        }
        added
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let mut node: &mut TrieNode = &mut self.root;
        for part in components(path) {
            match node.children.get_mut(&part) {
                Some(next) => node = next,
                None => return false,
            }
        }

        let removed = node.terminal;
        node.terminal = false;
        if removed {
            self.len -= 1;
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.find(path).is_some_and(|node: &TrieNode| -> bool { node.terminal })
    }

    /// Whether `path` or any of its ancestors is stored.
    #[must_use]
    pub fn covers(&self, path: &Path) -> bool {
        let mut node: &TrieNode = &self.root;
        for part in components(path) {
            match node.children.get(&part) {
                Some(next) => {
                    if next.terminal {
                        return true;
                    }
                    node = next;
                }
                None => return false,
            }
        }
        false
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
        self.len = 0;
    }

    fn find(&self, path: &Path) -> Option<&TrieNode> {
        let mut node: &TrieNode = &self.root;
        for part in components(path) {
            node = node.children.get(&part)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains_remove() {
        let mut trie = PathTrie::new();
        assert!(trie.insert(Path::new("/a/b/c")));
        assert!(!trie.insert(Path::new("/a/b/c")));
        assert_eq!(trie.len(), 1);

        assert!(trie.contains(Path::new("/a/b/c")));
        assert!(!trie.contains(Path::new("/a/b")));

        assert!(trie.remove(Path::new("/a/b/c")));
        assert!(!trie.remove(Path::new("/a/b/c")));
        assert!(trie.is_empty());
    }

    #[test]
    fn test_covers_descendants() {
        let mut trie = PathTrie::new();
        trie.insert(Path::new("/root/excluded"));

        assert!(trie.covers(Path::new("/root/excluded")));
        assert!(trie.covers(Path::new("/root/excluded/deep/file")));
        assert!(!trie.covers(Path::new("/root/other")));
        assert!(!trie.covers(Path::new("/root")));
    }
}
