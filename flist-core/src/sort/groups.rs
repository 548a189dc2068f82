//! `src/sort/groups.rs`
//!
//! Compiled sort-group regexes. A group string is a comma-separated list
//! of patterns (`\,` escapes a literal comma); the groups key sorts by the
//! text each pattern captures. Compiled lists are cached per string so a
//! sort never recompiles them, and the global list is compiled once.

use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{FlistError, FlistResult};

/// Shared compiled list.
pub type GroupList = Arc<[Regex]>;

/// Splits a group string on unescaped commas.
#[must_use]
pub fn split_groups(groups: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = groups.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts.retain(|p: &String| -> bool { !p.is_empty() });
    parts
}

/// Compiles every group of `groups`, case-insensitively.
pub fn compile_groups(groups: &str) -> FlistResult<Vec<Regex>> {
    split_groups(groups)
        .iter()
        .map(|part: &String| -> FlistResult<Regex> {
            RegexBuilder::new(part)
                .case_insensitive(true)
                .build()
                .map_err(|e| FlistError::invalid_pattern(part.as_str(), e))
        })
        .collect()
}

/// Text a group regex extracts from `name`: the first capture group when
/// it participated, else the whole match, else nothing.
#[must_use]
pub fn group_key<'t>(re: &Regex, name: &'t str) -> &'t str {
    match re.captures(name) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(0))
            .map_or("", |m: regex::Match<'t>| -> &'t str { m.as_str() }),
        None => "",
    }
}

/// Per-string cache of compiled group lists.
#[derive(Debug)]
pub struct GroupCache {
    global_raw: String,
    global: GroupList,
    compiled: Mutex<HashMap<String, GroupList, RandomState>>,
}

impl Default for GroupCache {
    fn default() -> Self {
        Self {
            global_raw: String::new(),
            global: Arc::from(Vec::new()),
            compiled: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }
}

impl GroupCache {
    pub fn new(global: &str) -> FlistResult<Self> {
        let mut cache = Self::default();
        cache.set_global(global)?;
        Ok(cache)
    }

    /// Replaces the global list. On failure the old one stays.
    pub fn set_global(&mut self, global: &str) -> FlistResult<()> {
        let compiled: Vec<Regex> = compile_groups(global)?;
        self.global_raw = global.to_string();
        self.global = Arc::from(compiled);
        Ok(())
    }

    #[must_use]
    pub fn global_raw(&self) -> &str {
        &self.global_raw
    }

    /// Compiled list for `groups`, reusing the global one when identical.
    pub fn get(&self, groups: &str) -> FlistResult<GroupList> {
        if groups == self.global_raw {
            return Ok(self.global.clone());
        }

        let mut compiled = self.compiled.lock();
        if let Some(list) = compiled.get(groups) {
            return Ok(list.clone());
        }

        let list: GroupList = Arc::from(compile_groups(groups)?);
        debug!(groups, count = list.len(), "Compiled sort groups");
        compiled.insert(groups.to_string(), list.clone());
        Ok(list)
    }

    /// Drops every cached list except the global one.
    pub fn clear(&self) {
        self.compiled.lock().clear();
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.compiled.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_escapes() {
        assert_eq!(split_groups(r"^(\d+),x\,y,,z"), vec![r"^(\d+)", "x,y", "z"]);
        assert!(split_groups("").is_empty());
    }

    #[test]
    fn test_group_key_prefers_capture() {
        let re = Regex::new(r"^([a-z]+)\d").unwrap();
        assert_eq!(group_key(&re, "img12.png"), "img");

        let whole = Regex::new(r"\d+").unwrap();
        assert_eq!(group_key(&whole, "img12.png"), "12");
        assert_eq!(group_key(&whole, "readme"), "");
    }

    #[test]
    fn test_cache_reuses_global_and_compiled() {
        let cache = GroupCache::new(r"\.(\w+)$").unwrap();
        let global = cache.get(r"\.(\w+)$").unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(cache.cached(), 0);

        let first = cache.get("a,b").unwrap();
        let second = cache.get("a,b").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.cached(), 1);
    }

    #[test]
    fn test_invalid_group_keeps_global() {
        let mut cache = GroupCache::new("x").unwrap();
        let err = cache.set_global("(").unwrap_err();
        assert!(matches!(err, FlistError::InvalidPattern { .. }));
        assert_eq!(cache.global_raw(), "x");
    }
}
