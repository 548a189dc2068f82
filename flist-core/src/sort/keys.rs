//! `src/sort/keys.rs`
//!
//! Sort keys are small signed integers: the magnitude selects the
//! comparator, the sign the direction (negative means descending). A view
//! stores them most-significant-first in a fixed array whose unused slots
//! hold `SK_NONE`.

use serde::{Deserialize, Serialize};

use crate::error::{FlistError, FlistResult};

/// Sentinel for unused key slots.
pub const SK_NONE: i8 = 0;

/// Comparator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum SortKey {
    Extension = 1,
    Name = 2,
    Size = 3,
    Atime = 4,
    Ctime = 5,
    Mtime = 6,
    IName = 7,
    Dir = 8,
    Type = 9,
    FileExt = 10,
    NItems = 11,
    Groups = 12,
    Target = 13,
    Mode = 14,
    Permissions = 15,
    Uid = 16,
    Gid = 17,
    Inode = 18,
    NLinks = 19,
}

/// Number of distinct keys, and therefore of slots in a key array.
pub const SORT_KEY_SLOTS: usize = 19;

impl SortKey {
    pub const ALL: [Self; SORT_KEY_SLOTS] = [
        Self::Extension,
        Self::Name,
        Self::Size,
        Self::Atime,
        Self::Ctime,
        Self::Mtime,
        Self::IName,
        Self::Dir,
        Self::Type,
        Self::FileExt,
        Self::NItems,
        Self::Groups,
        Self::Target,
        Self::Mode,
        Self::Permissions,
        Self::Uid,
        Self::Gid,
        Self::Inode,
        Self::NLinks,
    ];

    #[must_use]
    pub fn from_magnitude(value: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|key: &Self| -> bool { *key as i8 == value })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Extension => "ext",
            Self::Name => "name",
            Self::Size => "size",
            Self::Atime => "atime",
            Self::Ctime => "ctime",
            Self::Mtime => "mtime",
            Self::IName => "iname",
            Self::Dir => "dir",
            Self::Type => "type",
            Self::FileExt => "fileext",
            Self::NItems => "nitems",
            Self::Groups => "groups",
            Self::Target => "target",
            Self::Mode => "mode",
            Self::Permissions => "perms",
            Self::Uid => "uid",
            Self::Gid => "gid",
            Self::Inode => "inode",
            Self::NLinks => "nlinks",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key: &Self| -> bool { key.name() == name })
    }
}

/// One key together with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedKey {
    pub key: SortKey,
    pub descending: bool,
}

impl SignedKey {
    #[must_use]
    pub const fn asc(key: SortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    #[must_use]
    pub const fn desc(key: SortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }

    #[must_use]
    pub fn from_raw(raw: i8) -> Option<Self> {
        if raw == SK_NONE {
            return None;
        }
        let key: SortKey = SortKey::from_magnitude(raw.checked_abs()?)?;
        Some(Self {
            key,
            descending: raw < 0,
        })
    }

    #[must_use]
    pub const fn raw(self) -> i8 {
        if self.descending {
            -(self.key as i8)
        } else {
            self.key as i8
        }
    }
}

impl std::fmt::Display for SignedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign: char = if self.descending { '-' } else { '+' };
        write!(f, "{sign}{}", self.key.name())
    }
}

/// Fixed-size, most-significant-first key array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i8>", into = "Vec<i8>")]
pub struct SortKeys {
    slots: [i8; SORT_KEY_SLOTS],
}

impl Default for SortKeys {
    fn default() -> Self {
        let mut slots = [SK_NONE; SORT_KEY_SLOTS];
        slots[0] = SortKey::Name as i8;
        Self { slots }
    }
}

impl SortKeys {
    /// Key array with no keys at all (directory grouping still applies).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            slots: [SK_NONE; SORT_KEY_SLOTS],
        }
    }

    /// Validates raw signed keys: known magnitudes, each key at most once.
    pub fn from_raw(raw: &[i8]) -> FlistResult<Self> {
        if raw.len() > SORT_KEY_SLOTS {
            return Err(FlistError::invalid_input("sort", "too many sort keys"));
        }

        let mut slots = [SK_NONE; SORT_KEY_SLOTS];
        for (i, &value) in raw.iter().enumerate() {
            let key: SignedKey = SignedKey::from_raw(value).ok_or_else(|| {
                FlistError::invalid_input("sort", format!("unknown sort key {value}"))
            })?;
            if slots[..i].iter().any(|&s: &i8| -> bool { s.abs() == value.abs() }) {
                return Err(FlistError::invalid_input(
                    "sort",
                    format!("duplicate sort key {}", key.key.name()),
                ));
            }
            slots[i] = value;
        }

        Ok(Self { slots })
    }

    pub fn from_keys(keys: &[SignedKey]) -> FlistResult<Self> {
        let raw: Vec<i8> = keys.iter().map(|k: &SignedKey| -> i8 { k.raw() }).collect();
        Self::from_raw(&raw)
    }

    /// Parses `+name,-size` style descriptions (a missing sign means `+`).
    pub fn parse(spec: &str) -> FlistResult<Self> {
        let mut keys: Vec<SignedKey> = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p: &&str| -> bool { !p.is_empty() }) {
            let (descending, name) = match part.as_bytes()[0] {
                b'-' => (true, &part[1..]),
                b'+' => (false, &part[1..]),
                _ => (false, part),
            };
            let key: SortKey = SortKey::from_name(name)
                .ok_or_else(|| FlistError::invalid_input("sort", format!("unknown sort key '{name}'")))?;
            keys.push(SignedKey { key, descending });
        }
        Self::from_keys(&keys)
    }

    /// Keys in priority order, most significant first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = SignedKey> + '_ {
        let len: usize = self
            .slots
            .iter()
            .position(|&s: &i8| -> bool { s == SK_NONE })
            .unwrap_or(SORT_KEY_SLOTS);
        self.slots[..len]
            .iter()
            .filter_map(|&s: &i8| -> Option<SignedKey> { SignedKey::from_raw(s) })
    }

    #[must_use]
    pub fn contains(&self, key: SortKey) -> bool {
        self.iter().any(|k: SignedKey| -> bool { k.key == key })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots[0] == SK_NONE
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<i8> {
        self.iter().map(SignedKey::raw).collect()
    }

    #[must_use]
    pub fn primary(&self) -> Option<SignedKey> {
        self.iter().next()
    }
}

impl TryFrom<Vec<i8>> for SortKeys {
    type Error = FlistError;

    fn try_from(raw: Vec<i8>) -> Result<Self, Self::Error> {
        Self::from_raw(&raw)
    }
}

impl From<SortKeys> for Vec<i8> {
    fn from(keys: SortKeys) -> Self {
        keys.to_vec()
    }
}

impl std::fmt::Display for SortKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|k: SignedKey| -> String { k.to_string() }).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_encoding() {
        let key = SignedKey::desc(SortKey::Size);
        assert_eq!(key.raw(), -3);
        assert_eq!(SignedKey::from_raw(-3), Some(key));
        assert_eq!(SignedKey::from_raw(SK_NONE), None);
        assert_eq!(SignedKey::from_raw(99), None);
    }

    #[test]
    fn test_parse_and_display() {
        let keys = SortKeys::parse("-size, name,+mtime").unwrap();
        assert_eq!(keys.to_vec(), vec![-3, 2, 6]);
        assert_eq!(keys.to_string(), "-size,+name,+mtime");
        assert!(keys.contains(SortKey::Mtime));
        assert!(!keys.contains(SortKey::Dir));
    }

    #[test]
    fn test_rejects_duplicates_and_unknown() {
        assert!(SortKeys::from_raw(&[2, -2]).is_err());
        assert!(SortKeys::from_raw(&[42]).is_err());
        assert!(SortKeys::parse("bogus").is_err());
    }

    #[test]
    fn test_serde_as_integers() {
        let keys = SortKeys::parse("-iname,size").unwrap();
        let json = serde_json::to_string(&keys).unwrap();
        assert_eq!(json, "[-7,3]");
        let back: SortKeys = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keys);
    }
}
