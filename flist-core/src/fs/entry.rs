//! `src/fs/entry.rs`
//! ============================================================
//! One row of a pane's file list.
//!
//! An `Entry` is either a real file-system object or a synthetic
//! placeholder (a compare "fake" row, an intermediate tree node).
//! Besides metadata it carries the two tree fields that let a flat
//! array describe a forest:
//!
//! * `child_count` - descendants stored right after the entry
//! * `child_pos`   - offset back to the parent (0 at top level)

// ------------------------------------------------------------
// Standard-library imports
// ------------------------------------------------------------

use std::ffi::OsStr;
use std::fs::{self, FileType, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ------------------------------------------------------------
// Third-party crate imports
// ------------------------------------------------------------

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------
// Local-crate imports
// ------------------------------------------------------------

use crate::error::{FlistError, FlistResult};

// ------------------------------------------------------------
// EntryType: what kind of object the row stands for.
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Dir,
    Regular,
    Symlink,
    Fifo,
    Socket,
    CharDev,
    BlockDev,
    Unknown,
}

impl EntryType {
    #[must_use]
    pub fn from_file_type(ftype: &FileType) -> Self {
        if ftype.is_dir() {
            return Self::Dir;
        }
        if ftype.is_symlink() {
            return Self::Symlink;
        }
        if ftype.is_file() {
            return Self::Regular;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;

            if ftype.is_fifo() {
                return Self::Fifo;
            }
            if ftype.is_socket() {
                return Self::Socket;
            }
            if ftype.is_char_device() {
                return Self::CharDev;
            }
            if ftype.is_block_device() {
                return Self::BlockDev;
            }
        }

        Self::Unknown
    }

    /// Position used by the type comparator.
    #[inline]
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Dir => 0,
            Self::Symlink => 1,
            Self::Regular => 2,
            Self::Fifo => 3,
            Self::Socket => 4,
            Self::CharDev => 5,
            Self::BlockDev => 6,
            Self::Unknown => 7,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &str = match self {
            Self::Dir => "dir",
            Self::Regular => "reg",
            Self::Symlink => "link",
            Self::Fifo => "fifo",
            Self::Socket => "sock",
            Self::CharDev => "char",
            Self::BlockDev => "block",
            Self::Unknown => "unknown",
        };

        write!(f, "{s}")
    }
}

// ------------------------------------------------------------
// Origin: the directory an entry lives in.
// ------------------------------------------------------------

/// Either the owning list's current directory (shared, never copied per
/// entry) or a path owned by this entry alone (custom lists, trees).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Shared(Arc<Path>),
    Owned(PathBuf),
}

impl Origin {
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        match self {
            Self::Shared(dir) => dir,
            Self::Owned(dir) => dir,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

// ------------------------------------------------------------
// EntryKey: (name, origin) identity used to re-find rows.
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub name: CompactString,
    pub dir: PathBuf,
}

impl EntryKey {
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        entry.name == self.name && entry.origin.as_path() == self.dir
    }
}

// ------------------------------------------------------------
// Entry
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    // Identity
    pub name: CompactString,
    pub origin: Origin,

    // Metadata
    pub size: u64,
    pub mtime: SystemTime,
    pub atime: SystemTime,
    pub ctime: SystemTime,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlinks: u64,
    pub inode: u64,
    pub kind: EntryType,
    pub dir_link: bool,

    // Tree fields
    pub child_count: usize,
    pub child_pos: usize,

    // Compare / sort scratch
    pub id: u32,
    pub tag: usize,
    pub match_span: Option<(usize, usize)>,
    pub highlight: Option<u16>,

    // State bits
    pub selected: bool,
    pub was_selected: bool,
    pub marked: bool,
    pub temporary: bool,
    pub folded: bool,
    pub is_fake: bool,
}

impl Entry {
    /// Entry without metadata, used for synthetic rows.
    #[must_use]
    pub fn synthetic(name: &str, origin: Origin, kind: EntryType) -> Self {
        Self {
            name: CompactString::new(name),
            origin,
            size: 0,
            mtime: UNIX_EPOCH,
            atime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            mode: 0,
            uid: 0,
            gid: 0,
            nlinks: 1,
            inode: 0,
            kind,
            dir_link: false,
            child_count: 0,
            child_pos: 0,
            id: 0,
            tag: 0,
            match_span: None,
            highlight: None,
            selected: false,
            was_selected: false,
            marked: false,
            temporary: false,
            folded: false,
            is_fake: false,
        }
    }

    /// Placeholder row standing in for a missing compare counterpart.
    #[must_use]
    pub fn fake(origin: Origin, id: u32) -> Self {
        let mut entry = Self::synthetic("", origin, EntryType::Regular);
        entry.id = id;
        entry.is_fake = true;
        entry
    }

    /// Build an entry from already fetched `symlink_metadata`.
    #[must_use]
    pub fn from_metadata(name: &str, origin: Origin, meta: &Metadata) -> Self {
        let kind: EntryType = EntryType::from_file_type(&meta.file_type());
        let mut entry = Self::synthetic(name, origin, kind);

        entry.size = meta.len();
        entry.mtime = meta.modified().unwrap_or(UNIX_EPOCH);
        entry.atime = meta.accessed().unwrap_or(UNIX_EPOCH);
        entry.ctime = entry.mtime;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            use std::time::Duration;

            entry.mode = meta.mode();
            entry.uid = meta.uid();
            entry.gid = meta.gid();
            entry.nlinks = meta.nlink();
            entry.inode = meta.ino();
            if let Ok(secs) = u64::try_from(meta.ctime()) {
                entry.ctime = UNIX_EPOCH + Duration::from_secs(secs);
            }
        }

        if kind == EntryType::Symlink {
            let target: PathBuf = entry.path();
            entry.dir_link = fs::metadata(&target).is_ok_and(|m: Metadata| -> bool { m.is_dir() });
        }

        entry
    }

    /// Stat `path` and build its entry.
    pub fn from_path(path: &Path, origin: Origin) -> FlistResult<Self> {
        let meta: Metadata =
            fs::symlink_metadata(path).map_err(|e| FlistError::from_io(path, e))?;
        let name: &str = path.file_name().and_then(OsStr::to_str).unwrap_or("");

        Ok(Self::from_metadata(name, origin, &meta))
    }

    /// Stat `path`, owning its parent directory as origin.
    pub fn from_owned_path(path: &Path) -> FlistResult<Self> {
        let parent: PathBuf = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_path(path, Origin::Owned(parent))
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.origin.as_path().join(self.name.as_str())
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> EntryKey {
        EntryKey {
            name: self.name.clone(),
            dir: self.origin.as_path().to_path_buf(),
        }
    }

    /// Directories and symbolic links to directories.
    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryType::Dir) || self.dir_link
    }

    #[inline]
    #[must_use]
    pub fn is_parent_ref(&self) -> bool {
        self.name == ".."
    }

    /// Text after the last dot; dot files without another dot have none.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        if self.is_dir() {
            return None;
        }
        let name: &str = self.name.as_str();
        let stem_start: usize = usize::from(name.starts_with('.'));
        name[stem_start..]
            .rfind('.')
            .map(|pos: usize| -> &str { &name[stem_start + pos + 1..] })
    }

    /// `rwxr-xr-x` style permission string.
    #[must_use]
    pub fn permissions_string(&self) -> String {
        const BITS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];

        BITS.iter()
            .map(|&(bit, ch): &(u32, char)| -> char { if self.mode & bit != 0 { ch } else { '-' } })
            .collect()
    }

    /// Forget cached decoration indices (after config changes).
    #[inline]
    pub fn invalidate_decorations(&mut self) {
        self.highlight = None;
        self.match_span = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_rules() {
        let origin = Origin::Owned(PathBuf::from("/x"));
        let file = Entry::synthetic("archive.tar.gz", origin.clone(), EntryType::Regular);
        assert_eq!(file.extension(), Some("gz"));

        let dotfile = Entry::synthetic(".bashrc", origin.clone(), EntryType::Regular);
        assert_eq!(dotfile.extension(), None);

        let dot_ext = Entry::synthetic(".config.toml", origin.clone(), EntryType::Regular);
        assert_eq!(dot_ext.extension(), Some("toml"));

        let dir = Entry::synthetic("src.d", origin, EntryType::Dir);
        assert_eq!(dir.extension(), None);
    }

    #[test]
    fn test_permissions_string() {
        let mut entry = Entry::synthetic("f", Origin::Owned(PathBuf::from("/")), EntryType::Regular);
        entry.mode = 0o100_754;
        assert_eq!(entry.permissions_string(), "rwxr-xr--");
    }

    #[test]
    fn test_from_path_reads_metadata() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.bin");
        std::fs::write(&file, b"12345").unwrap();

        let entry = Entry::from_owned_path(&file).unwrap();
        assert_eq!(entry.name, "data.bin");
        assert_eq!(entry.size, 5);
        assert_eq!(entry.kind, EntryType::Regular);
        assert_eq!(entry.origin.as_path(), tmp.path());
        assert!(entry.origin.is_owned());
    }

    #[test]
    fn test_fake_entry_is_tagged() {
        let fake = Entry::fake(Origin::Owned(PathBuf::from("/a")), 7);
        assert!(fake.is_fake);
        assert_eq!(fake.id, 7);
        assert!(fake.name.is_empty());
    }
}
