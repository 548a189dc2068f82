//! `src/compare/hashing.rs`
//!
//! Content fingerprints for comparison by contents.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use blake3::Hasher;
use bytesize::ByteSize;
use memmap2::Mmap;
use tracing::trace;

use crate::error::{FlistError, FlistResult};

/// Files at least this large are hashed through a memory map.
const MMAP_THRESHOLD: u64 = ByteSize::mib(1).as_u64();

pub type Digest = [u8; 32];

/// BLAKE3 digest of the file at `path`.
pub fn hash_file(path: &Path) -> FlistResult<Digest> {
    let file: File = File::open(path).map_err(|e| FlistError::from_io(path, e))?;
    let len: u64 = file.metadata().map_err(|e| FlistError::from_io(path, e))?.len();

    let mut hasher = Hasher::new();
    if len >= MMAP_THRESHOLD {
        // SAFETY: read-only map, dropped before returning.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| FlistError::from_io(path, e))?;
        hasher.update(&mmap);
    } else {
        let mut reader = BufReader::new(file);
        io::copy(&mut reader, &mut hasher).map_err(|e| FlistError::from_io(path, e))?;
    }

    trace!(path = %path.display(), size = %ByteSize::b(len), "File hashed");
    Ok(*hasher.finalize().as_bytes())
}
