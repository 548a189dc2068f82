//! `src/compare/align.rs`
//!
//! Row alignment for two-pane comparison: a longest common subsequence over
//! group ids. Matched ids share a row; the rows in between list the current
//! side's leftovers before the other side's.

use crate::error::{FlistError, FlistResult};

/// Indices into the current and other side; `None` marks a gap.
pub type Row = (Option<usize>, Option<usize>);

/// Emits the unmatched rows left since the last match, current side first.
fn flush(rows: &mut Vec<Row>, gap: (&mut usize, &mut usize), to: (usize, usize)) {
    rows.extend((*gap.0..to.0).map(|k: usize| -> Row { (Some(k), None) }));
    rows.extend((*gap.1..to.1).map(|k: usize| -> Row { (None, Some(k)) }));
    *gap.0 = to.0;
    *gap.1 = to.1;
}

/// Aligns `current` and `other` id sequences.
pub fn align(current: &[u32], other: &[u32]) -> FlistResult<Vec<Row>> {
    let (n, m): (usize, usize) = (current.len(), other.len());
    let width: usize = m + 1;
    let cells: usize = (n + 1)
        .checked_mul(width)
        .ok_or(FlistError::AllocationFailure { requested: usize::MAX })?;

    let mut table: Vec<u32> = Vec::new();
    table
        .try_reserve_exact(cells)
        .map_err(|_| FlistError::AllocationFailure { requested: cells })?;
    table.resize(cells, 0);

    // table[i * width + j]: LCS length of current[i..] and other[j..]
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if current[i] == other[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut rows: Vec<Row> = Vec::with_capacity(n.max(m));
    let (mut i, mut j): (usize, usize) = (0, 0);
    let (mut gap_i, mut gap_j): (usize, usize) = (0, 0);

    while i < n && j < m {
        if current[i] == other[j] {
            flush(&mut rows, (&mut gap_i, &mut gap_j), (i, j));
            rows.push((Some(i), Some(j)));
            i += 1;
            j += 1;
            gap_i = i;
            gap_j = j;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    flush(&mut rows, (&mut gap_i, &mut gap_j), (n, m));

    Ok(rows)
}
