//! `src/sort/strnum.rs`
//!
//! Name comparison with numeric digit runs (`file9 < file10`).

use std::cmp::Ordering;

/// Splits the digit run at the start of `s` into (run without leading
/// zeros, bytes consumed).
#[inline]
fn digit_run(s: &[u8]) -> (&[u8], usize) {
    let len: usize = s.iter().take_while(|b: &&u8| -> bool { b.is_ascii_digit() }).count();
    let zeros: usize = s[..len].iter().take_while(|&&b: &&u8| -> bool { b == b'0' }).count();
    (&s[zeros..len], len)
}

/// Compares two strings treating every run of ASCII digits as an unbounded
/// integer. Leading zeros carry no weight, so `"000"` and `"00"` are equal
/// while `"00" < "01"` and `"09" > "0"`.
#[must_use]
pub fn strnumcmp(a: &str, b: &str) -> Ordering {
    let (a, b): (&[u8], &[u8]) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j): (usize, usize) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (na, la) = digit_run(&a[i..]);
            let (nb, lb) = digit_run(&b[j..]);

            let ord: Ordering = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
            if ord != Ordering::Equal {
                return ord;
            }
            i += la;
            j += lb;
            continue;
        }

        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            ord => return ord,
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

/// Name ordering used by the name comparators. Names starting with `.`
/// come before all others; `ignore_case` folds to lowercase first and
/// `natural` switches to [`strnumcmp`].
#[must_use]
pub fn compare_names(a: &str, b: &str, ignore_case: bool, natural: bool) -> Ordering {
    let dot_a: bool = a.starts_with('.');
    let dot_b: bool = b.starts_with('.');
    if dot_a != dot_b {
        return dot_b.cmp(&dot_a);
    }

    let cmp = |x: &str, y: &str| -> Ordering {
        if natural { strnumcmp(x, y) } else { x.cmp(y) }
    };

    if ignore_case {
        cmp(&a.to_lowercase(), &b.to_lowercase())
    } else {
        cmp(a, b)
    }
}
