//! `src/filter/matcher.rs`
//!
//! Pattern matchers shared by the manual and local filters.
//!
//! Accepted forms:
//!
//! * `/regex/flags`   - regex against the name (`i`: ignore case, `I`: respect case)
//! * `//regex//flags` - regex against the full path
//! * `{g1,g2}`        - glob list against the name
//! * `{{g1,g2}}`      - glob list against the full path
//! * `!...`           - negates any of the above
//! * anything else    - glob when it only uses glob syntax, regex otherwise
//!
//! Directories are matched with a trailing `/` appended, so a glob item
//! ending in `/` or a regex ending in `/$` only selects directories.

use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::error::{FlistError, FlistResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    Regex,
    Glob,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    raw: String,
    regex: Regex,
    negated: bool,
    full_path: bool,
    /// Append `/` to directory names before matching.
    dir_suffix: bool,
    kind: MatcherKind,
}

/// Characters that make a bare pattern a regex.
const REGEX_ONLY: &[char] = &['^', '$', '+', '(', ')', '{', '}', '|', '\\'];

/// Translates one glob item to an anchored regex body.
fn glob_item(item: &str) -> String {
    let (body, dir_only): (&str, bool) = match item.strip_suffix('/') {
        Some(body) => (body, true),
        None => (item, false),
    };

    let mut out = String::with_capacity(body.len() * 2 + 6);
    out.push('^');

    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    if inner == '\\' || inner == '[' {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push_str(if dir_only { "/$" } else { "/?$" });
    out
}

/// Regex source equivalent to a comma-separated glob list.
#[must_use]
pub fn glob_to_regex(globs: &str) -> String {
    let items: Vec<String> = globs
        .split(',')
        .filter(|item: &&str| -> bool { !item.is_empty() })
        .map(glob_item)
        .collect();
    format!("(?:{})", items.join("|"))
}

fn build(source: &str, raw: &str, ignore_case: bool) -> FlistResult<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| FlistError::invalid_pattern(raw, e))
}

/// Splits `/body/flags` (or `//body//flags`) into body and flags.
fn split_regex<'p>(rest: &'p str, delim: &str) -> Option<(&'p str, &'p str)> {
    let inner: &str = rest.strip_prefix(delim)?;
    let end: usize = inner.rfind(delim)?;
    let flags: &str = &inner[end + delim.len()..];
    if flags.chars().all(|c: char| -> bool { c == 'i' || c == 'I' }) {
        Some((&inner[..end], flags))
    } else {
        None
    }
}

/// Case sensitivity selected by regex flags; the last flag wins.
fn ignore_case_from(flags: &str, default: bool) -> bool {
    match flags.chars().last() {
        Some('i') => true,
        Some('I') => false,
        _ => default,
    }
}

impl Matcher {
    /// Parses a manual-filter style pattern.
    pub fn parse(pattern: &str) -> FlistResult<Self> {
        if pattern.is_empty() {
            return Err(FlistError::invalid_pattern(pattern, "empty pattern"));
        }

        let (negated, rest): (bool, &str) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };

        let (regex, full_path, kind) = if let Some((body, flags)) = split_regex(rest, "//") {
            (build(body, pattern, ignore_case_from(flags, false))?, true, MatcherKind::Regex)
        } else if let Some((body, flags)) = split_regex(rest, "/") {
            (build(body, pattern, ignore_case_from(flags, false))?, false, MatcherKind::Regex)
        } else if let Some(globs) = rest.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
            (build(&glob_to_regex(globs), pattern, false)?, true, MatcherKind::Glob)
        } else if let Some(globs) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            (build(&glob_to_regex(globs), pattern, false)?, false, MatcherKind::Glob)
        } else if rest.contains(REGEX_ONLY) {
            (build(rest, pattern, false)?, false, MatcherKind::Regex)
        } else {
            (build(&glob_to_regex(rest), pattern, false)?, false, MatcherKind::Glob)
        };

        Ok(Self {
            raw: pattern.to_string(),
            regex,
            negated,
            full_path,
            dir_suffix: true,
            kind,
        })
    }

    /// Parses an interactive local-filter pattern: a plain regex searched
    /// within names, case-insensitive unless it contains an uppercase letter.
    /// Directory names are matched as they are.
    pub fn parse_local(pattern: &str) -> FlistResult<Self> {
        let ignore_case: bool = !pattern.chars().any(char::is_uppercase);
        Ok(Self {
            raw: pattern.to_string(),
            regex: build(pattern, pattern, ignore_case)?,
            negated: false,
            full_path: false,
            dir_suffix: false,
            kind: MatcherKind::Regex,
        })
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MatcherKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn is_full_path(&self) -> bool {
        self.full_path
    }

    fn subject(&self, dir: &Path, name: &str, is_dir: bool) -> String {
        let mut subject: String = if self.full_path {
            dir.join(name).to_string_lossy().into_owned()
        } else {
            name.to_string()
        };
        if is_dir && self.dir_suffix {
            subject.push('/');
        }
        subject
    }

    #[must_use]
    pub fn matches(&self, dir: &Path, name: &str, is_dir: bool) -> bool {
        let subject: String = self.subject(dir, name, is_dir);
        self.regex.is_match(&subject) != self.negated
    }

    /// Byte span of the first match inside `name`, for highlighting.
    #[must_use]
    pub fn span(&self, name: &str) -> Option<(usize, usize)> {
        if self.negated || self.full_path {
            return None;
        }
        self.regex
            .find(name)
            .map(|m: regex::Match<'_>| -> (usize, usize) { (m.start(), m.end()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str) -> Matcher {
        Matcher::parse(pattern).unwrap()
    }

    const DIR: &str = "/home/u";

    #[test]
    fn test_bare_glob() {
        let matcher = m("*.txt");
        assert_eq!(matcher.kind(), MatcherKind::Glob);
        assert!(matcher.matches(Path::new(DIR), "a.txt", false));
        assert!(!matcher.matches(Path::new(DIR), "a.txt.bak", false));
        assert!(matcher.matches(Path::new(DIR), "notes.txt", true));
    }

    #[test]
    fn test_bare_regex() {
        let matcher = m(r"^\d+$");
        assert_eq!(matcher.kind(), MatcherKind::Regex);
        assert!(matcher.matches(Path::new(DIR), "123", false));
        assert!(!matcher.matches(Path::new(DIR), "123", true));
    }

    #[test]
    fn test_directory_only_glob() {
        let matcher = m("{build/,*.o}");
        assert!(matcher.matches(Path::new(DIR), "build", true));
        assert!(!matcher.matches(Path::new(DIR), "build", false));
        assert!(matcher.matches(Path::new(DIR), "x.o", false));
    }

    #[test]
    fn test_regex_flags_and_negation() {
        let matcher = m("/^READ/i");
        assert!(matcher.matches(Path::new(DIR), "readme", false));

        let negated = m("!/^READ/");
        assert!(negated.matches(Path::new(DIR), "readme", false));
        assert!(!negated.matches(Path::new(DIR), "README", false));
    }

    #[test]
    fn test_full_path_forms() {
        let regex = m("//^/home/u/src//");
        assert!(regex.is_full_path());
        assert!(regex.matches(Path::new("/home/u/src"), "x.rs", false));
        assert!(!regex.matches(Path::new("/tmp"), "x.rs", false));

        let glob = m("{{/home/**.rs}}");
        assert!(glob.matches(Path::new("/home/u/src"), "x.rs", false));
        assert!(!glob.matches(Path::new("/home/u/src"), "x.c", false));
    }

    #[test]
    fn test_bracket_classes() {
        let matcher = m("file[!0-4]");
        assert!(matcher.matches(Path::new(DIR), "file7", false));
        assert!(!matcher.matches(Path::new(DIR), "file2", false));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(Matcher::parse("/(/"), Err(FlistError::InvalidPattern { .. })));
        assert!(Matcher::parse("").is_err());
        assert!(Matcher::parse_local("a(").is_err());
    }

    #[test]
    fn test_local_smart_case() {
        let lower = Matcher::parse_local("rea").unwrap();
        assert!(lower.matches(Path::new(DIR), "README", false));
        assert_eq!(lower.span("xREAD"), Some((1, 4)));

        let upper = Matcher::parse_local("Rea").unwrap();
        assert!(!upper.matches(Path::new(DIR), "README", false));
    }
}
