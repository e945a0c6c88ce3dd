// src/exclude.rs
//! Compiles `--exclude` glob-like patterns into a single substring-matched
//! regex, the way the walker's exclude test expects.

use crate::error::Result;
use regex::Regex;

/// A compiled set of exclude patterns, or none.
pub struct ExcludeSet {
    regex: Option<Regex>,
}

impl ExcludeSet {
    /// Compile zero or more patterns into one alternation. An empty input
    /// excludes nothing.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { regex: None });
        }
        let joined = patterns
            .iter()
            .map(|p| translate(p))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            regex: Some(Regex::new(&joined)?),
        })
    }

    /// Substring-match a relative path against the compiled patterns.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|re| re.is_match(relative_path))
    }
}

/// Translate one glob-like exclude pattern into a regex fragment, anchored
/// either at the root (`/name` -> `^/name$`) or at any depth (`name` ->
/// `/name$`).
///
/// Only patterns containing a wildcard character get token-substituted;
/// a plain literal name passes through unescaped. That mirrors the
/// reference tool's own translation, which never escapes a pattern that
/// has no wildcard in it.
fn translate(pattern: &str) -> String {
    let core = if pattern.contains(['*', '?', '[']) {
        substitute_wildcards(pattern)
    } else {
        pattern.to_string()
    };

    if pattern.starts_with('/') {
        format!("^{core}$")
    } else {
        format!("/{core}$")
    }
}

fn substitute_wildcards(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '*' && chars.get(i + 1) == Some(&'*') {
            out.push_str(".*");
            i += 2;
            continue;
        }
        match chars[i] {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => out.push('['),
            '.' | '^' | '$' | '+' | '{' | '\\' | '|' | '(' => {
                out.push('\\');
                out.push(chars[i]);
            }
            c => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_patterns_excludes_nothing() {
        let set = ExcludeSet::compile(&[]).unwrap();
        assert!(!set.is_excluded("/anything"));
    }

    #[test]
    fn anchored_double_star_matches_any_depth_under_prefix() {
        let set = ExcludeSet::compile(&["/dir/**".to_string()]).unwrap();
        assert!(set.is_excluded("/dir/a.txt"));
        assert!(set.is_excluded("/dir/sub/b.bin"));
        assert!(!set.is_excluded("/other/dir/a.txt"));
    }

    #[test]
    fn unanchored_literal_matches_final_segment_at_any_depth() {
        let set = ExcludeSet::compile(&["name".to_string()]).unwrap();
        assert!(set.is_excluded("/a/b/name"));
        assert!(set.is_excluded("/name"));
        assert!(!set.is_excluded("/name-suffix"));
    }

    #[test]
    fn star_does_not_cross_slash() {
        let set = ExcludeSet::compile(&["*.tmp".to_string()]).unwrap();
        assert!(set.is_excluded("/a/b.tmp"));
        assert!(!set.is_excluded("/a/b.tmp/c"));
    }

    #[test]
    fn multiple_patterns_are_joined() {
        let set =
            ExcludeSet::compile(&["/dir/**".to_string(), "*.tmp".to_string()]).unwrap();
        assert!(set.is_excluded("/dir/file"));
        assert!(set.is_excluded("/other.tmp"));
        assert!(!set.is_excluded("/keep.txt"));
    }
}
