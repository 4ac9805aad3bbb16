//! Glob patterns for include/exclude path filtering.
//!
//! Globs are compiled down to anchored regexes: `**` crosses path
//! separators, `*` and `?` stop at them, `[...]` character classes pass
//! through. Paths are matched with forward slashes regardless of platform.

use regex::Regex;

use crate::error::{ArchmapError, Result};

/// A compiled include/exclude glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob into a matcher. Malformed patterns (e.g. an
    /// unterminated character class) are configuration errors.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(ArchmapError::config("empty glob pattern"));
        }
        let regex_src = glob_to_regex(pattern)?;
        let regex = Regex::new(&regex_src).map_err(|e| {
            ArchmapError::config(format!("malformed glob pattern `{pattern}`: {e}"))
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// The match-all pattern substituted when no include is configured.
    pub fn match_all() -> Self {
        Self::compile("**").expect("`**` is a valid glob")
    }

    /// Match a relative path. Backslashes are normalized to forward slashes
    /// so patterns behave identically on Windows.
    pub fn matches(&self, path: &str) -> bool {
        if path.contains('\\') {
            self.regex.is_match(&path.replace('\\', "/"))
        } else {
            self.regex.is_match(path)
        }
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// Translate a glob to an anchored regex source string.
fn glob_to_regex(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` also matches zero directories
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if matches!(inner, '\\' | '^') {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                if !closed {
                    return Err(ArchmapError::config(format!(
                        "malformed glob pattern `{pattern}`: unterminated character class"
                    )));
                }
                out.push(']');
            }
            c if "\\.+()|^$#&-~{}".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out.push('$');
    Ok(out)
}
