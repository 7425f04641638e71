//! Glob patterns for the validation command map.
//!
//! Supported syntax: `*` (within one path segment), `**` (any depth), `?`,
//! and `{a,b}` alternation. A pattern without `/` matches the file name only.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
    file_name_only: bool,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .with_context(|| format!("compile glob pattern '{pattern}'"))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
            file_name_only: !pattern.contains('/'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a project-relative path.
    pub fn matches(&self, relative: &Path) -> bool {
        if self.file_name_only {
            return relative
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.regex.is_match(name));
        }
        let normalized = relative.to_string_lossy().replace('\\', "/");
        self.regex.is_match(&normalized)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut brace_depth = 0usize;

    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}
