//! Glob patterns and directory walking shared by the `fs.*` and
//! `files.search` tools.
//!
//! Patterns match '/'-separated paths relative to the walk base:
//! `*` and `?` stay within one segment, `**` spans segments,
//! `{a,b}` is alternation, and `[...]` is a character class.

use regex::Regex;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(pattern))?;
        Ok(Self { regex })
    }

    /// Whether a '/'-separated relative path matches.
    pub fn is_match(&self, relative: &str) -> bool {
        self.regex.is_match(relative)
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    let mut brace_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
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
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            '[' => {
                let rest: String = chars.clone().collect();
                match rest.find(']') {
                    Some(end) if end > 0 => {
                        let class = &rest[..end];
                        out.push('[');
                        let body = match class.strip_prefix('!') {
                            Some(negated) => {
                                out.push('^');
                                negated
                            }
                            None => class,
                        };
                        out.push_str(&body.replace('\\', "\\\\"));
                        out.push(']');
                        for _ in 0..=class.chars().count() {
                            chars.next();
                        }
                    }
                    _ => out.push_str(&regex::escape("[")),
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    // Unbalanced braces: close them so the regex still compiles
    for _ in 0..brace_depth {
        out.push(')');
    }

    out.push('$');
    out
}

/// Every entry below `base`, excluding `base` itself and skipped directories.
pub fn walk(base: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(base)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !SKIPPED_DIRS.contains(&name.as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() > 0)
}

/// `path` relative to `base`, with forward slashes.
pub fn relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
