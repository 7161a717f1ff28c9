//! File search tool — regex search over workspace text files.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, optional_str, optional_u64, required_str};
use sitewright_security::PathPolicy;
use std::path::{Path, PathBuf};

use crate::glob::{self, GlobPattern};
use crate::resolve;

const DEFAULT_MAX_RESULTS: usize = 100;
/// Files larger than this are not searched.
const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
/// Matched lines are cut to this many characters.
const MAX_LINE_CHARS: usize = 240;

pub struct FileSearchTool {
    policy: PathPolicy,
}

impl FileSearchTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "files.search"
    }

    fn description(&self) -> &str {
        "Search text files for a regular expression. Returns matching lines with their path and 1-based line number."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Regular expression to search for" },
                "path": { "type": "string", "description": "File or directory to search (default: workspace root)" },
                "glob": { "type": "string", "description": "Only search files matching this glob, e.g. '*.html' or 'src/**/*.css'" },
                "maxResults": { "type": "integer", "description": "Stop after this many matches (default 100)" }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let pattern = required_str(&params, "pattern")?;
        let regex = Regex::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid regex '{pattern}': {e}")))?;
        let filter = optional_str(&params, "glob")
            .map(|g| {
                GlobPattern::new(g)
                    .map(|p| (p, g.contains('/')))
                    .map_err(|e| ToolError::InvalidArguments(format!("invalid glob '{g}': {e}")))
            })
            .transpose()?;
        let max_results = optional_u64(&params, "maxResults")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let base = match optional_str(&params, "path") {
            Some(path) => resolve(&self.policy, self.name(), path)?,
            None => self.policy.root().to_path_buf(),
        };
        let root = self.policy.root().to_path_buf();

        let (matches, truncated) = tokio::task::spawn_blocking(move || {
            search(&root, &base, &regex, filter.as_ref(), max_results)
        })
        .await
        .map_err(|e| ToolError::failed("files.search", e))?;

        Ok(ToolOutput::json(json!({
            "matches": matches,
            "truncated": truncated,
        })))
    }
}

fn candidate_files(base: &Path) -> Vec<PathBuf> {
    if base.is_file() {
        return vec![base.to_path_buf()];
    }
    glob::walk(base)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn search(
    root: &Path,
    base: &Path,
    regex: &Regex,
    filter: Option<&(GlobPattern, bool)>,
    max_results: usize,
) -> (Vec<Value>, bool) {
    let mut matches = Vec::new();

    for file in candidate_files(base) {
        if let Some((glob, match_full_path)) = filter {
            let subject = if *match_full_path {
                glob::relative(base, &file)
            } else {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            };
            if !glob.is_match(&subject) {
                continue;
            }
        }

        if std::fs::metadata(&file).is_ok_and(|m| m.len() > MAX_FILE_BYTES) {
            continue;
        }
        // Binary and non-UTF-8 files are skipped
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        for (idx, line) in content.lines().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if matches.len() >= max_results {
                return (matches, true);
            }
            matches.push(json!({
                "path": glob::relative(root, &file),
                "line": idx + 1,
                "text": line.trim().chars().take(MAX_LINE_CHARS).collect::<String>(),
            }));
        }
    }

    (matches, false)
}
