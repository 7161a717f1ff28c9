//! Directory tools — `fs.list`, `fs.glob`, `fs.globWithStats`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, optional_str, required_str};
use sitewright_security::PathPolicy;
use std::path::{Path, PathBuf};

use crate::glob::{self, GlobPattern};
use crate::resolve;

/// List one directory level.
pub struct ListDirTool {
    policy: PathPolicy,
}

impl ListDirTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

fn kind_of(file_type: std::fs::FileType) -> &'static str {
    if file_type.is_dir() {
        "dir"
    } else if file_type.is_symlink() {
        "symlink"
    } else {
        "file"
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "fs.list"
    }

    fn description(&self) -> &str {
        "List the entries of a directory (default: workspace root), sorted by name."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list" }
            }
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let path = optional_str(&params, "path").unwrap_or(".");
        let dir = if path == "." {
            self.policy.root().to_path_buf()
        } else {
            resolve(&self.policy, self.name(), path)?
        };

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to list {path}: {e}")))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::failed(self.name(), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ToolError::failed(self.name(), e))?;
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                kind_of(file_type),
                size,
            ));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let listing: Vec<Value> = entries
            .into_iter()
            .map(|(name, kind, size)| json!({ "name": name, "kind": kind, "size": size }))
            .collect();

        Ok(ToolOutput::json(Value::Array(listing)))
    }
}

fn glob_base(policy: &PathPolicy, tool: &str, params: &ToolParams) -> Result<PathBuf, ToolError> {
    match optional_str(params, "cwd") {
        Some(cwd) if cwd != "." => resolve(policy, tool, cwd),
        _ => Ok(policy.root().to_path_buf()),
    }
}

fn compile(params: &ToolParams) -> Result<GlobPattern, ToolError> {
    let pattern = required_str(params, "pattern")?;
    GlobPattern::new(pattern)
        .map_err(|e| ToolError::InvalidArguments(format!("invalid glob '{pattern}': {e}")))
}

/// Matching entries below `base`, as sorted relative paths.
fn glob_matches(base: &Path, pattern: &GlobPattern) -> Vec<(String, PathBuf)> {
    let mut found: Vec<(String, PathBuf)> = glob::walk(base)
        .filter_map(|e| {
            let rel = glob::relative(base, e.path());
            pattern.is_match(&rel).then(|| (rel, e.into_path()))
        })
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

const GLOB_SCHEMA_PATTERN: &str = "Glob relative to cwd: '*' and '?' within a segment, '**' across segments, '{a,b}' alternation";

/// Paths matching a glob.
pub struct GlobTool {
    policy: PathPolicy,
}

impl GlobTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "fs.glob"
    }

    fn description(&self) -> &str {
        "Find files and directories matching a glob pattern. Returns sorted paths relative to cwd."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": GLOB_SCHEMA_PATTERN },
                "cwd": { "type": "string", "description": "Directory the pattern is relative to (default: workspace root)" }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let pattern = compile(&params)?;
        let base = glob_base(&self.policy, self.name(), &params)?;

        let paths = tokio::task::spawn_blocking(move || {
            glob_matches(&base, &pattern)
                .into_iter()
                .map(|(rel, _)| Value::String(rel))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ToolError::failed("fs.glob", e))?;

        Ok(ToolOutput::json(Value::Array(paths)))
    }
}

/// Paths matching a glob, with size, directory flag and modification time.
pub struct GlobWithStatsTool {
    policy: PathPolicy,
}

impl GlobWithStatsTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for GlobWithStatsTool {
    fn name(&self) -> &str {
        "fs.globWithStats"
    }

    fn description(&self) -> &str {
        "Like fs.glob, but each entry carries size, isDir, and modified (RFC 3339)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": GLOB_SCHEMA_PATTERN },
                "cwd": { "type": "string", "description": "Directory the pattern is relative to (default: workspace root)" }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let pattern = compile(&params)?;
        let base = glob_base(&self.policy, self.name(), &params)?;

        let entries = tokio::task::spawn_blocking(move || {
            glob_matches(&base, &pattern)
                .into_iter()
                .filter_map(|(rel, path)| {
                    let meta = std::fs::symlink_metadata(&path).ok()?;
                    let modified = meta
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());
                    Some(json!({
                        "path": rel,
                        "size": meta.len(),
                        "isDir": meta.is_dir(),
                        "modified": modified,
                    }))
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ToolError::failed("fs.globWithStats", e))?;

        Ok(ToolOutput::json(Value::Array(entries)))
    }
}
