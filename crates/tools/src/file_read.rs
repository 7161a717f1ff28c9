//! File read tools — `files.read`, `files.readMany`, `files.exists`.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, required_str, string_list};
use sitewright_security::PathPolicy;

use crate::resolve;

/// Read one UTF-8 file.
pub struct FileReadTool {
    policy: PathPolicy,
}

impl FileReadTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "files.read"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file in the workspace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let path = required_str(&params, "path")?;
        let resolved = resolve(&self.policy, self.name(), path)?;

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read {path}: {e}")))?;

        Ok(ToolOutput::json(json!({
            "path": path,
            "bytes": content.len(),
            "content": content,
        })))
    }
}

/// Read several files; a failure on one path does not fail the others.
pub struct FileReadManyTool {
    policy: PathPolicy,
}

impl FileReadManyTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }

    async fn read_one(&self, path: &str) -> Result<String, String> {
        let resolved = self.policy.resolve(path).map_err(|e| e.to_string())?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tool for FileReadManyTool {
    fn name(&self) -> &str {
        "files.readMany"
    }

    fn description(&self) -> &str {
        "Read several text files at once. Each entry carries either content or an error."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "File paths, relative to the workspace root"
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let paths = string_list(&params, "paths").ok_or_else(|| ToolError::missing_field("paths"))?;

        let mut results = Vec::with_capacity(paths.len());
        for path in &paths {
            let entry = match self.read_one(path).await {
                Ok(content) => json!({ "path": path, "content": content }),
                Err(error) => json!({ "path": path, "error": error }),
            };
            results.push(entry);
        }

        Ok(ToolOutput::json(Value::Array(results)))
    }
}

/// Report whether a path exists and what kind of entry it is.
pub struct FileExistsTool {
    policy: PathPolicy,
}

impl FileExistsTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileExistsTool {
    fn name(&self) -> &str {
        "files.exists"
    }

    fn description(&self) -> &str {
        "Check whether a path exists; reports kind 'file', 'dir', or null."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to check" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let path = required_str(&params, "path")?;
        let resolved = resolve(&self.policy, self.name(), path)?;

        let kind = match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => Some("dir"),
            Ok(_) => Some("file"),
            Err(_) => None,
        };

        Ok(ToolOutput::json(json!({
            "path": path,
            "exists": kind.is_some(),
            "kind": kind,
        })))
    }
}
