//! File write tools — `files.write` and `files.replace`.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, optional_bool, required_str};
use sitewright_security::PathPolicy;

use crate::resolve;

/// Write or create a file, creating missing parent directories.
pub struct FileWriteTool {
    policy: PathPolicy,
}

impl FileWriteTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "files.write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and its parent directories if needed, overwrites if it exists."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let path = required_str(&params, "path")?;
        let content = required_str(&params, "content")?;
        let resolved = resolve(&self.policy, self.name(), path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::failed(self.name(), format!("Failed to create directory: {e}"))
            })?;
        }

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write {path}: {e}")))?;

        tracing::debug!(path = %resolved.display(), bytes = content.len(), "Wrote file");

        Ok(ToolOutput::json(json!({
            "path": path,
            "bytes": content.len(),
        })))
    }
}

/// Replace literal text inside an existing file.
pub struct FileReplaceTool {
    policy: PathPolicy,
}

impl FileReplaceTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileReplaceTool {
    fn name(&self) -> &str {
        "files.replace"
    }

    fn description(&self) -> &str {
        "Replace literal text in a file. Replaces the first occurrence, or every occurrence when 'all' is true. Fails if the text is not found."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "search": { "type": "string", "description": "Exact text to find" },
                "replace": { "type": "string", "description": "Replacement text" },
                "all": { "type": "boolean", "description": "Replace every occurrence (default false)" }
            },
            "required": ["path", "search", "replace"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let path = required_str(&params, "path")?;
        let search = required_str(&params, "search")?;
        let replace = required_str(&params, "replace")?;
        let all = optional_bool(&params, "all").unwrap_or(false);

        if search.is_empty() {
            return Err(ToolError::InvalidArguments("'search' must not be empty".into()));
        }

        let resolved = resolve(&self.policy, self.name(), path)?;
        let original = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read {path}: {e}")))?;

        let occurrences = original.matches(search).count();
        if occurrences == 0 {
            return Err(ToolError::failed(
                self.name(),
                format!("search text not found in {path}"),
            ));
        }

        let (updated, replacements) = if all {
            (original.replace(search, replace), occurrences)
        } else {
            (original.replacen(search, replace, 1), 1)
        };

        tokio::fs::write(&resolved, updated)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write {path}: {e}")))?;

        Ok(ToolOutput::json(json!({
            "path": path,
            "replacements": replacements,
        })))
    }
}
