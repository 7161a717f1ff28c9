//! The system prompt: where it comes from and how the tool catalog is
//! appended to it.

use sitewright_core::error::{Error, Result};
use sitewright_core::tool::ToolDefinition;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Built-in prompt, used when no prompt file exists.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are Sitewright, an agent that inspects and clones websites.

You work in steps. In every reply, output exactly ONE JSON object and nothing else.

To call a tool:
{"tool": "<tool name>", "params": {...}, "id": "<short id>", "reasoning": "<why>", "expect": ["<what you expect>"]}

Only "tool" is required. After each call you receive a message of the form
{"id": ..., "tool": ..., "ok": true, "result": ...} or {"id": ..., "tool": ..., "ok": false, "error": ...}.
Screenshots arrive as images attached to that message.

When the task is done:
{"final": true, "summary": "<what you did>", "artifacts": ["<files you produced>"], "notes": "<optional caveats>"}

Rules:
- Call one tool at a time and wait for its result.
- Use paths relative to the workspace root.
- Prefer page.extract to learn a page's structure, shots.capture to see it, and files.* to write the clone.
- Never emit both "final" and "tool" in the same object."#;

/// Where the system prompt text comes from.
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    /// Read from a file; a missing file falls back to [`DEFAULT_SYSTEM_PROMPT`].
    File(PathBuf),
    Inline(String),
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::Inline(DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

impl SystemPrompt {
    /// Load the prompt text.
    pub async fn load(&self) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    debug!(path = %path.display(), "Loaded system prompt");
                    Ok(text)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "System prompt file not found, using built-in prompt");
                    Ok(DEFAULT_SYSTEM_PROMPT.to_string())
                }
                Err(e) => Err(Error::Prompt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            },
        }
    }
}

/// Append a catalog of `tools` to `base`.
pub fn with_tool_catalog(base: &str, tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return base.to_string();
    }

    let mut prompt = String::from(base.trim_end());
    prompt.push_str("\n\n## Available tools\n");
    for tool in tools {
        prompt.push_str(&format!(
            "\n- `{}`: {}\n  params schema: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    prompt
}
