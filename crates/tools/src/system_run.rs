//! `system.run` — execute a shell command in the workspace.
//!
//! Supports command allowlisting, a working directory inside the
//! workspace, output capping, and a timeout.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitewright_config::ShellConfig;
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, optional_str, optional_u64, required_str};
use sitewright_security::PathPolicy;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::resolve;

/// Shell syntax that runs a nested command the allowlist cannot see.
const SUBSTITUTIONS: &[&str] = &["`", "$(", "<(", ">("];

/// Execute shell commands with safety constraints.
pub struct SystemRunTool {
    policy: PathPolicy,
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl SystemRunTool {
    pub fn new(policy: PathPolicy, config: &ShellConfig) -> Self {
        Self {
            policy,
            allowed_commands: config.allowed_commands.clone(),
            default_timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Every command in a `;`, `&&`, `||`, `|` or newline chain must be
    /// allowlisted. Command substitution is refused outright.
    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        if SUBSTITUTIONS.iter().any(|s| command.contains(s)) {
            return false;
        }

        command
            .split(['&', '|', ';', '\n', '\r'])
            .filter_map(|segment| segment.split_whitespace().next())
            .all(|base_cmd| self.allowed_commands.iter().any(|a| a == base_cmd))
    }

    fn truncate(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        if text.len() <= self.max_output_bytes {
            return text.into_owned();
        }
        let mut end = self.max_output_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n[truncated {} bytes]", &text[..end], text.len() - end)
    }
}

#[async_trait]
impl Tool for SystemRunTool {
    fn name(&self) -> &str {
        "system.run"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its exit code, stdout and stderr. Use this for build steps, package managers, git, etc."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory, relative to the workspace root"
                },
                "timeoutMs": {
                    "type": "integer",
                    "description": "Kill the command after this many milliseconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let command = required_str(&params, "command")?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        let cwd = match optional_str(&params, "cwd") {
            Some(dir) => resolve(&self.policy, self.name(), dir)?,
            None => self.policy.root().to_path_buf(),
        };
        let timeout = optional_u64(&params, "timeoutMs")
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        debug!(command = %command, cwd = %cwd.display(), "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&cwd).kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::failed(self.name(), e)),
            Err(_) => {
                warn!(command = %command, timeout_ms = timeout.as_millis() as u64, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: self.name().into(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            warn!(command = %command, exit_code, "Command failed");
        }

        Ok(ToolOutput::json(json!({
            "command": command,
            "exitCode": exit_code,
            "stdout": self.truncate(&output.stdout),
            "stderr": self.truncate(&output.stderr),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    fn tool_with(allowed: &[&str]) -> SystemRunTool {
        let config = ShellConfig {
            allowed_commands: allowed.iter().map(|s| s.to_string()).collect(),
            ..ShellConfig::default()
        };
        SystemRunTool::new(PathPolicy::unrestricted(std::env::temp_dir()), &config)
    }

    #[test]
    fn allowlist_check() {
        let tool = tool_with(&["ls", "cat", "git"]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("cat file.txt"));
        assert!(tool.is_command_allowed("git status && ls"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed("ls; rm -rf /"));
        assert!(!tool.is_command_allowed("cat x | sh"));
    }

    #[test]
    fn allowlist_covers_newlines_and_substitution() {
        let tool = tool_with(&["echo"]);
        assert!(!tool.is_command_allowed("echo hi\ntouch pwned"));
        assert!(!tool.is_command_allowed("echo hi\r\ntouch pwned"));
        assert!(!tool.is_command_allowed("echo $(touch pwned)"));
        assert!(!tool.is_command_allowed("echo `touch pwned`"));
        assert!(!tool.is_command_allowed("echo <(touch pwned)"));
        assert!(tool.is_command_allowed("echo hi\necho there"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn newline_chained_command_is_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShellConfig {
            allowed_commands: vec!["echo".into()],
            ..ShellConfig::default()
        };
        let tool = SystemRunTool::new(PathPolicy::unrestricted(dir.path()), &config);

        for command in ["echo hi\ntouch pwned", "echo $(touch pwned)"] {
            let result = tool.execute(params(json!({ "command": command }))).await;
            assert!(matches!(result, Err(ToolError::PermissionDenied { .. })), "{command:?}");
        }
        assert!(!dir.path().join("pwned").exists());
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = tool_with(&[]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[test]
    fn output_is_capped() {
        let config = ShellConfig {
            max_output_bytes: 4,
            ..ShellConfig::default()
        };
        let tool = SystemRunTool::new(PathPolicy::unrestricted("."), &config);
        let text = tool.truncate(b"abcdefgh");
        assert!(text.starts_with("abcd\n"));
        assert!(text.contains("truncated 4 bytes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let tool = tool_with(&[]);
        let out = tool
            .execute(params(json!({ "command": "echo hello" })))
            .await
            .unwrap();
        assert_eq!(out.value["exitCode"], 0);
        assert_eq!(out.value["stdout"], "hello\n");
        assert_eq!(out.value["command"], "echo hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let tool = tool_with(&[]);
        let out = tool
            .execute(params(json!({ "command": "echo oops >&2; exit 3" })))
            .await
            .unwrap();
        assert_eq!(out.value["exitCode"], 3);
        assert_eq!(out.value["stderr"], "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        std::fs::write(dir.path().join("site/marker.txt"), "").unwrap();

        let tool = SystemRunTool::new(PathPolicy::unrestricted(dir.path()), &ShellConfig::default());
        let out = tool
            .execute(params(json!({ "command": "ls", "cwd": "site" })))
            .await
            .unwrap();
        assert!(out.value["stdout"].as_str().unwrap().contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_command() {
        let tool = tool_with(&[]);
        let result = tool
            .execute(params(json!({ "command": "sleep 5", "timeoutMs": 100 })))
            .await;
        match result {
            Err(ToolError::Timeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 100),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_command() {
        let tool = tool_with(&["ls"]);
        let result = tool
            .execute(params(json!({ "command": "rm -rf /" })))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
