//! Built-in tool implementations for Sitewright.
//!
//! Tools give the agent the ability to interact with the world:
//! outline web pages, screenshot them, read/write/search workspace
//! files, and run shell commands.
//!
//! Every filesystem path goes through the workspace [`PathPolicy`].

pub mod file_read;
pub mod file_search;
pub mod file_write;
pub mod fs_list;
pub mod glob;
pub mod page_extract;
pub mod screenshot;
pub mod system_run;

use sitewright_config::AppConfig;
use sitewright_core::error::ToolError;
use sitewright_core::tool::ToolRegistry;
use sitewright_security::PathPolicy;
use std::path::PathBuf;

pub use screenshot::{HeadlessChrome, ScreenshotBackend, ShotsCaptureTool};

/// Resolve a tool path against the workspace, as a permission error on failure.
pub(crate) fn resolve(policy: &PathPolicy, tool_name: &str, path: &str) -> Result<PathBuf, ToolError> {
    policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    })
}

/// The workspace policy described by `config.workspace`.
pub fn workspace_policy(config: &AppConfig) -> PathPolicy {
    PathPolicy::new(
        &config.workspace.root,
        config.workspace.allowed_roots.clone(),
        config.workspace.forbidden_paths.clone(),
    )
}

/// Tools that only touch the workspace filesystem.
pub fn file_tools(policy: &PathPolicy) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(file_read::FileReadTool::new(policy.clone())));
    registry.register(Box::new(file_read::FileReadManyTool::new(policy.clone())));
    registry.register(Box::new(file_read::FileExistsTool::new(policy.clone())));
    registry.register(Box::new(file_write::FileWriteTool::new(policy.clone())));
    registry.register(Box::new(file_write::FileReplaceTool::new(policy.clone())));
    registry.register(Box::new(file_search::FileSearchTool::new(policy.clone())));
    registry.register(Box::new(fs_list::ListDirTool::new(policy.clone())));
    registry.register(Box::new(fs_list::GlobTool::new(policy.clone())));
    registry.register(Box::new(fs_list::GlobWithStatsTool::new(policy.clone())));
    registry
}

/// Create the tool registry with all built-in tools.
///
/// Security defaults:
/// - File tools: confined to `workspace.root`, sensitive paths blocked
/// - `system.run`: `shell.allowed_commands` (empty = any command), with a timeout
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let policy = workspace_policy(config);
    let mut registry = file_tools(&policy);
    registry.register(Box::new(page_extract::PageExtractTool::new(&config.extract)));
    registry.register(Box::new(ShotsCaptureTool::headless(policy.clone(), &config.capture)));
    registry.register(Box::new(system_run::SystemRunTool::new(policy, &config.shell)));
    registry
}
