//! `shots.capture` — screenshot a page at several viewport sizes.
//!
//! Rendering sits behind [`ScreenshotBackend`]; the default backend drives
//! a headless Chromium through its `--screenshot` command-line mode.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitewright_config::{CaptureConfig, Viewport};
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, optional_str, required_str, string_list};
use sitewright_security::PathPolicy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

/// Renders a URL to a PNG file.
#[async_trait]
pub trait ScreenshotBackend: Send + Sync {
    async fn capture(&self, url: &Url, viewport: &Viewport, out: &Path) -> Result<(), ToolError>;
}

/// Headless Chromium (or Chrome) invoked once per screenshot.
pub struct HeadlessChrome {
    browser: String,
    timeout: Duration,
}

impl HeadlessChrome {
    pub fn new(browser: impl Into<String>, timeout: Duration) -> Self {
        Self {
            browser: browser.into(),
            timeout,
        }
    }

    fn args(url: &Url, viewport: &Viewport, out: &Path) -> Vec<String> {
        vec![
            "--headless=new".into(),
            "--disable-gpu".into(),
            "--hide-scrollbars".into(),
            "--no-first-run".into(),
            "--mute-audio".into(),
            format!("--window-size={},{}", viewport.width, viewport.height),
            format!("--screenshot={}", out.display()),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl ScreenshotBackend for HeadlessChrome {
    async fn capture(&self, url: &Url, viewport: &Viewport, out: &Path) -> Result<(), ToolError> {
        debug!(browser = %self.browser, url = %url, viewport = %viewport.name, "Capturing screenshot");

        // A leftover file from an earlier run must not pass for this capture
        match tokio::fs::remove_file(out).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ToolError::failed(
                    "shots.capture",
                    format!("could not replace {}: {e}", out.display()),
                ));
            }
        }

        let mut cmd = Command::new(&self.browser);
        cmd.args(Self::args(url, viewport, out)).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::failed(
                    "shots.capture",
                    format!("could not start '{}': {e}", self.browser),
                ));
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "shots.capture".into(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        if !output.status.success() || !out.exists() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), "Browser did not produce a screenshot");
            return Err(ToolError::failed(
                "shots.capture",
                format!("browser exited with {:?}: {}", output.status.code(), stderr.trim()),
            ));
        }
        Ok(())
    }
}

/// Capture a page at the configured viewports.
pub struct ShotsCaptureTool {
    backend: Arc<dyn ScreenshotBackend>,
    policy: PathPolicy,
    viewports: Vec<Viewport>,
    output_dir: PathBuf,
}

impl ShotsCaptureTool {
    pub fn new(backend: Arc<dyn ScreenshotBackend>, policy: PathPolicy, config: &CaptureConfig) -> Self {
        Self {
            backend,
            policy,
            viewports: config.viewports.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// A tool backed by the configured headless browser.
    pub fn headless(policy: PathPolicy, config: &CaptureConfig) -> Self {
        let backend = HeadlessChrome::new(&config.browser, Duration::from_secs(config.timeout_secs));
        Self::new(Arc::new(backend), policy, config)
    }

    fn select_viewports(&self, names: Option<Vec<String>>) -> Result<Vec<Viewport>, ToolError> {
        let Some(names) = names.filter(|n| !n.is_empty()) else {
            return Ok(self.viewports.clone());
        };
        names
            .iter()
            .map(|name| {
                self.viewports
                    .iter()
                    .find(|v| v.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .ok_or_else(|| {
                        let known: Vec<&str> = self.viewports.iter().map(|v| v.name.as_str()).collect();
                        ToolError::InvalidArguments(format!(
                            "unknown viewport '{name}'. Known viewports: {}",
                            known.join(", ")
                        ))
                    })
            })
            .collect()
    }
}

/// `https://www.example.com/a/b` → `www.example.com-a-b`
fn file_stem(url: &Url) -> String {
    let raw = format!("{}{}", url.host_str().unwrap_or("page"), url.path());
    let stem: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    let mut collapsed = String::with_capacity(stem.len());
    for c in stem.chars() {
        if !(c == '-' && collapsed.ends_with('-')) {
            collapsed.push(c);
        }
    }
    collapsed
}

#[async_trait]
impl Tool for ShotsCaptureTool {
    fn name(&self) -> &str {
        "shots.capture"
    }

    fn description(&self) -> &str {
        "Screenshot a URL at one or more viewport sizes. The images are attached to the tool result so you can see them."
    }

    fn parameters_schema(&self) -> Value {
        let names: Vec<&str> = self.viewports.iter().map(|v| v.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http(s) URL to capture" },
                "viewports": {
                    "type": "array",
                    "items": { "type": "string", "enum": names },
                    "description": "Viewport names (default: all)"
                },
                "outDir": { "type": "string", "description": "Output directory, relative to the workspace root" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let raw = required_str(&params, "url")?;
        let url = Url::parse(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid url '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let viewports = self.select_viewports(string_list(&params, "viewports"))?;
        let out_dir = match optional_str(&params, "outDir") {
            Some(dir) => dir.to_string(),
            None => self.output_dir.to_string_lossy().into_owned(),
        };
        let out_dir = crate::resolve(&self.policy, self.name(), &out_dir)?;
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to create {}: {e}", out_dir.display())))?;

        let stem = file_stem(&url);
        let mut shots = Vec::with_capacity(viewports.len());
        let mut output = ToolOutput::json(Value::Null);

        for viewport in &viewports {
            let path = out_dir.join(format!("{stem}-{}.png", viewport.name));
            self.backend.capture(&url, viewport, &path).await?;

            shots.push(json!({
                "viewport": viewport.name,
                "width": viewport.width,
                "height": viewport.height,
                "path": self.policy.display(&path),
            }));
            output = output.with_image(
                format!("{} ({}x{})", viewport.name, viewport.width, viewport.height),
                path,
            );
        }

        output.value = json!({ "url": raw, "shots": shots });
        Ok(output)
    }
}
