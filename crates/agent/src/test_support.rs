//! Scripted providers and stub tools shared by the agent tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitewright_core::error::{ProviderError, ToolError};
use sitewright_core::message::Message;
use sitewright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sitewright_core::tool::{Tool, ToolOutput, ToolParams};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Replies with each scripted text in turn.
///
/// Once the script runs out it either repeats a fixed reply or fails with
/// a network error.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    requests: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of messages sent with each request.
    pub fn request_sizes(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.messages.len());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;

        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "scripted-model".into(),
        })
    }
}

/// Records the params of every call and returns a fixed value.
pub struct CountingTool {
    name: String,
    result: Value,
    required: Vec<String>,
    calls: Arc<Mutex<Vec<ToolParams>>>,
}

impl CountingTool {
    pub fn new(name: &str, result: Value) -> Self {
        Self {
            name: name.to_string(),
            result,
            required: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requiring(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<ToolParams>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counts calls"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": self.required })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(params);
        Ok(ToolOutput::json(self.result.clone()))
    }
}

/// Always fails with the given reason.
pub struct FailingTool {
    name: String,
    reason: String,
}

impl FailingTool {
    pub fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: ToolParams) -> Result<ToolOutput, ToolError> {
        Err(ToolError::failed(&self.name, &self.reason))
    }
}

/// Writes a tiny PNG and returns it as an image artifact.
pub struct ImageTool {
    path: PathBuf,
}

impl ImageTool {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Tool for ImageTool {
    fn name(&self) -> &str {
        "shots.capture"
    }

    fn description(&self) -> &str {
        "Writes a placeholder screenshot"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": { "url": { "type": "string" } }, "required": ["url"] })
    }

    async fn execute(&self, _params: ToolParams) -> Result<ToolOutput, ToolError> {
        std::fs::write(&self.path, b"\x89PNG\r\n\x1a\n").unwrap();
        Ok(ToolOutput::json(json!({ "shots": 1 })).with_image("desktop (1440x900)", self.path.clone()))
    }
}
