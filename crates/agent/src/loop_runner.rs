//! The agent step loop.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde_json::{Value, json};
use sitewright_config::AppConfig;
use sitewright_core::directive::{Directive, ToolCallDirective};
use sitewright_core::error::{Result, ToolError};
use sitewright_core::event::{AgentEvent, EventBus};
use sitewright_core::message::{ContentPart, Conversation, Message};
use sitewright_core::provider::{Provider, ProviderRequest};
use sitewright_core::tool::{ImageArtifact, ToolOutput, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::outcome::TurnOutcome;
use crate::prompt::{SystemPrompt, with_tool_catalog};

/// Default maximum number of model calls per turn.
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Drives one conversation through model calls and tool invocations.
///
/// Immutable once built; share it between sessions with an `Arc`.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Source of the first message of every conversation
    system_prompt: SystemPrompt,

    /// Append tool definitions to the system prompt
    tool_catalog: bool,

    /// Maximum model calls per turn
    max_steps: u32,

    /// Event bus for progress events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with the built-in system prompt.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            tools,
            system_prompt: SystemPrompt::default(),
            tool_catalog: true,
            max_steps: DEFAULT_MAX_STEPS,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// An agent loop configured from `config`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, config.model.clone(), tools)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_steps(config.agent.max_steps)
            .with_tool_catalog(config.agent.tool_catalog)
            .with_system_prompt(SystemPrompt::File(config.system_prompt_path()))
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_tool_catalog(mut self, enabled: bool) -> Self {
        self.tool_catalog = enabled;
        self
    }

    /// Publish progress on `bus` instead of a private bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn system_message(&self) -> Result<Message> {
        let base = self.system_prompt.load().await?;
        let text = if self.tool_catalog {
            with_tool_catalog(&base, &self.tools.definitions())
        } else {
            base
        };
        Ok(Message::system(text))
    }

    /// Run one user turn against `conversation`.
    ///
    /// The system prompt is inserted only into an empty conversation, so
    /// a second turn resumes where the first stopped. Provider failures
    /// propagate; tool failures are reported back to the model.
    pub async fn run_turn(&self, conversation: &mut Conversation, input: &str) -> Result<TurnOutcome> {
        if conversation.is_empty() {
            conversation.push(self.system_message().await?);
        }
        conversation.push(Message::user(input));

        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            max_steps = self.max_steps,
            "Starting turn"
        );
        self.event_bus.publish(AgentEvent::TurnStarted {
            conversation_id: conversation.id.to_string(),
            max_steps: self.max_steps,
            timestamp: Utc::now(),
        });

        for step in 1..=self.max_steps {
            debug!(conversation_id = %conversation.id, step, "Agent step");

            let mut request = ProviderRequest::new(self.model.clone(), conversation.messages().to_vec());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;

            let response = self.provider.complete(request).await?;

            self.event_bus.publish(AgentEvent::ModelReplied {
                step,
                model: response.model.clone(),
                tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
                timestamp: Utc::now(),
            });

            let reply = response.message.text();
            conversation.push(response.message);

            match Directive::parse(&reply) {
                Directive::Final(payload) => {
                    info!(step, summary = %payload.summary, "Turn finished");
                    self.event_bus.publish(AgentEvent::Finished {
                        step,
                        summary: payload.summary.clone(),
                        timestamp: Utc::now(),
                    });
                    return Ok(TurnOutcome::finished(payload));
                }
                Directive::ToolCall(call) => {
                    let message = self.dispatch(step, &call).await;
                    conversation.push(message);
                }
                Directive::None => {
                    debug!(step, "Reply carried no directive");
                    self.event_bus.publish(AgentEvent::NoDirective {
                        step,
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            max_steps = self.max_steps,
            "Step budget exhausted without a final directive"
        );
        self.event_bus.publish(AgentEvent::StepsExhausted {
            max_steps: self.max_steps,
            timestamp: Utc::now(),
        });
        Ok(TurnOutcome::exhausted())
    }

    /// Invoke the requested tool once and build the message that reports back.
    async fn dispatch(&self, step: u32, call: &ToolCallDirective) -> Message {
        if !self.tools.contains(&call.tool) {
            warn!(step, tool = %call.tool, "Model requested an unknown tool");
            self.event_bus.publish(AgentEvent::UnknownTool {
                step,
                tool_name: call.tool.clone(),
                timestamp: Utc::now(),
            });
            let error = format!(
                "unknown tool '{}'. Available tools: {}",
                call.tool,
                self.tools.names().join(", ")
            );
            return Message::user(failure_json(call, &error).to_string());
        }

        debug!(step, tool = %call.tool, "Executing tool");
        let start = std::time::Instant::now();
        let result = self.tools.invoke(&call.tool, call.params.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(AgentEvent::ToolExecuted {
            step,
            tool_name: call.tool.clone(),
            success: result.is_ok(),
            duration_ms,
            error: result.as_ref().err().map(ToString::to_string),
            timestamp: Utc::now(),
        });

        match result {
            Ok(output) => success_message(call, output).await,
            Err(e) => {
                warn!(step, tool = %call.tool, error = %e, "Tool failed");
                Message::user(failure_json(call, &tool_error_text(&e)).to_string())
            }
        }
    }
}

/// The error text shown to the model, without the `Display` prefix.
fn tool_error_text(error: &ToolError) -> String {
    match error {
        ToolError::NotFound(name) => format!("unknown tool '{name}'"),
        ToolError::ExecutionFailed { reason, .. } => reason.clone(),
        ToolError::PermissionDenied { reason, .. } => format!("permission denied: {reason}"),
        ToolError::InvalidArguments(reason) => format!("invalid params: {reason}"),
        ToolError::Timeout { timeout_ms, .. } => format!("timed out after {timeout_ms} ms"),
    }
}

fn failure_json(call: &ToolCallDirective, error: &str) -> Value {
    json!({
        "id": call.id,
        "tool": call.tool,
        "ok": false,
        "error": error,
    })
}

async fn success_message(call: &ToolCallDirective, output: ToolOutput) -> Message {
    let text = json!({
        "id": call.id,
        "tool": call.tool,
        "ok": true,
        "result": output.value,
    })
    .to_string();

    if output.images.is_empty() {
        return Message::user(text);
    }

    let mut parts = vec![ContentPart::text(text)];
    for image in &output.images {
        match image_data_uri(image).await {
            Ok(uri) => parts.push(ContentPart::image(uri)),
            Err(e) => {
                warn!(path = %image.path.display(), error = %e, "Could not attach image");
                parts.push(ContentPart::text(format!(
                    "[image '{}' unavailable: {e}]",
                    image.label
                )));
            }
        }
    }
    Message::user(parts)
}

fn mime_type(image: &ImageArtifact) -> &'static str {
    let ext = image
        .path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

async fn image_data_uri(image: &ImageArtifact) -> std::io::Result<String> {
    let bytes = tokio::fs::read(&image.path).await?;
    Ok(format!("data:{};base64,{}", mime_type(image), BASE64.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingTool, FailingTool, ImageTool, ScriptedProvider};
    use sitewright_core::message::{MessageContent, Role};
    use sitewright_core::tool::ToolParams;

    fn registry(tools: Vec<Box<dyn sitewright_core::Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Arc::new(registry)
    }

    fn parse_user_json(message: &Message) -> Value {
        assert_eq!(message.role, Role::User);
        let text = match &message.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::Text { text } => text.clone(),
                other => panic!("expected leading text part, got {other:?}"),
            },
        };
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn clone_scenario_calls_model_twice_and_tool_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "I'll start by extracting the page.\n```json\n{\"tool\": \"page.extract\", \"params\": {\"url\": \"https://example.com\"}, \"id\": \"s1\"}\n```",
            r#"{"final": true, "summary": "Cloned example.com", "artifacts": ["index.html"]}"#,
        ]));
        let tool = CountingTool::new("page.extract", json!({ "title": "Example Domain" }));
        let calls = tool.calls();
        let agent = AgentLoop::new(provider.clone(), "test-model", registry(vec![Box::new(tool)]));

        let mut conversation = Conversation::new();
        let outcome = agent.run_turn(&mut conversation, "clone example.com").await.unwrap();

        assert!(outcome.is_final);
        let result = outcome.result.unwrap();
        assert_eq!(result.summary, "Cloned example.com");
        assert_eq!(result.artifacts, vec!["index.html"]);

        assert_eq!(provider.call_count(), 2);
        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0]["url"], "https://example.com");

        // system, user, assistant, tool result, assistant
        assert_eq!(conversation.len(), 5);
        let tool_message = parse_user_json(&conversation.messages()[3]);
        assert_eq!(tool_message["ok"], true);
        assert_eq!(tool_message["id"], "s1");
        assert_eq!(tool_message["tool"], "page.extract");
        assert_eq!(tool_message["result"]["title"], "Example Domain");
    }

    #[tokio::test]
    async fn prose_only_replies_exhaust_the_step_budget() {
        let provider = Arc::new(ScriptedProvider::repeating("Let me think about this some more."));
        let tool = CountingTool::new("files.read", json!({}));
        let calls = tool.calls();
        let agent = AgentLoop::new(provider.clone(), "m", registry(vec![Box::new(tool)])).with_max_steps(4);

        let mut conversation = Conversation::new();
        let outcome = agent.run_turn(&mut conversation, "do something").await.unwrap();

        assert_eq!(outcome, TurnOutcome::exhausted());
        assert_eq!(provider.call_count(), 4);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(conversation.len(), 2 + 4);
    }

    #[tokio::test]
    async fn default_step_budget_is_twenty() {
        let provider = Arc::new(ScriptedProvider::repeating("no json here"));
        let agent = AgentLoop::new(provider.clone(), "m", registry(vec![]));

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "go").await.unwrap();
        assert_eq!(provider.call_count(), 20);
    }

    #[tokio::test]
    async fn unknown_tool_gets_a_corrective_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "bogus.tool", "params": {}}"#,
            r#"{"final": true, "summary": "gave up", "artifacts": []}"#,
        ]));
        let read = CountingTool::new("files.read", json!({}));
        let list = CountingTool::new("fs.list", json!([]));
        let (read_calls, list_calls) = (read.calls(), list.calls());
        let agent = AgentLoop::new(
            provider.clone(),
            "m",
            registry(vec![Box::new(read), Box::new(list)]),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.run_turn(&mut conversation, "go").await.unwrap();

        assert!(outcome.is_final);
        assert_eq!(provider.call_count(), 2);
        assert!(read_calls.lock().unwrap().is_empty());
        assert!(list_calls.lock().unwrap().is_empty());
        // system, user, bogus request, correction, final
        assert_eq!(conversation.len(), 5);
        let corrective = parse_user_json(&conversation.messages()[3]);
        assert_eq!(corrective["ok"], false);
        assert_eq!(corrective["tool"], "bogus.tool");
        let error = corrective["error"].as_str().unwrap();
        assert!(error.contains("unknown tool 'bogus.tool'"));
        assert!(error.contains("files.read, fs.list"));
    }

    #[tokio::test]
    async fn tool_failure_is_reported_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "system.run", "params": {"command": "make"}, "id": "b1"}"#,
            r#"{"final": true, "summary": "build failed", "artifacts": []}"#,
        ]));
        let agent = AgentLoop::new(
            provider.clone(),
            "m",
            registry(vec![Box::new(FailingTool::new("system.run", "exit status 2"))]),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.run_turn(&mut conversation, "build").await.unwrap();

        assert!(outcome.is_final);
        let failure = parse_user_json(&conversation.messages()[3]);
        assert_eq!(failure["ok"], false);
        assert_eq!(failure["id"], "b1");
        assert_eq!(failure["error"], "exit status 2");
        assert!(failure.get("result").is_none());
    }

    #[tokio::test]
    async fn schema_violation_is_reported_as_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "files.read", "params": {}}"#,
            r#"{"final": true, "summary": "done", "artifacts": []}"#,
        ]));
        let tool = CountingTool::new("files.read", json!({})).requiring("path");
        let calls = tool.calls();
        let agent = AgentLoop::new(provider, "m", registry(vec![Box::new(tool)]));

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "read").await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        let failure = parse_user_json(&conversation.messages()[3]);
        assert_eq!(failure["ok"], false);
        assert!(failure["error"].as_str().unwrap().contains("requires field 'path'"));
    }

    #[tokio::test]
    async fn final_wins_over_tool_in_the_same_object() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"final": true, "tool": "files.read", "summary": "both", "artifacts": []}"#,
        ]));
        let tool = CountingTool::new("files.read", json!({}));
        let calls = tool.calls();
        let agent = AgentLoop::new(provider.clone(), "m", registry(vec![Box::new(tool)]));

        let mut conversation = Conversation::new();
        let outcome = agent.run_turn(&mut conversation, "go").await.unwrap();

        assert!(outcome.is_final);
        assert_eq!(outcome.result.unwrap().summary, "both");
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn system_prompt_is_inserted_once() {
        let provider = Arc::new(ScriptedProvider::repeating(
            r#"{"final": true, "summary": "ok", "artifacts": []}"#,
        ));
        let agent = AgentLoop::new(provider, "m", registry(vec![]))
            .with_system_prompt(SystemPrompt::Inline("SYSTEM".into()))
            .with_tool_catalog(false);

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "first").await.unwrap();
        agent.run_turn(&mut conversation, "second").await.unwrap();

        let systems: Vec<_> = conversation
            .messages()
            .iter()
            .filter(|m| m.role == Role::System)
            .collect();
        assert_eq!(systems.len(), 1);
        assert_eq!(conversation.messages()[0].text(), "SYSTEM");
        // system, user, final, user, final
        assert_eq!(conversation.len(), 5);
        assert_eq!(conversation.messages()[3].text(), "second");
    }

    #[tokio::test]
    async fn tool_catalog_is_appended_to_system_prompt() {
        let provider = Arc::new(ScriptedProvider::repeating(r#"{"final": true, "summary": ""}"#));
        let agent = AgentLoop::new(
            provider,
            "m",
            registry(vec![Box::new(CountingTool::new("files.read", json!({})))]),
        )
        .with_system_prompt(SystemPrompt::Inline("SYSTEM".into()));

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "go").await.unwrap();

        let system = conversation.messages()[0].text();
        assert!(system.starts_with("SYSTEM"));
        assert!(system.contains("`files.read`"));
    }

    #[tokio::test]
    async fn model_sees_the_whole_conversation_each_step() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "fs.list"}"#,
            r#"{"final": true, "summary": "listed"}"#,
        ]));
        let tool = CountingTool::new("fs.list", json!([]));
        let calls = tool.calls();
        let agent = AgentLoop::new(provider.clone(), "m", registry(vec![Box::new(tool)]));

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "list").await.unwrap();

        assert_eq!(provider.request_sizes(), vec![2, 4]);
        // Absent params arrive as an empty map
        assert_eq!(calls.lock().unwrap().as_slice(), &[ToolParams::new()]);
    }

    #[tokio::test]
    async fn image_artifacts_become_inline_image_parts() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "shots.capture", "params": {"url": "https://example.com"}}"#,
            r#"{"final": true, "summary": "seen"}"#,
        ]));
        let agent = AgentLoop::new(
            provider,
            "m",
            registry(vec![Box::new(ImageTool::new(dir.path().join("desktop.png")))]),
        );

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "look").await.unwrap();

        let message = &conversation.messages()[3];
        assert_eq!(message.content.image_count(), 1);
        let MessageContent::Parts(parts) = &message.content else {
            panic!("expected multi-part content");
        };
        let ContentPart::Image { url } = &parts[1] else {
            panic!("expected image part");
        };
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(parse_user_json(message)["ok"], true);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = AgentLoop::new(provider, "m", registry(vec![]));

        let mut conversation = Conversation::new();
        let result = agent.run_turn(&mut conversation, "go").await;
        assert!(matches!(result, Err(sitewright_core::Error::Provider(_))));
        // The user input stays recorded
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn events_trace_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "files.read", "params": {"path": "a"}}"#,
            "hmm",
            r#"{"final": true, "summary": "done"}"#,
        ]));
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let agent = AgentLoop::new(
            provider,
            "m",
            registry(vec![Box::new(CountingTool::new("files.read", json!({})))]),
        )
        .with_event_bus(bus);

        let mut conversation = Conversation::new();
        agent.run_turn(&mut conversation, "go").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                AgentEvent::TurnStarted { .. } => "start",
                AgentEvent::ModelReplied { .. } => "reply",
                AgentEvent::ToolExecuted { success: true, .. } => "tool",
                AgentEvent::ToolExecuted { .. } => "tool-failed",
                AgentEvent::NoDirective { .. } => "none",
                AgentEvent::UnknownTool { .. } => "unknown",
                AgentEvent::Finished { .. } => "finished",
                AgentEvent::StepsExhausted { .. } => "exhausted",
            });
        }
        assert_eq!(
            kinds,
            vec!["start", "reply", "tool", "reply", "none", "reply", "finished"]
        );
    }

    #[test]
    fn timeouts_are_reported_in_milliseconds() {
        let error = ToolError::Timeout {
            tool_name: "system.run".into(),
            timeout_ms: 100,
        };
        assert_eq!(tool_error_text(&error), "timed out after 100 ms");
    }

    #[test]
    fn mime_types_follow_extension() {
        let artifact = |p: &str| ImageArtifact {
            label: "x".into(),
            path: p.into(),
        };
        assert_eq!(mime_type(&artifact("a.PNG")), "image/png");
        assert_eq!(mime_type(&artifact("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type(&artifact("a.webp")), "image/webp");
        assert_eq!(mime_type(&artifact("noext")), "image/png");
    }
}
