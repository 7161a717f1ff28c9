//! Directives — the structured intent parsed from one model reply.
//!
//! The model is asked to answer with a single JSON object, but its output is
//! prose at heart: the object may be wrapped in a fenced code block or
//! surrounded by commentary. [`extract_json`] is permissive about the
//! surroundings and strict about the object itself; [`Directive::classify`]
//! turns the object into exactly one variant.
//!
//! Tool call wire format:
//! `{"tool": "...", "params": {...}, "id": "...", "reasoning": "...", "expect": [...]}`
//!
//! Final wire format:
//! `{"final": true, "summary": "...", "artifacts": [...], "notes": "..."}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use crate::tool::ToolParams;

const FENCE: &str = "```";

/// A request from the model to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDirective {
    pub tool: String,

    #[serde(default)]
    pub params: ToolParams,

    /// Correlation token echoed back in the tool result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Vec<String>>,
}

/// The payload of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    /// Always `true` on the wire.
    #[serde(rename = "final")]
    pub is_final: bool,

    pub summary: String,

    #[serde(default)]
    pub artifacts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl FinalPayload {
    pub fn new(summary: impl Into<String>, artifacts: Vec<String>) -> Self {
        Self {
            is_final: true,
            summary: summary.into(),
            artifacts,
            notes: None,
        }
    }
}

/// Exactly one of: a tool call, a final answer, or nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    ToolCall(ToolCallDirective),
    Final(FinalPayload),
    /// No parseable JSON object. The loop simply moves on.
    None,
}

impl Directive {
    /// Extract and classify the directive in a raw model reply.
    pub fn parse(text: &str) -> Self {
        match extract_json(text) {
            Some(value) => Self::classify(&value),
            None => Self::None,
        }
    }

    /// Classify a parsed JSON value.
    ///
    /// `"final": true` wins over `"tool"`; a string `"tool"` field makes a
    /// tool call; anything else is `None`.
    pub fn classify(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::None;
        };

        let tool = obj.get("tool").and_then(Value::as_str);

        if obj.get("final") == Some(&Value::Bool(true)) {
            if let Some(tool) = tool {
                warn!(tool, "Reply carries both \"final\": true and a tool call; treating it as final");
            }
            return Self::Final(FinalPayload {
                is_final: true,
                summary: obj
                    .get("summary")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                artifacts: strings(obj.get("artifacts")).unwrap_or_default(),
                notes: obj.get("notes").and_then(Value::as_str).map(str::to_string),
            });
        }

        let Some(tool) = tool else {
            return Self::None;
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => ToolParams::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                debug!(tool, params = %other, "Ignoring non-object params");
                ToolParams::new()
            }
        };

        Self::ToolCall(ToolCallDirective {
            tool: tool.to_string(),
            params,
            id: obj.get("id").and_then(Value::as_str).map(str::to_string),
            reasoning: obj.get("reasoning").and_then(Value::as_str).map(str::to_string),
            expect: strings(obj.get("expect")),
        })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

fn strings(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Locate and parse one JSON value in free-form model text.
///
/// 1. trim; 2. if a fenced block exists, keep only its inner content;
/// 3. parse; 4. else parse from the first `{` to the last `}`; 5. else `None`.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let candidate = fenced_block(trimmed).unwrap_or(trimmed).trim();

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&candidate[start..=end]).ok()
}

/// Inner content of the first complete fenced block, without its language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_fence = &text[open + FENCE.len()..];
    let tag_len = after_fence
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '+')))
        .unwrap_or(after_fence.len());
    let body = &after_fence[tag_len..];
    let close = body.find(FENCE)?;
    Some(&body[..close])
}
