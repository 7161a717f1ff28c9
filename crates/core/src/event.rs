//! Agent events — progress notifications published by the agent loop.
//!
//! The loop never waits on subscribers; a front end (the interactive shell)
//! subscribes to print per-step progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything the agent loop reports while running a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// A user turn started
    TurnStarted {
        conversation_id: String,
        max_steps: u32,
        timestamp: DateTime<Utc>,
    },

    /// The model replied for step `step`
    ModelReplied {
        step: u32,
        model: String,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// The reply held no parseable directive
    NoDirective {
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// The model asked for a tool that is not registered
    UnknownTool {
        step: u32,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        step: u32,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a final directive
    Finished {
        step: u32,
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// The step budget ran out without a final directive
    StepsExhausted {
        max_steps: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
