//! A conversation bound to an agent loop.

use sitewright_core::error::Result;
use sitewright_core::message::{Conversation, ConversationId};
use std::sync::Arc;

use crate::loop_runner::AgentLoop;
use crate::outcome::TurnOutcome;

/// One user's conversation with the agent, carried across turns.
pub struct Session {
    agent: Arc<AgentLoop>,
    conversation: Conversation,
}

impl Session {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    /// Run one turn; later turns see everything earlier turns produced.
    pub async fn run(&mut self, input: &str) -> Result<TurnOutcome> {
        self.agent.run_turn(&mut self.conversation, input).await
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn id(&self) -> &ConversationId {
        &self.conversation.id
    }
}
