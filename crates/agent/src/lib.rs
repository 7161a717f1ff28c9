//! The Sitewright agent loop.
//!
//! Each turn follows the same cycle:
//!
//! 1. **Seed** an empty conversation with the system prompt (plus the tool catalog)
//! 2. **Ask** the model for its next reply, sending the whole conversation
//! 3. **Classify** the reply: a final answer, one tool call, or neither
//! 4. **Act** on a tool call and feed the result back as a user message
//!
//! The loop stops at the first final answer or after `max_steps` model calls.

pub mod loop_runner;
pub mod outcome;
pub mod prompt;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_STEPS};
pub use outcome::TurnOutcome;
pub use prompt::{DEFAULT_SYSTEM_PROMPT, SystemPrompt, with_tool_catalog};
pub use session::Session;
