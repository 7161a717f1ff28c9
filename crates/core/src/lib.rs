//! # Sitewright Core
//!
//! Domain types, traits, and error definitions for the Sitewright agent.
//! This crate has no HTTP, filesystem, or CLI dependencies — it defines the
//! domain model the other crates implement against.
//!
//! - [`message`]: role-tagged messages with text or multi-part content, and
//!   the append-only [`Conversation`]
//! - [`directive`]: JSON directive extraction from free-form model replies
//! - [`tool`]: the [`Tool`] trait and the name-keyed [`ToolRegistry`]
//! - [`provider`]: the [`Provider`] trait over LLM backends
//! - [`event`]: progress events published by the agent loop

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod directive;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{ContentPart, Conversation, ConversationId, Message, MessageContent, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use tool::{ImageArtifact, Tool, ToolDefinition, ToolOutput, ToolParams, ToolRegistry};
pub use directive::{Directive, FinalPayload, ToolCallDirective, extract_json};
pub use event::{AgentEvent, EventBus};
