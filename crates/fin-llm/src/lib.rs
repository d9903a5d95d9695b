//! LLM provider abstraction layer for fin-agent
//!
//! This crate provides provider-agnostic abstractions for talking to a
//! generative model. It includes:
//!
//! - Message types for chat-style conversations
//! - Completion request/response types
//! - Provider trait for LLM implementations
//! - The Gemini provider (behind the `gemini` feature)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{
    CompletionRequest, CompletionResponse, GenerationConfig, StopReason, TokenUsage,
};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "gemini")]
pub mod providers;
