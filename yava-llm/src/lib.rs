//! # yava-llm
//!
//! Talking to hosted language models.
//!
//! ## Core Concepts
//! - **ChatMessage**: a role-tagged turn of a transcript
//! - **LlmProvider**: trait-based completion backend (OpenAI-compatible, Anthropic)
//! - **RouterProvider**: one model alias spread over several deployments with failover
//! - **UsageTracker**: token accounting across calls

pub mod error;
pub mod provider;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    AnthropicProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, Role,
    RouterProvider, Usage, UsageTracker,
};
