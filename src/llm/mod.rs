//! LLM integration for silicon-scribe.
//!
//! Provides the client for the Anthropic Messages API and the
//! `LlmProvider` trait that every agent talks through. The trait is the
//! seam used by tests to substitute a scripted mock provider.

pub mod client;

pub use client::{
    AnthropicClient, Completion, CompletionRequest, ContentBlock, LlmProvider, Message, Usage,
    DEFAULT_MODEL,
};
