//! Error types for silicon-scribe operations.
//!
//! Defines error types for the major subsystems:
//! - Workspace configuration and credential resolution
//! - LLM API interactions
//! - Fenced code block extraction from LLM responses
//! - Judge (external verification tool) invocation

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not found in ANTHROPIC_API_KEY or {0}")]
    MissingApiKey(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse key file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while extracting code blocks from a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Expected two fenced code blocks (design, testbench), found {found}")]
    NotEnoughBlocks { found: usize },

    #[error("Code block {index} is empty after trimming")]
    EmptyBlock { index: usize },
}

/// Errors that can occur when invoking the external judge tool.
///
/// A failed verification is not an error; these only cover cases where
/// the tool could not be run at all.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Judge script not found at {0}")]
    MissingJudge(PathBuf),

    #[error("Failed to spawn judge process: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
