//! silicon-scribe: automated Verilog module factory.
//!
//! This library drives a generate -> verify -> refine -> publish pipeline
//! for small RTL artifacts. An LLM proposes a design module and a
//! self-checking testbench, an external judge simulates the pair, and
//! failed attempts are refined with the judge's diagnostic log before
//! verified modules are published as documentation.

// Core modules
pub mod agents;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod judge;
pub mod llm;
pub mod pipeline;
pub mod utils;

// Re-export commonly used error types
pub use error::{ConfigError, ExtractionError, LlmError, VerifierError};
