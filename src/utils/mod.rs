//! Shared utilities for parsing LLM responses.

pub mod code_blocks;

pub use code_blocks::{extract_pair, ArtifactPair};
