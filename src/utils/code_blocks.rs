//! Fenced code block extraction from LLM responses.
//!
//! The generation contract asks for exactly two fenced blocks: the design
//! module first, the testbench second. The service's compliance is
//! advisory, so extraction is strict: fewer than two blocks is a failure
//! rather than a guess about content placement, because silently accepting
//! malformed output would poison the verification step. Blocks past the
//! first two are chatter and ignored.

use regex::Regex;

use crate::error::ExtractionError;

/// Non-greedy fence matcher; the language tag is optional and discarded.
const FENCE_PATTERN: &str = r"(?s)```[\w+-]*[ \t]*\n(.*?)```";

/// The two text blocks extracted from one generation attempt.
///
/// Both fields are non-empty once extraction succeeds; there are no
/// partial pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    /// Design module source.
    pub design_text: String,
    /// Self-checking testbench source.
    pub test_text: String,
}

/// Extracts the design/testbench pair from a raw LLM response.
///
/// Each block is trimmed of leading and trailing whitespace
/// independently.
pub fn extract_pair(response: &str) -> Result<ArtifactPair, ExtractionError> {
    let fence = Regex::new(FENCE_PATTERN).expect("fence pattern compiles");

    let blocks: Vec<&str> = fence
        .captures_iter(response)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if blocks.len() < 2 {
        return Err(ExtractionError::NotEnoughBlocks {
            found: blocks.len(),
        });
    }

    let design_text = blocks[0].trim();
    let test_text = blocks[1].trim();

    if design_text.is_empty() {
        return Err(ExtractionError::EmptyBlock { index: 0 });
    }
    if test_text.is_empty() {
        return Err(ExtractionError::EmptyBlock { index: 1 });
    }

    Ok(ArtifactPair {
        design_text: design_text.to_string(),
        test_text: test_text.to_string(),
    })
}
