//! Trend scout agent: proposes new, non-duplicate work items.
//!
//! Asks the LLM for a batch of module ideas biased toward one randomly
//! chosen category, then filters the candidates against the catalog of
//! already-published slugs. The service is instructed to avoid existing
//! slugs and to emit a JSON array, but its compliance is advisory only:
//! uniqueness is re-verified here and the JSON is located by strict span
//! extraction. Every failure mode degrades to an empty list, which the
//! caller reads as "no work available".

use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::llm::{CompletionRequest, LlmProvider, Message};

/// Categories rotated through for topical diversity.
pub const TOPIC_CATEGORIES: [&str; 8] = [
    "Basic Combinational Logic (MUX, DEMUX, Encoder)",
    "Sequential Logic (Counters, Registers, FSM)",
    "Arithmetic Circuits (Adders, Multipliers, ALUs)",
    "Communication Protocols (SPI, I2C, UART, PS/2)",
    "Memory Controllers (FIFO, LIFO, RAM wrappers)",
    "DSP Building Blocks (Filters, CORDIC, PWM)",
    "Legacy 7400 Series Logic Chips implementation",
    "Digital Clock Managers (Dividers, Glitch-free muxes)",
];

/// System prompt for topic planning.
const SCOUT_SYSTEM_PROMPT: &str = r#"You are a Project Manager for an FPGA Design Team.
Your job is to list Verilog modules that need to be implemented.
Output MUST be a valid JSON list of objects.
Each object must have "topic" (human readable title) and "slug" (snake_case_filename).
Do NOT include code, just the JSON data."#;

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Human-readable description of the module to build.
    pub topic: String,
    /// Filesystem-safe identifier, unique within a run and against the
    /// catalog snapshot taken at selection time.
    pub slug: String,
}

/// Configuration for the trend scout agent.
#[derive(Debug, Clone)]
pub struct TrendScoutConfig {
    /// Temperature for idea generation.
    pub temperature: f64,
    /// Maximum tokens for the candidate list.
    pub max_tokens: u32,
    /// Extra candidates requested beyond the batch size, to absorb
    /// duplicates the service produces despite instruction.
    pub overask: usize,
}

impl Default for TrendScoutConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            overask: 3,
        }
    }
}

/// Agent that proposes new work items for the factory.
pub struct TrendScout {
    llm: Arc<dyn LlmProvider>,
    config: TrendScoutConfig,
}

impl TrendScout {
    /// Creates a new trend scout with the given LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            config: TrendScoutConfig::default(),
        }
    }

    /// Creates a new trend scout with explicit configuration.
    pub fn with_config(llm: Arc<dyn LlmProvider>, config: TrendScoutConfig) -> Self {
        Self { llm, config }
    }

    /// Selects up to `batch_size` new work items.
    ///
    /// Returns an empty list on any service or parse failure; an empty
    /// batch means the run ends gracefully, not that it crashed.
    pub async fn select_topics(&self, batch_size: usize, catalog: &Catalog) -> Vec<WorkItem> {
        let category = TOPIC_CATEGORIES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(TOPIC_CATEGORIES[0]);
        info!(category, "Focusing topic hunt");

        let prompt = self.build_prompt(batch_size, category, catalog);
        let request = CompletionRequest::new(SCOUT_SYSTEM_PROMPT, vec![Message::user(prompt)])
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = match self.llm.complete(request).await {
            Ok(completion) => match completion.first_text() {
                Some(text) => text.to_string(),
                None => {
                    warn!("Topic response contained no text");
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!("Topic generation failed: {}", e);
                return Vec::new();
            }
        };

        let Some(json_span) = extract_json_array(&response) else {
            warn!("Could not find a JSON array in the topic response");
            return Vec::new();
        };

        let candidates: Vec<WorkItem> = match serde_json::from_str(json_span) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Could not parse topic candidates: {}", e);
                return Vec::new();
            }
        };

        let selected = filter_candidates(candidates, catalog, batch_size);
        info!(count = selected.len(), "Selected new topics");
        selected
    }

    fn build_prompt(&self, batch_size: usize, category: &str, catalog: &Catalog) -> String {
        let existing: Vec<&str> = catalog.slugs().collect();
        format!(
            r#"Generate {count} unique Verilog module ideas related to category: "{category}".

Constraint 1: The "slug" must be unique and descriptive.
Constraint 2: Do NOT suggest these slugs (already done): {existing:?}
Constraint 3: Keep complexity suitable for a single module implementation.

Example Output format:
[
    {{"topic": "4-bit Ripple Carry Adder", "slug": "adder_4bit_ripple"}},
    {{"topic": "Synchronous FIFO 16-deep", "slug": "fifo_sync_16"}}
]"#,
            count = batch_size + self.config.overask,
        )
    }
}

/// Locates the JSON array span in a response that may carry chatter
/// around it: everything from the first `[` to the last `]`.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Drops candidates whose slug is already published or already seen in
/// this batch, then truncates to `batch_size` in response order.
fn filter_candidates(
    candidates: Vec<WorkItem>,
    catalog: &Catalog,
    batch_size: usize,
) -> Vec<WorkItem> {
    let mut selected: Vec<WorkItem> = Vec::with_capacity(batch_size);
    for item in candidates {
        if catalog.contains(&item.slug) {
            continue;
        }
        if selected.iter().any(|s| s.slug == item.slug) {
            continue;
        }
        selected.push(item);
        if selected.len() >= batch_size {
            break;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Completion, ContentBlock, Usage};
    use async_trait::async_trait;

    /// Mock LLM provider returning a fixed response.
    struct MockLlmProvider {
        response: String,
        fail: bool,
    }

    impl MockLlmProvider {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                response: String::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            if self.fail {
                return Err(LlmError::RequestFailed("mock outage".to_string()));
            }
            Ok(Completion {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                content: vec![ContentBlock::text(self.response.clone())],
                stop_reason: Some("end_turn".to_string()),
                usage: Usage::default(),
            })
        }
    }

    fn scout(response: impl Into<String>) -> TrendScout {
        TrendScout::new(Arc::new(MockLlmProvider::new(response)))
    }

    const CANDIDATES: &str = r#"[
        {"topic": "4-bit Adder", "slug": "adder_4bit"},
        {"topic": "Sync FIFO", "slug": "fifo_sync_16"},
        {"topic": "UART TX", "slug": "uart_tx"},
        {"topic": "UART TX again", "slug": "uart_tx"},
        {"topic": "SPI Master", "slug": "spi_master"}
    ]"#;

    #[test]
    fn test_extract_json_array_with_chatter() {
        let text = "Sure, here are the ideas:\n[{\"topic\": \"t\", \"slug\": \"s\"}]\nHope that helps!";
        assert_eq!(
            extract_json_array(text),
            Some("[{\"topic\": \"t\", \"slug\": \"s\"}]")
        );
    }

    #[test]
    fn test_extract_json_array_missing_brackets() {
        assert_eq!(extract_json_array("no json here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[tokio::test]
    async fn test_selection_respects_catalog() {
        let catalog = Catalog::from_slugs(["adder_4bit"]);
        let items = scout(CANDIDATES).select_topics(5, &catalog).await;

        assert!(items.iter().all(|i| !catalog.contains(&i.slug)));
        let slugs: Vec<&str> = items.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["fifo_sync_16", "uart_tx", "spi_master"]);
    }

    #[tokio::test]
    async fn test_selection_truncates_to_batch_size() {
        let items = scout(CANDIDATES).select_topics(2, &Catalog::default()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].slug, "adder_4bit");
        assert_eq!(items[1].slug, "fifo_sync_16");
    }

    #[tokio::test]
    async fn test_in_batch_duplicates_dropped() {
        let items = scout(CANDIDATES).select_topics(5, &Catalog::default()).await;
        let uart_count = items.iter().filter(|i| i.slug == "uart_tx").count();
        assert_eq!(uart_count, 1);
    }

    #[tokio::test]
    async fn test_chatter_around_json_is_ignored() {
        let response = format!("Here are some fresh ideas!\n{}\nLet me know.", CANDIDATES);
        let items = scout(response).select_topics(5, &Catalog::default()).await;
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn test_no_json_degrades_to_empty() {
        let items = scout("I could not think of anything.")
            .select_topics(5, &Catalog::default())
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_degrades_to_empty() {
        let items = scout("[{\"topic\": \"broken\"")
            .select_topics(5, &Catalog::default())
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_degrades_to_empty() {
        let scout = TrendScout::new(Arc::new(MockLlmProvider::failing()));
        let items = scout.select_topics(5, &Catalog::default()).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_selection_is_deterministic_given_fixed_response() {
        let catalog = Catalog::from_slugs(["spi_master"]);
        let first = scout(CANDIDATES).select_topics(3, &catalog).await;
        let second = scout(CANDIDATES).select_topics(3, &catalog).await;
        assert_eq!(first, second);
    }
}
