//! Writer agent: publishes documentation for verified modules.
//!
//! Triggered only on verified success. Requests a Markdown write-up
//! referencing the full verified response text and persists it keyed by
//! the work item's slug. An existing file at that path is silently
//! overwritten; the trend scout's uniqueness contract makes that case
//! unreachable in practice.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::llm::{CompletionRequest, LlmProvider, Message};

use super::error::{AgentError, AgentResult};

/// Technical writer persona.
const WRITER_SYSTEM_PROMPT: &str = r#"You are a Technical Writer for an Embedded Systems blog.
Your job is to take a verified Verilog module and write a high-quality, SEO-optimized blog post in Markdown.
The post should explain how the code works, the testbench logic, and real-world use cases.
DO NOT use emoticons in the blog post. Use standard ASCII formatting."#;

/// Configuration for the writer agent.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Temperature for prose; higher than code generation on purpose.
    pub temperature: f64,
    /// Maximum tokens for the write-up.
    pub max_tokens: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

/// Agent that writes and persists module documentation.
pub struct Writer {
    llm: Arc<dyn LlmProvider>,
    config: WriterConfig,
}

impl Writer {
    /// Creates a new writer with the given LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            config: WriterConfig::default(),
        }
    }

    /// Creates a new writer with explicit configuration.
    pub fn with_config(llm: Arc<dyn LlmProvider>, config: WriterConfig) -> Self {
        Self { llm, config }
    }

    /// Generates the write-up for a verified module and saves it to
    /// `doc_dir/{slug}.md`. Returns the written path.
    pub async fn publish(
        &self,
        topic: &str,
        verified_text: &str,
        slug: &str,
        doc_dir: &Path,
    ) -> AgentResult<PathBuf> {
        info!(topic, "Generating documentation");

        let prompt = format!(
            r#"Write a technical blog post for the topic: "{topic}".

--- VERIFIED CODE ---
{verified_text}

--- REQUIREMENTS ---
1. Title: Engaging technical title.
2. Introduction: What is this module and why is it useful?
3. Code Analysis: Briefly explain the key logic in the Verilog code.
4. Verification: Mention that this code has been automatically verified with a testbench.
5. Usage: Example instantiation or real-world application.
6. Format: Markdown.
7. Constraint: Do NOT use emojis."#,
        );

        let request = CompletionRequest::new(WRITER_SYSTEM_PROMPT, vec![Message::user(prompt)])
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let completion = self.llm.complete(request).await?;
        let content = completion
            .first_text()
            .ok_or_else(|| AgentError::ResponseParseError("Empty LLM response".to_string()))?;

        let doc_path = doc_dir.join(format!("{}.md", slug));
        fs::write(&doc_path, content)?;

        info!(path = %doc_path.display(), "Saved documentation");
        Ok(doc_path)
    }
}
