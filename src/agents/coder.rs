//! Coder agent: initial RTL generation and diagnostic-driven refinement.
//!
//! A pure request/response wrapper around the LLM. No retries and no
//! validation happen here; the coordinator owns the retry budget and the
//! strict parsing of whatever comes back.

use std::sync::Arc;

use tracing::info;

use crate::llm::{CompletionRequest, LlmProvider, Message};

use super::error::{AgentError, AgentResult};

/// Engineer persona for both generation and refinement.
const CODER_SYSTEM_PROMPT: &str = r#"You are an expert FPGA/ASIC Engineer in a team called 'Silicon Scribe'.
Your goal is to write synthesis-ready Verilog modules and robust self-checking Testbenches.

RULES:
1. You must provide TWO code blocks.
2. The first block must be the Design Module (Verilog).
3. The second block must be the Testbench (Verilog).
4. The Testbench MUST check the output automatically.
5. If the test passes, the Testbench MUST print exactly: "TEST PASSED" using $display().
6. If the test fails, it MUST print "TEST FAILED".
7. Do not use external libraries or UVM. Keep it simple SystemVerilog or Verilog-2001.
8. STRICTLY NO EMOTICONS or non-ASCII characters in the code. Use only standard ASCII."#;

/// Configuration for the coder agent.
#[derive(Debug, Clone)]
pub struct CoderConfig {
    /// Temperature for initial generation.
    pub generate_temperature: f64,
    /// Temperature for refinement; lower, since the fix should stay
    /// close to the prior attempt.
    pub refine_temperature: f64,
    /// Maximum tokens for a design/testbench pair.
    pub max_tokens: u32,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            generate_temperature: 0.2,
            refine_temperature: 0.1,
            max_tokens: 4000,
        }
    }
}

/// Agent that asks the LLM for design/testbench pairs.
pub struct Coder {
    llm: Arc<dyn LlmProvider>,
    config: CoderConfig,
}

impl Coder {
    /// Creates a new coder with the given LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            config: CoderConfig::default(),
        }
    }

    /// Creates a new coder with explicit configuration.
    pub fn with_config(llm: Arc<dyn LlmProvider>, config: CoderConfig) -> Self {
        Self { llm, config }
    }

    /// Requests an initial design/testbench pair for `topic`.
    pub async fn generate(&self, topic: &str) -> AgentResult<String> {
        info!(topic, "Requesting code");

        let request = CompletionRequest::new(
            CODER_SYSTEM_PROMPT,
            vec![Message::user(format!(
                "Create a Verilog module and testbench for: {}",
                topic
            ))],
        )
        .with_temperature(self.config.generate_temperature)
        .with_max_tokens(self.config.max_tokens);

        self.request_text(request).await
    }

    /// Requests a fixed pair given the prior response and the judge's
    /// diagnostic log.
    ///
    /// The full prior text and the log travel together so the service
    /// can tell a design defect from a testbench defect.
    pub async fn refine(
        &self,
        topic: &str,
        prior_text: &str,
        diagnostic_log: &str,
    ) -> AgentResult<String> {
        info!(topic, "Requesting fix for failed verification");

        let prompt = format!(
            r#"The previous Verilog code for '{topic}' failed verification.

--- PREVIOUS CODE ---
{prior_text}

--- ERROR LOG ---
{diagnostic_log}

--- INSTRUCTIONS ---
Analyze the error log. It indicates either a bug in the Design or a bug in the Testbench.
Fix the code and provide the COMPLETE updated Design and Testbench.
REMEMBER: No emoticons."#,
        );

        let request = CompletionRequest::new(CODER_SYSTEM_PROMPT, vec![Message::user(prompt)])
            .with_temperature(self.config.refine_temperature)
            .with_max_tokens(self.config.max_tokens);

        self.request_text(request).await
    }

    async fn request_text(&self, request: CompletionRequest) -> AgentResult<String> {
        let completion = self.llm.complete(request).await?;
        completion
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| AgentError::ResponseParseError("Empty LLM response".to_string()))
    }
}
