//! Pipeline coordinator: the per-item retry/verification state machine.
//!
//! Each work item moves through generate -> parse -> persist -> verify.
//! A parse failure retries generation from scratch (no diagnostic); a
//! verification failure refines with the judge's log. Both failure kinds
//! draw from one shared, bounded attempt budget per item - a deliberate
//! policy, not two independent counters - so at most `max_retries + 1`
//! generation calls happen per item.
//!
//! Items are processed strictly sequentially. Any unexpected error on
//! one item is caught at the item boundary and the run continues with
//! the next. A user interrupt is observed between items and between
//! steps and aborts the run once the in-flight step completes; partially
//! written files are left in place.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::agents::{AgentError, Coder, WorkItem, Writer};
use crate::config::{WorkspaceLayout, MAX_RETRIES};
use crate::error::VerifierError;
use crate::judge::Judge;
use crate::llm::LlmProvider;
use crate::utils::{extract_pair, ArtifactPair};

/// Errors that can occur while processing a work item.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Agent (LLM-facing) error.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// The judge could not be invoked at all.
    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    /// IO error while persisting artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled by the user.
    #[error("Run cancelled by user")]
    Cancelled,
}

/// Terminal status of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Verified and documented.
    Published,
    /// Attempt budget spent without a passing verification.
    Exhausted,
    /// Aborted by an unexpected error at the item boundary.
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Published => write!(f, "published"),
            ItemStatus::Exhausted => write!(f, "exhausted"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of processing one work item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    /// Slug of the processed item.
    pub slug: String,
    /// Terminal status.
    pub status: ItemStatus,
    /// Retry slots consumed (0 when the first attempt passed).
    pub attempts_used: usize,
    /// Error message when the item failed.
    pub error: Option<String>,
}

impl ItemReport {
    fn published(slug: &str, attempts_used: usize) -> Self {
        Self {
            slug: slug.to_string(),
            status: ItemStatus::Published,
            attempts_used,
            error: None,
        }
    }

    fn exhausted(slug: &str, attempts_used: usize) -> Self {
        Self {
            slug: slug.to_string(),
            status: ItemStatus::Exhausted,
            attempts_used,
            error: None,
        }
    }

    fn failed(slug: &str, error: impl Into<String>) -> Self {
        Self {
            slug: slug.to_string(),
            status: ItemStatus::Failed,
            attempts_used: 0,
            error: Some(error.into()),
        }
    }
}

/// On-disk materialization of one extracted pair.
///
/// Overwritten on every retry attempt; the latest attempt always wins.
#[derive(Debug, Clone)]
pub struct PersistedFiles {
    /// Path of the design module.
    pub design_path: PathBuf,
    /// Path of the testbench.
    pub test_path: PathBuf,
}

/// Statistics for one batch run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Items that reached a terminal state.
    pub processed: usize,
    /// Items published after a passing verification.
    pub published: usize,
    /// Items that ran out of attempt budget.
    pub exhausted: usize,
    /// Items aborted by unexpected errors.
    pub failed: usize,
    /// Whether the run was cut short by a user interrupt.
    pub cancelled: bool,
}

impl PipelineStats {
    fn record(&mut self, report: &ItemReport) {
        self.processed += 1;
        match report.status {
            ItemStatus::Published => self.published += 1,
            ItemStatus::Exhausted => self.exhausted += 1,
            ItemStatus::Failed => self.failed += 1,
        }
    }
}

/// Coordinates the generate/verify/refine loop across a batch of items.
pub struct Coordinator {
    coder: Coder,
    writer: Writer,
    judge: Arc<dyn Judge>,
    layout: WorkspaceLayout,
    max_retries: usize,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(llm: Arc<dyn LlmProvider>, judge: Arc<dyn Judge>, layout: WorkspaceLayout) -> Self {
        Self {
            coder: Coder::new(llm.clone()),
            writer: Writer::new(llm),
            judge,
            layout,
            max_retries: MAX_RETRIES,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Installs a cooperative cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Observed between steps; the in-flight step always completes.
    fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Processes a batch of work items sequentially.
    pub async fn run_batch(&self, items: &[WorkItem]) -> PipelineStats {
        let mut stats = PipelineStats::default();

        for (idx, item) in items.iter().enumerate() {
            if self.cancelled() {
                warn!("Run cancelled; skipping remaining jobs");
                stats.cancelled = true;
                break;
            }

            info!(
                job = idx + 1,
                total = items.len(),
                topic = %item.topic,
                slug = %item.slug,
                "Starting job"
            );

            match self.process_item(item).await {
                Ok(report) => {
                    match report.status {
                        ItemStatus::Published => {
                            info!(slug = %report.slug, "Job completed")
                        }
                        _ => warn!(
                            slug = %report.slug,
                            attempts = report.attempts_used,
                            "Job abandoned"
                        ),
                    }
                    stats.record(&report);
                }
                Err(PipelineError::Cancelled) => {
                    warn!("Run cancelled during job '{}'", item.slug);
                    stats.cancelled = true;
                    break;
                }
                Err(e) => {
                    // Item boundary: the run continues with the next job.
                    error!(slug = %item.slug, "Critical error on job: {}", e);
                    stats.record(&ItemReport::failed(&item.slug, e.to_string()));
                }
            }
        }

        info!(
            processed = stats.processed,
            published = stats.published,
            exhausted = stats.exhausted,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "All jobs processed"
        );
        stats
    }

    /// Runs one item through the state machine to a terminal state.
    async fn process_item(&self, item: &WorkItem) -> Result<ItemReport, PipelineError> {
        let mut response = self.coder.generate(&item.topic).await?;
        let mut attempts_used = 0usize;

        loop {
            self.checkpoint()?;

            let pair = match extract_pair(&response) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(slug = %item.slug, "Extraction failed: {}", e);
                    if attempts_used >= self.max_retries {
                        return Ok(ItemReport::exhausted(&item.slug, attempts_used));
                    }
                    attempts_used += 1;
                    // A parse failure retries blind: same topic, no diagnostic.
                    response = self.coder.generate(&item.topic).await?;
                    continue;
                }
            };

            let files = self.persist_pair(&item.slug, &pair)?;
            self.checkpoint()?;

            let outcome = self
                .judge
                .verify(&files.design_path, &files.test_path)
                .await?;

            if outcome.passed {
                info!(slug = %item.slug, "Code verified");
                self.checkpoint()?;
                // The writer gets the full response, not just the pair,
                // so the post can reference surrounding explanation.
                self.writer
                    .publish(&item.topic, &response, &item.slug, &self.layout.doc_dir)
                    .await?;
                return Ok(ItemReport::published(&item.slug, attempts_used));
            }

            if attempts_used >= self.max_retries {
                warn!(slug = %item.slug, "Max retries reached");
                return Ok(ItemReport::exhausted(&item.slug, attempts_used));
            }
            attempts_used += 1;

            info!(slug = %item.slug, attempt = attempts_used, "Verification failed; refining");
            self.checkpoint()?;
            response = self
                .coder
                .refine(&item.topic, &response, &outcome.diagnostic_log)
                .await?;
        }
    }

    /// Writes the extracted pair to the RTL and TB directories,
    /// overwriting any earlier attempt for the same slug.
    fn persist_pair(&self, slug: &str, pair: &ArtifactPair) -> Result<PersistedFiles, PipelineError> {
        let design_path = self.layout.design_path(slug);
        let test_path = self.layout.testbench_path(slug);

        fs::write(&design_path, &pair.design_text)?;
        fs::write(&test_path, &pair.test_text)?;

        Ok(PersistedFiles {
            design_path,
            test_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::judge::VerificationOutcome;
    use crate::llm::{Completion, CompletionRequest, ContentBlock, Usage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const VALID_RESPONSE: &str =
        "```verilog\nmodule dut;\nendmodule\n```\n```verilog\nmodule tb_dut;\nendmodule\n```";
    const GARBAGE_RESPONSE: &str = "Sorry, I forgot the code blocks.";
    const DOC_RESPONSE: &str = "# Verified module write-up";

    /// LLM mock that replays a scripted sequence of responses.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self
                .responses
                .lock()
                .expect("lock not poisoned")
                .pop_front()
                .ok_or_else(|| LlmError::RequestFailed("script exhausted".to_string()))?;
            Ok(Completion {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                content: vec![ContentBlock::text(text)],
                stop_reason: Some("end_turn".to_string()),
                usage: Usage::default(),
            })
        }
    }

    /// Judge mock that replays scripted pass/fail verdicts.
    struct ScriptedJudge {
        verdicts: Mutex<VecDeque<bool>>,
        calls: AtomicUsize,
    }

    impl ScriptedJudge {
        fn new(verdicts: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn verify(
            &self,
            design_path: &Path,
            test_path: &Path,
        ) -> Result<VerificationOutcome, VerifierError> {
            assert!(design_path.exists(), "design file must be persisted");
            assert!(test_path.exists(), "testbench file must be persisted");
            self.calls.fetch_add(1, Ordering::SeqCst);
            let passed = self
                .verdicts
                .lock()
                .expect("lock not poisoned")
                .pop_front()
                .unwrap_or(false);
            Ok(VerificationOutcome {
                passed,
                diagnostic_log: "mock sim log".to_string(),
            })
        }
    }

    fn test_layout() -> (tempfile::TempDir, WorkspaceLayout) {
        let dir = tempdir().expect("tempdir");
        let layout = WorkspaceLayout::from_root(dir.path());
        layout.ensure_dirs().expect("ensure_dirs");
        (dir, layout)
    }

    fn item() -> WorkItem {
        WorkItem {
            topic: "2-input AND gate".to_string(),
            slug: "and_gate_2in".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_pass_publishes_once() {
        let (_dir, layout) = test_layout();
        let llm = ScriptedLlm::new(&[VALID_RESPONSE, DOC_RESPONSE]);
        let judge = ScriptedJudge::new(&[true]);
        let coordinator = Coordinator::new(llm.clone(), judge.clone(), layout.clone());

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.published, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(judge.calls(), 1);
        // One generation call plus one documentation call, zero refines.
        assert_eq!(llm.calls(), 2);
        assert!(layout.design_path("and_gate_2in").exists());
        assert!(layout.testbench_path("and_gate_2in").exists());
        assert!(layout.doc_path("and_gate_2in").exists());
    }

    #[tokio::test]
    async fn test_persistent_failure_exhausts_budget() {
        let (_dir, layout) = test_layout();
        let llm = ScriptedLlm::new(&[VALID_RESPONSE; 4]);
        let judge = ScriptedJudge::new(&[false; 4]);
        let coordinator = Coordinator::new(llm.clone(), judge.clone(), layout.clone());

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.published, 0);
        // 1 initial + 3 refinements, never more.
        assert_eq!(llm.calls(), 4);
        assert_eq!(judge.calls(), 4);
        assert!(!layout.doc_path("and_gate_2in").exists());
    }

    #[tokio::test]
    async fn test_parse_failure_retries_blind_then_passes() {
        let (_dir, layout) = test_layout();
        let llm = ScriptedLlm::new(&[GARBAGE_RESPONSE, VALID_RESPONSE, DOC_RESPONSE]);
        let judge = ScriptedJudge::new(&[true]);
        let coordinator = Coordinator::new(llm.clone(), judge.clone(), layout);

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.published, 1);
        assert_eq!(llm.calls(), 3);
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn test_parse_failures_share_the_attempt_budget() {
        let (_dir, layout) = test_layout();
        let llm = ScriptedLlm::new(&[GARBAGE_RESPONSE; 4]);
        let judge = ScriptedJudge::new(&[]);
        let coordinator = Coordinator::new(llm.clone(), judge.clone(), layout.clone());

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.exhausted, 1);
        // Same ceiling as verification failures: 1 initial + 3 retries.
        assert_eq!(llm.calls(), 4);
        assert_eq!(judge.calls(), 0);
        // Parse failures persist nothing.
        assert!(!layout.design_path("and_gate_2in").exists());
    }

    #[tokio::test]
    async fn test_mixed_failures_draw_from_one_counter() {
        let (_dir, layout) = test_layout();
        // Parse failure consumes one slot, then three verify failures
        // spend the rest of the shared budget.
        let llm = ScriptedLlm::new(&[
            GARBAGE_RESPONSE,
            VALID_RESPONSE,
            VALID_RESPONSE,
            VALID_RESPONSE,
        ]);
        let judge = ScriptedJudge::new(&[false; 3]);
        let coordinator = Coordinator::new(llm.clone(), judge.clone(), layout);

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.exhausted, 1);
        assert_eq!(llm.calls(), 4);
        assert_eq!(judge.calls(), 3);
    }

    #[tokio::test]
    async fn test_item_error_does_not_abort_the_batch() {
        let (_dir, layout) = test_layout();
        // First item: generation blows up (script exhausted after its
        // queue is drained). Second item: full success.
        let llm = ScriptedLlm::new(&[]);
        let judge = ScriptedJudge::new(&[true]);
        let coordinator = Coordinator::new(llm, judge, layout);

        let items = vec![
            WorkItem {
                topic: "A".to_string(),
                slug: "mod_a".to_string(),
            },
            WorkItem {
                topic: "B".to_string(),
                slug: "mod_b".to_string(),
            },
        ];
        let stats = coordinator.run_batch(&items).await;

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 2);
        assert!(!stats.cancelled);
    }

    #[tokio::test]
    async fn test_pre_set_cancel_flag_skips_all_items() {
        let (_dir, layout) = test_layout();
        let llm = ScriptedLlm::new(&[VALID_RESPONSE, DOC_RESPONSE]);
        let judge = ScriptedJudge::new(&[true]);
        let cancel = Arc::new(AtomicBool::new(true));
        let coordinator =
            Coordinator::new(llm.clone(), judge, layout).with_cancel_flag(cancel);

        let stats = coordinator.run_batch(&[item()]).await;

        assert!(stats.cancelled);
        assert_eq!(stats.processed, 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_overwrites_persisted_files() {
        let (_dir, layout) = test_layout();
        let second_response =
            "```verilog\nmodule dut_v2;\nendmodule\n```\n```verilog\nmodule tb_v2;\nendmodule\n```";
        let llm = ScriptedLlm::new(&[VALID_RESPONSE, second_response, DOC_RESPONSE]);
        let judge = ScriptedJudge::new(&[false, true]);
        let coordinator = Coordinator::new(llm, judge, layout.clone());

        let stats = coordinator.run_batch(&[item()]).await;

        assert_eq!(stats.published, 1);
        let design = fs::read_to_string(layout.design_path("and_gate_2in")).expect("read");
        assert_eq!(design, "module dut_v2;\nendmodule");
    }
}
