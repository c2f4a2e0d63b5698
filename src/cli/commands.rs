//! CLI command definitions for silicon-scribe.
//!
//! A single `run` command executes one production batch: fetch topics,
//! then drive each item through the generate/verify/refine loop. The
//! process exits 0 on normal completion (including per-item failures)
//! and 1 when credential resolution fails at startup.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::agents::TrendScout;
use crate::catalog::Catalog;
use crate::config::{resolve_api_key, WorkspaceLayout, DEFAULT_BATCH_SIZE, MAX_RETRIES};
use crate::judge::JudgeAdapter;
use crate::llm::{AnthropicClient, LlmProvider};
use crate::pipeline::Coordinator;

/// Automated Verilog module factory.
#[derive(Parser)]
#[command(name = "silicon-scribe")]
#[command(about = "Generate, verify, refine and publish Verilog modules")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run one production batch end to end.
    Run(RunArgs),
}

/// Arguments for `silicon-scribe run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project root holding the RTL/TB/SIM/DOC/ETC directories.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Number of work items to fetch for this batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Refinement retries allowed per work item.
    #[arg(long, default_value_t = MAX_RETRIES)]
    pub max_retries: usize,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the parsed CLI command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_batch(args).await,
    }
}

/// Executes one production batch.
async fn run_batch(args: RunArgs) -> anyhow::Result<()> {
    let layout = WorkspaceLayout::from_root(&args.root);
    layout
        .ensure_dirs()
        .context("Failed to create workspace directories")?;

    // Fatal startup condition: no key means exit 1 before any work.
    let api_key = resolve_api_key(&layout).context("Critical setup error")?;
    let llm: Arc<dyn LlmProvider> = Arc::new(AnthropicClient::new(api_key));

    info!(batch_size = args.batch_size, "Fetching new orders from trend scout");
    let catalog = Catalog::scan(&layout.doc_dir)?;
    let scout = TrendScout::new(llm.clone());
    let items = scout.select_topics(args.batch_size, &catalog).await;

    if items.is_empty() {
        info!("No topics received. Exiting.");
        return Ok(());
    }

    let slugs: Vec<&str> = items.iter().map(|i| i.slug.as_str()).collect();
    info!(?slugs, "Starting mass production");

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current step");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let judge = Arc::new(JudgeAdapter::new(&layout));
    let coordinator = Coordinator::new(llm, judge, layout)
        .with_max_retries(args.max_retries)
        .with_cancel_flag(cancel);

    let stats = coordinator.run_batch(&items).await;

    info!(
        published = stats.published,
        exhausted = stats.exhausted,
        failed = stats.failed,
        "Batch finished"
    );
    Ok(())
}
