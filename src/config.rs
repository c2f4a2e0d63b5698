//! Workspace configuration for the pipeline.
//!
//! Provides the on-disk layout of the RTL factory (design, testbench,
//! simulation, documentation and config directories), credential
//! resolution for the generative service, and the pipeline constants.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ConfigError;

/// Default number of work items per production run.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Maximum refinement retries per work item.
///
/// Parse failures and verification failures share this single budget,
/// so at most `MAX_RETRIES + 1` generation calls happen per item.
pub const MAX_RETRIES: usize = 3;

/// Environment variable consulted first for the API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// On-disk layout of one factory workspace.
///
/// All paths are derived from a single project root. The judge script and
/// its side-channel log file live at fixed, well-known locations.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    /// Project root directory.
    pub root: PathBuf,
    /// Directory for verified design modules (`{slug}.v`).
    pub rtl_dir: PathBuf,
    /// Directory for testbenches (`tb_{slug}.v`).
    pub tb_dir: PathBuf,
    /// Working directory for the judge; holds the simulation log.
    pub sim_dir: PathBuf,
    /// Directory for published documentation (`{slug}.md`).
    pub doc_dir: PathBuf,
    /// Directory for configuration files (API key fallback).
    pub etc_dir: PathBuf,
    /// Path to the external judge executable.
    pub judge_script: PathBuf,
    /// Fixed path of the judge's diagnostic log, overwritten per run.
    pub sim_log: PathBuf,
}

impl WorkspaceLayout {
    /// Derives the full layout from a project root.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let sim_dir = root.join("SIM");
        Self {
            rtl_dir: root.join("RTL"),
            tb_dir: root.join("TB"),
            doc_dir: root.join("DOC"),
            etc_dir: root.join("ETC"),
            judge_script: root.join("SCRIPT").join("judge_core.sh"),
            sim_log: sim_dir.join("sim_log.txt"),
            sim_dir,
            root,
        }
    }

    /// Creates the artifact directories if they are missing.
    ///
    /// `ETC/` is deliberately left alone: it holds user-provided
    /// credentials and should not be materialized empty.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.rtl_dir, &self.tb_dir, &self.sim_dir, &self.doc_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Path where a design module for `slug` is persisted.
    pub fn design_path(&self, slug: &str) -> PathBuf {
        self.rtl_dir.join(format!("{}.v", slug))
    }

    /// Path where the testbench for `slug` is persisted.
    ///
    /// The `tb_` prefix keeps testbenches distinguishable from design
    /// files when both directories are flattened during synthesis runs.
    pub fn testbench_path(&self, slug: &str) -> PathBuf {
        self.tb_dir.join(format!("tb_{}.v", slug))
    }

    /// Path where the documentation for `slug` is published.
    pub fn doc_path(&self, slug: &str) -> PathBuf {
        self.doc_dir.join(format!("{}.md", slug))
    }

    /// Path of the API key fallback file.
    pub fn key_file(&self) -> PathBuf {
        self.etc_dir.join("api-key.yml")
    }
}

/// Resolves the generative-service API key.
///
/// Checks the `ANTHROPIC_API_KEY` environment variable first, then falls
/// back to the `ANTHROPIC_API_KEY` entry of `ETC/api-key.yml`. Absence of
/// both is a fatal startup condition.
pub fn resolve_api_key(layout: &WorkspaceLayout) -> Result<String, ConfigError> {
    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    let key_file = layout.key_file();
    if key_file.exists() {
        match read_key_file(&key_file) {
            Ok(Some(key)) => {
                info!(path = %key_file.display(), "Loaded API key from key file");
                return Ok(key);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %key_file.display(), "Error reading key file: {}", e);
            }
        }
    }

    Err(ConfigError::MissingApiKey(key_file))
}

/// Reads the API key entry from a YAML key file, if present.
fn read_key_file(path: &Path) -> Result<Option<String>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let entries: HashMap<String, String> = serde_yaml::from_str(&content)?;
    Ok(entries
        .get(API_KEY_ENV)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty()))
}
