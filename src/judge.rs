//! Adapter for the external verification tool.
//!
//! The judge is a black-box executable that compiles and simulates a
//! design/testbench pair, exits 0 on pass, and leaves a diagnostic log at
//! a fixed path inside the simulation directory. The log is overwritten
//! on every invocation, so the adapter reads it immediately after the
//! subprocess exits and bundles it into the returned outcome; callers
//! never touch the file and no race exists with a following attempt.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::WorkspaceLayout;
use crate::error::VerifierError;

/// Diagnostic text used when the judge left no log behind.
pub const LOG_NOT_FOUND: &str = "Log file not found.";

/// Result of one verification attempt.
///
/// A failed verification is a normal, expected outcome; the diagnostic
/// log is the sole feedback channel into the next refinement prompt.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// True only when the judge exited with status 0.
    pub passed: bool,
    /// Contents of the simulation log, or [`LOG_NOT_FOUND`].
    pub diagnostic_log: String,
}

/// Seam between the pipeline and the verification tool.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Runs the judge on a persisted design/testbench pair.
    ///
    /// Only returns an error when the tool cannot be invoked at all;
    /// non-zero exit codes become `passed: false`.
    async fn verify(
        &self,
        design_path: &Path,
        test_path: &Path,
    ) -> Result<VerificationOutcome, VerifierError>;
}

/// Production judge: runs the judge script as a subprocess.
pub struct JudgeAdapter {
    /// Path to the judge executable.
    script: PathBuf,
    /// Working directory for the simulation run.
    sim_dir: PathBuf,
    /// Fixed path of the diagnostic log.
    log_file: PathBuf,
}

impl JudgeAdapter {
    /// Creates an adapter from the workspace layout.
    pub fn new(layout: &WorkspaceLayout) -> Self {
        Self {
            script: layout.judge_script.clone(),
            sim_dir: layout.sim_dir.clone(),
            log_file: layout.sim_log.clone(),
        }
    }

    /// Creates an adapter from explicit paths (used in tests).
    pub fn with_paths(
        script: impl Into<PathBuf>,
        sim_dir: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            script: script.into(),
            sim_dir: sim_dir.into(),
            log_file: log_file.into(),
        }
    }

    /// Best-effort `chmod +x` on the judge script.
    #[cfg(unix)]
    fn ensure_executable(&self) {
        use std::os::unix::fs::PermissionsExt;

        if let Err(e) = fs::set_permissions(&self.script, fs::Permissions::from_mode(0o755)) {
            warn!(script = %self.script.display(), "Could not mark judge executable: {}", e);
        }
    }

    #[cfg(not(unix))]
    fn ensure_executable(&self) {}

    /// Reads the diagnostic log left by the most recent run.
    fn read_diagnostic(&self) -> String {
        match fs::read_to_string(&self.log_file) {
            Ok(log) => log,
            Err(_) => LOG_NOT_FOUND.to_string(),
        }
    }
}

#[async_trait]
impl Judge for JudgeAdapter {
    async fn verify(
        &self,
        design_path: &Path,
        test_path: &Path,
    ) -> Result<VerificationOutcome, VerifierError> {
        if !self.script.exists() {
            return Err(VerifierError::MissingJudge(self.script.clone()));
        }
        self.ensure_executable();

        // The judge runs from the sim dir, so relative paths would break.
        let abs_script = fs::canonicalize(&self.script)?;
        let abs_design = fs::canonicalize(design_path)?;
        let abs_test = fs::canonicalize(test_path)?;

        info!(
            design = %abs_design.display(),
            testbench = %abs_test.display(),
            "Summoning the judge"
        );

        let output = Command::new(&abs_script)
            .arg(&abs_design)
            .arg(&abs_test)
            .current_dir(&self.sim_dir)
            .output()
            .await
            .map_err(|e| VerifierError::SpawnFailed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = stdout.trim();
        if !summary.is_empty() {
            debug!("Judge summary: {}", summary);
        }

        let passed = output.status.success();
        // Read the log before the next attempt overwrites it.
        let diagnostic_log = self.read_diagnostic();

        Ok(VerificationOutcome {
            passed,
            diagnostic_log,
        })
    }
}
