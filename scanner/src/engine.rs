use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Where the YARA-X CLI lands in the scan container image.
const DEFAULT_YR_BIN: &str = "/usr/local/bin/yr";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to launch scan engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("scan engine timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("scan engine exited with status {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("unreadable engine report: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One matched file as reported by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineMatch {
    pub file: String,
}

/// Structured report the engine emits for a whole-directory scan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineReport {
    #[serde(default)]
    pub matches: Vec<EngineMatch>,
}

/// Narrow interface to the pattern-matching engine, so the corpus walk can be
/// exercised without a real binary on the box.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Runs `rule_file` over every sample in `dir` and returns the raw match
    /// report.
    async fn scan(&self, rule_file: &Path, dir: &Path) -> Result<EngineReport, EngineError>;
}

/// Drives the external `yr` executable with a hard per-invocation timeout.
pub struct YrScanner {
    bin: PathBuf,
    timeout: Duration,
}

impl YrScanner {
    /// Resolves the engine binary: explicit path if configured, then `yr` on
    /// PATH, then the container default.
    pub fn new(bin: Option<PathBuf>, timeout: Duration) -> Self {
        let bin = bin
            .or_else(|| which::which("yr").ok())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_YR_BIN));
        Self { bin, timeout }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }
}

#[async_trait]
impl ScanEngine for YrScanner {
    fn name(&self) -> &str {
        "yr"
    }

    async fn scan(&self, rule_file: &Path, dir: &Path) -> Result<EngineReport, EngineError> {
        debug!("Running {} scan over {}", self.bin.display(), dir.display());

        let output = timeout(
            self.timeout,
            Command::new(&self.bin)
                .arg("scan")
                .arg("-o")
                .arg("json")
                .arg(rule_file)
                .arg(dir)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| EngineError::Timeout {
            secs: self.timeout.as_secs(),
        })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            // The engine prints a report even for zero matches, so an empty
            // stdout from a failed exit means it never got to scan.
            if output.status.success() {
                return Ok(EngineReport::default());
            }
            return Err(EngineError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_str(&stdout)?)
    }
}
