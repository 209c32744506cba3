use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::ScanEngine;
use crate::models::{CorpusResult, ScanReport};

#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("Lab directory '{lab_id}' not found")]
    LabNotFound { lab_id: String },

    #[error("failed to stage rule file: {0}")]
    Stage(#[from] std::io::Error),

    #[error("scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// On-disk layout of the sample sets: one directory per lab next to the shared
/// `benign/` and `random/` corpora.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    samples_dir: PathBuf,
}

impl CorpusLayout {
    pub fn new(samples_dir: impl Into<PathBuf>) -> Self {
        Self {
            samples_dir: samples_dir.into(),
        }
    }

    pub fn lab_dir(&self, lab_id: &str) -> PathBuf {
        self.samples_dir.join(lab_id)
    }

    pub fn benign_dir(&self) -> PathBuf {
        self.samples_dir.join("benign")
    }

    pub fn random_dir(&self) -> PathBuf {
        self.samples_dir.join("random")
    }
}

/// Scans one corpus directory and reduces the engine report to counts.
///
/// Engine faults never propagate: a rule that crashes or stalls the engine
/// scores as zero matches for this corpus. An empty directory skips the
/// engine entirely.
pub async fn scan_corpus(
    engine: &dyn ScanEngine,
    rule_file: &Path,
    dir: &Path,
    include_matches: bool,
) -> CorpusResult {
    let total_files = match count_regular_files(dir).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Failed to enumerate {}: {}", dir.display(), e);
            return CorpusResult::unmatched(0, include_matches);
        }
    };

    if total_files == 0 {
        debug!("Skipping empty corpus {}", dir.display());
        return CorpusResult::unmatched(0, include_matches);
    }

    let report = match engine.scan(rule_file, dir).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Engine fault scanning {}: {}", dir.display(), e);
            return CorpusResult::unmatched(total_files, include_matches);
        }
    };

    // The engine reports one entry per matching rule, so the same file can
    // appear more than once; count distinct file names.
    let mut matched: BTreeSet<String> = BTreeSet::new();
    for m in &report.matches {
        if let Some(name) = Path::new(&m.file).file_name().and_then(|n| n.to_str()) {
            matched.insert(name.to_string());
        }
    }

    // Files can vanish between the count and the scan; never report more
    // matches than files.
    let matched_files = matched.len().min(total_files);
    CorpusResult {
        total_files,
        matched_files,
        matches: include_matches.then(|| matched.into_iter().collect()),
    }
}

/// Counts regular files directly inside `dir`. Subdirectories are not
/// descended into; the sample sets are flat.
async fn count_regular_files(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut total = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            total += 1;
        }
    }
    Ok(total)
}

/// Evaluates one rule against a lab corpus plus the shared false-positive
/// corpora and aggregates the verdict inputs.
pub struct Evaluator {
    engine: Arc<dyn ScanEngine>,
    layout: CorpusLayout,
    include_matches: bool,
}

impl Evaluator {
    pub fn new(engine: Arc<dyn ScanEngine>, layout: CorpusLayout, include_matches: bool) -> Self {
        Self {
            engine,
            layout,
            include_matches,
        }
    }

    /// Runs the full evaluation: stages the rule once, scans the lab corpus
    /// and both false-positive corpora concurrently, and combines the three
    /// results. Fails up front when the lab directory does not exist, before
    /// any scanning happens.
    pub async fn evaluate(&self, rule: &str, lab_id: &str) -> Result<ScanReport, EvaluateError> {
        let lab_dir = self.layout.lab_dir(lab_id);
        if !is_plain_dir_name(lab_id) || !lab_dir.is_dir() {
            return Err(EvaluateError::LabNotFound {
                lab_id: lab_id.to_string(),
            });
        }

        let engine = Arc::clone(&self.engine);
        let benign_dir = self.layout.benign_dir();
        let random_dir = self.layout.random_dir();
        let include = self.include_matches;
        let rule = rule.to_string();

        // Detached so an aborted request cannot cancel the scans midway; the
        // staged rule file lives inside the task and is removed when it
        // finishes.
        let task = tokio::spawn(async move {
            let rule_file = stage_rule(&rule)?;
            let (lab, benign, random) = tokio::join!(
                scan_corpus(engine.as_ref(), rule_file.path(), &lab_dir, include),
                scan_corpus(engine.as_ref(), rule_file.path(), &benign_dir, include),
                scan_corpus(engine.as_ref(), rule_file.path(), &random_dir, include),
            );
            Ok(ScanReport::new(lab, benign, random))
        });

        task.await?
    }
}

/// Writes the rule source to a throwaway file the engine can read. The file
/// is deleted when the handle drops, error paths included.
fn stage_rule(rule: &str) -> Result<NamedTempFile, EvaluateError> {
    let mut file = tempfile::Builder::new().suffix(".yara").tempfile()?;
    file.write_all(rule.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Lab ids are plain directory names; anything with path structure in it is
/// treated as unknown.
fn is_plain_dir_name(lab_id: &str) -> bool {
    !lab_id.is_empty()
        && lab_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
