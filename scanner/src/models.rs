use serde::{Deserialize, Serialize};
use std::fmt;

/// Scan request as posted by the submission gateway: the raw rule source and
/// the lab whose samples it is supposed to detect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub rule: String,
    pub lab_id: String,
}

/// Outcome of running one rule over one corpus directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusResult {
    pub total_files: usize,
    pub matched_files: usize,
    /// Matched file names, only populated when the service is configured to
    /// disclose them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
}

impl CorpusResult {
    /// A result with zero matches, used for empty directories and for scans
    /// that faulted and degrade to "nothing matched".
    pub fn unmatched(total_files: usize, include_matches: bool) -> Self {
        Self {
            total_files,
            matched_files: 0,
            matches: include_matches.then(Vec::new),
        }
    }
}

/// Aggregated report over the three corpora a submission is judged against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub lab: CorpusResult,
    pub benign: CorpusResult,
    pub random: CorpusResult,
    pub passed: bool,
}

impl ScanReport {
    pub fn new(lab: CorpusResult, benign: CorpusResult, random: CorpusResult) -> Self {
        let passed = lab.matched_files == lab.total_files
            && benign.matched_files == 0
            && random.matched_files == 0;
        Self {
            lab,
            benign,
            random,
            passed,
        }
    }
}

/// Human-facing classification of a scan report. Checked in order: false
/// positives dominate everything else, so a rule that also matches clean
/// samples is reported as a false positive even when it caught the whole lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    BenignFalsePositive,
    RandomFalsePositive,
    NoDetection,
    PartialDetection,
    FullDetection,
}

impl Verdict {
    pub fn classify(report: &ScanReport) -> Self {
        if report.benign.matched_files > 0 {
            Verdict::BenignFalsePositive
        } else if report.random.matched_files > 0 {
            Verdict::RandomFalsePositive
        } else if report.lab.total_files > 0 && report.lab.matched_files == 0 {
            Verdict::NoDetection
        } else if report.lab.matched_files < report.lab.total_files {
            Verdict::PartialDetection
        } else {
            Verdict::FullDetection
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::BenignFalsePositive => "False Positive Detected (benign)",
            Verdict::RandomFalsePositive => "False Positive Detected (random)",
            Verdict::NoDetection => "No Samples Detected",
            Verdict::PartialDetection => "Partial Detection",
            Verdict::FullDetection => "All Samples Detected",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
