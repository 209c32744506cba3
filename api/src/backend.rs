use async_trait::async_trait;
use reqwest::StatusCode;
use scanner::{CorpusLayout, EvaluateError, Evaluator, ScanReport, ScanRequest, YrScanner};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{LocalScannerConfig, RemoteScannerConfig};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("lab not found upstream")]
    LabNotFound,

    #[error("scan service unreachable: {0}")]
    Unavailable(String),

    #[error("scan service timed out")]
    Timeout,

    #[error("scan service error: {detail}")]
    Upstream {
        status: Option<u16>,
        detail: String,
    },
}

/// Where submissions get scanned. The gateway only ever talks to this trait,
/// so deployments can relay to a scan container or embed the evaluation
/// in-process.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, rule: &str, lab_id: &str) -> Result<ScanReport, BackendError>;
}

/// Relays scans to a separately deployed scan service over HTTP.
pub struct HttpScanBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpScanBackend {
    pub fn new(config: &RemoteScannerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpScanBackend {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ScanBackend for HttpScanBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn evaluate(&self, rule: &str, lab_id: &str) -> Result<ScanReport, BackendError> {
        let request = ScanRequest {
            rule: rule.to_string(),
            lab_id: lab_id.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::LabNotFound);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Upstream {
                status: Some(status.as_u16()),
                detail,
            });
        }

        response.json().await.map_err(|e| BackendError::Upstream {
            status: Some(status.as_u16()),
            detail: format!("unreadable scan report: {e}"),
        })
    }
}

/// Runs the corpus evaluation in the gateway process, for single-container
/// deployments.
pub struct LocalScanBackend {
    evaluator: Evaluator,
}

impl LocalScanBackend {
    pub fn new(config: &LocalScannerConfig) -> Self {
        let engine = Arc::new(YrScanner::new(
            config.yr_bin.clone(),
            Duration::from_secs(config.scan_timeout_secs),
        ));
        let evaluator = Evaluator::new(
            engine,
            CorpusLayout::new(&config.samples_dir),
            config.include_matches,
        );
        LocalScanBackend { evaluator }
    }

    pub fn with_evaluator(evaluator: Evaluator) -> Self {
        LocalScanBackend { evaluator }
    }
}

#[async_trait]
impl ScanBackend for LocalScanBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn evaluate(&self, rule: &str, lab_id: &str) -> Result<ScanReport, BackendError> {
        self.evaluator.evaluate(rule, lab_id).await.map_err(|e| match e {
            EvaluateError::LabNotFound { .. } => BackendError::LabNotFound,
            other => BackendError::Upstream {
                status: None,
                detail: other.to_string(),
            },
        })
    }
}
