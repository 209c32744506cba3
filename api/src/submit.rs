use serde::Serialize;
use tracing::{info, warn};

use crate::backend::BackendError;
use crate::error::ApiError;
use crate::session::ResolvedSession;
use crate::state::AppState;
use crate::validate::validate_rule_source;
use scanner::{ScanReport, Verdict};

/// Body returned for a submission that was scanned, passed or not.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub lab_id: String,
    pub verdict: String,
    pub result: ScanReport,
}

/// Runs one submission through the whole pipeline: session resolution, rate
/// limiting, lab and payload validation, the scan itself, verdict
/// classification.
///
/// The resolved session comes back alongside the outcome so the transport
/// can set the cookie on error responses too. The cooldown only starts after
/// a scan actually completed; rejected or failed submissions stay free to
/// retry.
pub async fn handle_submission(
    state: &AppState,
    presented_session: Option<&str>,
    lab_id: &str,
    payload: &[u8],
) -> (ResolvedSession, Result<SubmitResponse, ApiError>) {
    let session = state.sessions.resolve(presented_session);
    let outcome = run_pipeline(state, &session, lab_id, payload).await;
    (session, outcome)
}

async fn run_pipeline(
    state: &AppState,
    session: &ResolvedSession,
    lab_id: &str,
    payload: &[u8],
) -> Result<SubmitResponse, ApiError> {
    let decision = state.sessions.check_rate_limit(&session.id);
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    if !state.config.labs.iter().any(|lab| lab == lab_id) {
        return Err(ApiError::LabNotFound {
            lab_id: lab_id.to_string(),
            available: state.config.labs.clone(),
        });
    }

    let rule = std::str::from_utf8(payload).map_err(|_| ApiError::InvalidEncoding)?;

    if !validate_rule_source(rule) {
        return Err(ApiError::InvalidRuleSyntax);
    }

    let report = match state.backend.evaluate(rule, lab_id).await {
        Ok(report) => report,
        // The lab passed the configured-labs gate above but has no corpus on
        // the scan side; report it the same way as an unknown lab.
        Err(BackendError::LabNotFound) => {
            return Err(ApiError::LabNotFound {
                lab_id: lab_id.to_string(),
                available: state.config.labs.clone(),
            });
        }
        Err(BackendError::Timeout) => return Err(ApiError::ScannerTimeout),
        Err(BackendError::Unavailable(detail)) => {
            warn!("Scan backend unreachable: {}", detail);
            return Err(ApiError::ScannerUnavailable);
        }
        Err(BackendError::Upstream { status, detail }) => {
            warn!("Scan backend error (status {:?}): {}", status, detail);
            return Err(ApiError::ScannerError { detail });
        }
    };

    state.sessions.record_upload(&session.id);

    let verdict = Verdict::classify(&report);
    info!(
        session = %session.id,
        lab = %lab_id,
        passed = report.passed,
        "Submission evaluated: {}",
        verdict
    );

    Ok(SubmitResponse {
        status: "success",
        lab_id: lab_id.to_string(),
        verdict: verdict.label().to_string(),
        result: report,
    })
}
