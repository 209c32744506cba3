use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every fault a submission can surface, one stable machine code per kind.
/// The JSON body always carries `error` (the code) and `detail` (prose);
/// some variants attach extra fields.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file field found")]
    MissingFile,

    #[error("Failed to read file: {detail}")]
    MalformedUpload { detail: String },

    #[error("File must be a valid text file")]
    InvalidEncoding,

    #[error("Invalid YARA rule format. Must contain 'rule <name> {{ ... }}'")]
    InvalidRuleSyntax,

    #[error("Lab '{lab_id}' not found. Available labs: {}", .available.join(", "))]
    LabNotFound {
        lab_id: String,
        available: Vec<String>,
    },

    #[error("Please wait {retry_after_secs}s before submitting again")]
    RateLimited { retry_after_secs: u64 },

    #[error("Scanner service unavailable")]
    ScannerUnavailable,

    #[error("Scanner service timeout")]
    ScannerTimeout,

    #[error("Scanner error: {detail}")]
    ScannerError { detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile
            | ApiError::MalformedUpload { .. }
            | ApiError::InvalidEncoding
            | ApiError::InvalidRuleSyntax => StatusCode::BAD_REQUEST,
            ApiError::LabNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ScannerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ScannerTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::ScannerError { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingFile => "missing_file",
            ApiError::MalformedUpload { .. } => "malformed_upload",
            ApiError::InvalidEncoding => "invalid_encoding",
            ApiError::InvalidRuleSyntax => "invalid_rule_syntax",
            ApiError::LabNotFound { .. } => "lab_not_found",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::ScannerUnavailable => "scanner_unavailable",
            ApiError::ScannerTimeout => "scanner_timeout",
            ApiError::ScannerError { .. } => "scanner_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code(),
            "detail": self.to_string(),
        });

        match &self {
            ApiError::LabNotFound { available, .. } => {
                body["labs"] = json!(available);
            }
            ApiError::RateLimited { retry_after_secs } => {
                body["retry_after_secs"] = json!(retry_after_secs);
            }
            _ => {}
        }

        let mut response = (self.status(), Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_fault_kinds() {
        assert_eq!(ApiError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MalformedUpload {
                detail: "stream ended".to_string()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidEncoding.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidRuleSyntax.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::LabNotFound {
                lab_id: "lab9".to_string(),
                available: vec!["lab1".to_string()],
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::RateLimited {
                retry_after_secs: 5
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::ScannerUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::ScannerTimeout.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::ScannerError {
                detail: "x".to_string()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn lab_not_found_lists_available_labs() {
        let err = ApiError::LabNotFound {
            lab_id: "lab9".to_string(),
            available: vec!["lab1".to_string(), "lab2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Lab 'lab9' not found. Available labs: lab1, lab2"
        );
        assert_eq!(err.code(), "lab_not_found");
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let response = ApiError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("42")
        );
    }
}
