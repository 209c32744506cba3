pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers::{health, list_labs, submit_rule};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "YARA Lab Submission Gateway Online" }))
        .route("/labs", get(list_labs))
        .route("/health", get(health))
        .route("/submit/:lab_id", post(submit_rule))
}
