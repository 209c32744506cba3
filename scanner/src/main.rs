use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use scanner::{
    Config, CorpusLayout, EvaluateError, Evaluator, ScanEngine, ScanRequest, YrScanner,
};

#[derive(Clone)]
struct AppState {
    evaluator: Arc<Evaluator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let engine = Arc::new(YrScanner::new(
        config.yr_bin.clone(),
        Duration::from_secs(config.scan_timeout_secs),
    ));
    tracing::info!(
        "Scan engine: {} at {} (timeout {}s)",
        engine.name(),
        engine.bin().display(),
        config.scan_timeout_secs
    );

    let evaluator = Arc::new(Evaluator::new(
        engine,
        CorpusLayout::new(&config.samples_dir),
        config.include_matches,
    ));
    tracing::info!("Serving samples from {}", config.samples_dir.display());

    let state = AppState { evaluator };

    let app = Router::new()
        .route("/health", get(health))
        .route("/scan", post(scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Scan service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn scan(State(state): State<AppState>, Json(request): Json<ScanRequest>) -> impl IntoResponse {
    tracing::info!("Scanning rule for lab '{}'", request.lab_id);

    match state.evaluator.evaluate(&request.rule, &request.lab_id).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e @ EvaluateError::LabNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
