use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::backend::{HttpScanBackend, LocalScanBackend, ScanBackend};
use api::config::{Config, ScannerConfig};
use api::session::SessionStore;
use api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // CLI: Check for schema generation
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "config" && args.get(2).map(|s| s.as_str()) == Some("--schema")
    {
        let schema = schemars::schema_for!(Config);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = Config::load()?;

    // Dynamic backend selection
    let backend: Arc<dyn ScanBackend> = match &config.scanner {
        ScannerConfig::Remote(remote) => {
            tracing::info!("Relaying scans to {}", remote.url);
            Arc::new(HttpScanBackend::new(remote)?)
        }
        ScannerConfig::Local(local) => {
            tracing::info!("Scanning in-process from {}", local.samples_dir.display());
            Arc::new(LocalScanBackend::new(local))
        }
    };
    tracing::info!("Using scan backend: {}", backend.name());

    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(config.session.ttl_secs),
        Duration::from_secs(config.session.cooldown_secs),
    ));
    tracing::info!(
        "Labs open for submission: {} (session ttl {}s, upload cooldown {}s)",
        config.labs.join(", "),
        config.session.ttl_secs,
        config.session.cooldown_secs
    );

    let state = AppState {
        backend,
        sessions,
        config: config.clone(),
    };

    let app = api::api::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Submission gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
