use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Labs open for submissions, in the order they are listed to clients
    #[serde(default = "default_labs")]
    pub labs: Vec<String>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionConfig {
    /// Seconds an anonymous session stays valid after it is created
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Minimum seconds between accepted submissions per session
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            ttl_secs: default_session_ttl(),
            cooldown_secs: default_cooldown(),
        }
    }
}

/// Which scan backend handles submissions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum ScannerConfig {
    /// Relay scans to a separately deployed scan service
    #[serde(rename = "remote")]
    Remote(RemoteScannerConfig),
    /// Run the corpus evaluation in-process
    #[serde(rename = "local")]
    Local(LocalScannerConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoteScannerConfig {
    /// Scan endpoint of the scan service
    #[serde(default = "default_scanner_url")]
    pub url: String,
    /// Per-request timeout towards the scan service
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalScannerConfig {
    /// Directory holding the per-lab corpora plus the shared benign/ and
    /// random/ sets
    pub samples_dir: PathBuf,
    /// Engine binary; discovered on PATH when unset
    #[serde(default)]
    pub yr_bin: Option<PathBuf>,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
    /// Include matched file names in responses
    #[serde(default)]
    pub include_matches: bool,
}

fn default_port() -> u16 {
    8000
}

fn default_labs() -> Vec<String> {
    vec!["lab1".to_string(), "lab2".to_string()]
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_cooldown() -> u64 {
    60
}

fn default_scanner_url() -> String {
    "http://scanner:5000/scan".to_string()
}

fn default_scan_timeout() -> u64 {
    30
}

fn default_scanner() -> ScannerConfig {
    ScannerConfig::Remote(RemoteScannerConfig {
        url: default_scanner_url(),
        timeout_secs: default_scan_timeout(),
    })
}

impl Config {
    /// Load configuration from the TOML file named by `API_CONFIG`
    /// (default `api.toml`), falling back to environment variables when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let config_path = env::var("API_CONFIG").unwrap_or_else(|_| "api.toml".to_string());

        if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {config_path}"))?;
            let config: Config =
                toml::from_str(&content).context("Failed to parse TOML config")?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .context("Invalid PORT")?;

        let labs = match env::var("LABS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => default_labs(),
        };

        let ttl_secs = env::var("SESSION_TTL_SECS")
            .unwrap_or_else(|_| default_session_ttl().to_string())
            .parse()
            .context("Invalid SESSION_TTL_SECS")?;

        let cooldown_secs = env::var("UPLOAD_COOLDOWN_SECS")
            .unwrap_or_else(|_| default_cooldown().to_string())
            .parse()
            .context("Invalid UPLOAD_COOLDOWN_SECS")?;

        let url = env::var("SCANNER_URL").unwrap_or_else(|_| default_scanner_url());

        let timeout_secs = env::var("SCANNER_TIMEOUT_SECS")
            .unwrap_or_else(|_| default_scan_timeout().to_string())
            .parse()
            .context("Invalid SCANNER_TIMEOUT_SECS")?;

        Ok(Config {
            server: ServerConfig { port },
            labs,
            session: SessionConfig {
                ttl_secs,
                cooldown_secs,
            },
            scanner: ScannerConfig::Remote(RemoteScannerConfig { url, timeout_secs }),
        })
    }
}
