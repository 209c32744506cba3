use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub samples_dir: PathBuf,
    /// Explicit engine binary; falls back to PATH discovery when unset.
    pub yr_bin: Option<PathBuf>,
    pub scan_timeout_secs: u64,
    /// Whether responses list the names of matched files.
    pub include_matches: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let port = env::var("SCANNER_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap();

        let samples_dir = env::var("SAMPLES_DIR").unwrap_or_else(|_| "/samples".to_string());

        let yr_bin = env::var("YR_BIN").ok().map(PathBuf::from);

        let scan_timeout_secs = env::var("SCAN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap();

        let include_matches = env::var("INCLUDE_MATCHES")
            .map(|v| truthy(&v))
            .unwrap_or(false);

        Config {
            port,
            samples_dir: samples_dir.into(),
            yr_bin,
            scan_timeout_secs,
            include_matches,
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
