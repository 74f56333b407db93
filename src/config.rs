use crate::reclaimer::{DEFAULT_IDLE_THRESHOLD, DEFAULT_RECLAIM_INTERVAL};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "intake-gateway")]
#[command(about = "Form intake gateway with per-client admission control")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    // Forms configuration (JSON)
    #[arg(short, long, default_value = "config/forms.json")]
    pub forms_config: PathBuf,

    // Seconds between reclaimer sweeps
    #[arg(long, default_value_t = DEFAULT_RECLAIM_INTERVAL.as_secs())]
    pub reclaim_interval: u64,

    // Seconds of inactivity before a visitor record is evicted
    #[arg(long, default_value_t = DEFAULT_IDLE_THRESHOLD.as_secs())]
    pub idle_threshold: u64,

    // Bearer token for the admin endpoints; admin is closed when unset
    #[arg(long, env = "INTAKE_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

impl Args {
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_secs(self.reclaim_interval.max(1))
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormsConfig {
    #[serde(default)]
    pub forms: HashMap<String, FormConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormConfig {
    #[serde(default)]
    pub referral_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

// Duration stays a string here; it is parsed when the policy is resolved
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub duration: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read forms config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse forms config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FormsConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), forms = config.forms.len(), "Forms configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_forms_config() {
        let raw = r#"{
            "forms": {
                "contact": {
                    "referral_url": "https://example.com/contact",
                    "allowed_origins": ["https://example.com"],
                    "rate_limit": { "requests": 3, "duration": "10s" }
                }
            }
        }"#;

        let config = FormsConfig::from_json(raw).unwrap();
        let contact = &config.forms["contact"];

        assert_eq!(contact.rate_limit.requests, 3);
        assert_eq!(contact.rate_limit.duration, "10s");
        assert_eq!(contact.referral_url, "https://example.com/contact");
        assert_eq!(contact.allowed_origins, vec!["https://example.com".to_string()]);
    }

    #[test]
    fn missing_rate_limit_is_a_parse_error() {
        assert!(FormsConfig::from_json(r#"{"forms": {"contact": {}}}"#).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FormsConfig::load(Path::new("/nonexistent/forms.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["intake-gateway"]);

        assert_eq!(args.port, 8080);
        assert_eq!(args.reclaim_interval(), Duration::from_secs(60));
        assert_eq!(args.idle_threshold(), Duration::from_secs(60));
    }
}
