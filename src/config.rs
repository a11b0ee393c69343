use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::codec::{ObfuscationCodec, DEFAULT_KEY};
use crate::error::TrackResult;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TrailkeepConfig {
    pub logging: LoggingConfig,
    pub remote: RemoteConfig,
    pub codec: CodecConfig,
    pub retention: RetentionConfig,
    pub sampler: SamplerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Local append-only diagnostic log file.
    pub file: String,
    /// Mirror tracing events into `file`.
    pub capture: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    /// `sqlite`, `firebase` or `memory`.
    pub backend: String,
    pub db_path: String,
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CodecConfig {
    pub key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub capacity: usize,
    pub merge_threshold_meters: f64,
    pub locations_path: String,
    pub logs_path: String,
    /// Uploaded log snapshots kept remotely; older ones are pruned after upload.
    pub log_retention: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let file = default_trailkeep_dir()
            .join("trailkeep_logs.txt")
            .to_string_lossy()
            .into_owned();
        Self {
            level: "info".into(),
            file,
            capture: true,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let db_path = default_trailkeep_dir()
            .join("remote.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "sqlite".into(),
            db_path,
            base_url: String::new(),
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.into(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            merge_threshold_meters: 10.0,
            locations_path: "locations".into(),
            logs_path: "logs".into(),
            log_retention: 10,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Returns `~/.trailkeep/`
pub fn default_trailkeep_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".trailkeep")
}

/// Returns the default config file path: `~/.trailkeep/config.toml`
pub fn default_config_path() -> PathBuf {
    default_trailkeep_dir().join("config.toml")
}

impl TrailkeepConfig {
    /// Load config from TOML file (if it exists), apply env var overrides, validate.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TrailkeepConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRAILKEEP_KEY") {
            self.codec.key = val;
        }
        if let Ok(val) = std::env::var("TRAILKEEP_BACKEND") {
            self.remote.backend = val;
        }
        if let Ok(val) = std::env::var("TRAILKEEP_DB") {
            self.remote.db_path = val;
        }
        if let Ok(val) = std::env::var("TRAILKEEP_REMOTE_URL") {
            self.remote.base_url = val;
        }
        if let Ok(val) = std::env::var("TRAILKEEP_AUTH_TOKEN") {
            self.remote.auth_token = Some(val);
        }
        if let Ok(val) = std::env::var("TRAILKEEP_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TRAILKEEP_LOG_FILE") {
            self.logging.file = val;
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ObfuscationCodec::new(&self.codec.key).context("invalid [codec] section")?;
        anyhow::ensure!(self.retention.capacity > 0, "retention.capacity must be at least 1");
        anyhow::ensure!(
            self.retention.merge_threshold_meters.is_finite()
                && self.retention.merge_threshold_meters > 0.0,
            "retention.merge_threshold_meters must be a positive number"
        );
        anyhow::ensure!(
            self.retention.locations_path != self.retention.logs_path,
            "locations_path and logs_path must differ"
        );
        anyhow::ensure!(self.sampler.interval_secs > 0, "sampler.interval_secs must be at least 1");
        Ok(())
    }

    pub fn codec(&self) -> TrackResult<ObfuscationCodec> {
        Ok(ObfuscationCodec::new(&self.codec.key)?)
    }

    pub fn resolved_log_path(&self) -> PathBuf {
        expand_tilde(&self.logging.file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
