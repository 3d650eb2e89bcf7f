use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use evidence_engine::{
    BackendSettings, EngineConfig, PollSettings, StreamSettings, TransportPreference,
};
use evidence_logging::{evidence_info, parse_level};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cli::Cli;
use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "evidence.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Live stream, falling back to polling when it keeps failing
    #[default]
    Auto,
    /// Live stream only
    Stream,
    /// Fixed-interval polling only
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub error_interval_ms: u64,
    pub max_errors: u32,
    pub max_duration_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            error_interval_ms: 5_000,
            max_errors: 3,
            max_duration_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub retry_ms: u64,
    /// Consecutive stream errors before switching to polling; 0 never switches.
    pub fallback_after_errors: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_ms: 3_000,
            fallback_after_errors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogDestination,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub project_id: String,
    pub transport: TransportMode,
    pub poll: PollConfig,
    pub stream: StreamConfig,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: BackendSettings::default().base_url,
            project_id: String::new(),
            transport: TransportMode::Auto,
            poll: PollConfig::default(),
            stream: StreamConfig::default(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            log: LogConfig::default(),
        }
    }
}

/// Reads `explicit`, or `./evidence.ron` when no path was given.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(text) => {
            let config = parse(&text, &path)?;
            evidence_info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Read { path, source }),
    }
}

pub fn parse(text: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    ron::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl AppConfig {
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(backend) = &cli.backend {
            self.backend_url = backend.clone();
        }
        if let Some(project) = &cli.project {
            self.project_id = project.clone();
        }
        if let Some(transport) = cli.transport {
            self.transport = transport;
        }
        if let Some(destination) = cli.log {
            self.log.destination = destination;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "project_id is not set; pass --project or set it in evidence.ron".to_string(),
            ));
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll.max_errors == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_errors must be greater than zero".to_string(),
            ));
        }
        self.log_level().map(|_| ())
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.log.level)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown log level {:?}", self.log.level)))
    }

    pub fn engine_config(&self) -> EngineConfig {
        let connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        EngineConfig {
            backend: BackendSettings {
                base_url: self.backend_url.clone(),
                connect_timeout,
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            project_id: self.project_id.clone(),
            transport: match self.transport {
                TransportMode::Auto => TransportPreference::Auto,
                TransportMode::Stream => TransportPreference::Stream,
                TransportMode::Poll => TransportPreference::Poll,
            },
            stream: StreamSettings {
                retry: Duration::from_millis(self.stream.retry_ms),
                connect_timeout,
            },
            poll: PollSettings {
                interval: Duration::from_millis(self.poll.interval_ms),
                error_interval: Duration::from_millis(self.poll.error_interval_ms),
                max_errors: self.poll.max_errors,
                max_duration: Duration::from_secs(self.poll.max_duration_secs),
            },
            // Only the automatic mode may leave the stream.
            fallback_after_errors: match self.transport {
                TransportMode::Auto => self.stream.fallback_after_errors,
                TransportMode::Stream | TransportMode::Poll => 0,
            },
        }
    }
}
