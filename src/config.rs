use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::monitor::Settings;
use crate::system::discover::DiscoveryOptions;
use crate::system::enforce::Limits;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub root_pid: u32,
    pub recurse: bool,
    pub delay_ms: u64,
    pub repeat: bool,
    pub json: bool,
    pub ignore_permission_errors: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            root_pid: 1,
            recurse: true,
            delay_ms: 0,
            repeat: false,
            json: false,
            ignore_permission_errors: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub memory_mb: u64,
    pub cpu_percent: f64,
    pub pid_count: usize,
    pub exclude_pids: Vec<u32>,
    pub signal: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            memory_mb: 0,
            cpu_percent: 0.0,
            pid_count: 0,
            exclude_pids: Vec::new(),
            signal: "kill".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            discovery: DiscoveryOptions {
                root_pid: self.general.root_pid,
                recurse: self.general.recurse,
                exclude: self.limits.exclude_pids.iter().copied().collect::<HashSet<_>>(),
                ignore_permission_errors: self.general.ignore_permission_errors,
            },
            limits: Limits {
                memory_mb: self.limits.memory_mb,
                cpu_percent: self.limits.cpu_percent,
                pid_count: self.limits.pid_count,
            },
            delay: Duration::from_millis(self.general.delay_ms),
            repeat: self.general.repeat,
        }
    }
}

/// A config file that exists but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("treetop").join("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Ok(Config::default()),
    }
}

/// A missing file yields the defaults. Anything else that goes wrong is
/// returned so it can be reported once logging is up.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Log a config file that was skipped in favour of the defaults.
pub fn report_ignored(err: &ConfigError) {
    let reason = match err {
        ConfigError::Read { source, .. } => source.to_string(),
        ConfigError::Parse { source, .. } => source.to_string(),
    };
    warn!(path = %err.path().display(), %reason, "ignoring config file, using defaults");
}
