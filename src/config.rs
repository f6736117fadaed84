//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::source::SourceKind;
use crate::constants::*;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sampling configuration
    pub monitor: MonitorConfig,

    /// Observer bridge configuration
    pub ui: UiConfig,
}

/// Sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Which amplitude source to sample
    pub source: SourceKind,

    /// Alert boundary on the display scale
    pub threshold_db: f64,

    /// Period between two ticks
    pub sample_interval_ms: u64,

    /// Input device name (host default when unset)
    pub device_name: Option<String>,

    /// Where the per-session scratch file is created
    pub scratch_dir: Option<PathBuf>,

    /// Initial answer of the permission collaborator. Denied unless the
    /// config file or `--allow-mic` grants it.
    pub permission_granted: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Device,
            threshold_db: DEFAULT_THRESHOLD_DB,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            device_name: None,
            scratch_dir: None,
            permission_granted: false,
        }
    }
}

impl MonitorConfig {
    /// Configured scratch directory, else the app cache dir, else the system temp dir
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.cache_dir().to_path_buf()))
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Observer bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Serve the HTTP/WebSocket bridge
    pub enabled: bool,

    /// Bind address for web server
    pub bind_address: String,

    /// HTTP server port
    pub http_port: u16,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            enable_cors: true,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "sound-level-monitor", "sound-monitor")
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the default path, falling back to defaults when absent
    pub fn load_or_default() -> crate::Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values the sampler cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.monitor.sample_interval_ms == 0 {
            return Err(crate::Error::Config("sample_interval_ms must be positive".to_string()));
        }
        if !self.monitor.threshold_db.is_finite() {
            return Err(crate::Error::Config("threshold_db must be finite".to_string()));
        }
        Ok(())
    }
}
