//! Configuration for knitkit
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats; the default location is the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, timeouts)
//! - Knitting settings (needle window, alignment, start line, colors, flags)

use crate::error::{SettingsError, SettingsResult};
use knitkit_core::{Alignment, KnitOptions, NeedleRange, StartPosition, MAX_COLORS, PROTOCOL_API_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the default configuration
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port; empty picks the first candidate port
    pub port: String,
    /// Baud rate of the firmware
    pub baud_rate: u32,
    /// Bound on a single blocking read in milliseconds
    pub read_timeout_ms: u64,
    /// Pause after opening the port in milliseconds
    pub settle_delay_ms: u64,
    /// Bound on waiting for `cnfInfo`/`cnfStart` in milliseconds
    pub response_timeout_ms: u64,
    /// Bound on silence between line requests, disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
    /// Ask the firmware for its API version before knitting
    pub handshake: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            settle_delay_ms: 1000,
            response_timeout_ms: 5000,
            idle_timeout_ms: None,
            handshake: true,
        }
    }
}

impl ConnectionSettings {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Response timeout as a duration
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Idle timeout as a duration
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Knitting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnittingSettings {
    /// First needle of the knit window
    pub start_needle: i32,
    /// Last needle of the knit window
    pub stop_needle: i32,
    /// Image row knitting starts at
    pub start_line: u32,
    /// Number of colors the image is quantized into
    pub num_colors: u8,
    /// Ask the firmware for status reports while knitting
    pub continuous_reporting: bool,
    /// Restart the image instead of finishing
    pub infinite_repeat: bool,
    /// Reject firmware speaking another API version
    pub check_api_version: bool,
    /// Placement of the image in the knit window
    pub alignment: Alignment,
}

impl Default for KnittingSettings {
    fn default() -> Self {
        Self {
            start_needle: 0,
            stop_needle: 199,
            start_line: 0,
            num_colors: 2,
            continuous_reporting: false,
            infinite_repeat: false,
            check_api_version: true,
            alignment: Alignment::Center,
        }
    }
}

impl KnittingSettings {
    /// Unplaced needle range of the knit window
    pub fn needle_range(&self) -> SettingsResult<NeedleRange> {
        Ok(NeedleRange::new(self.start_needle, self.stop_needle)?)
    }

    /// Start position of the job
    pub fn start_position(&self) -> StartPosition {
        StartPosition::new(self.start_line)
    }

    /// Session options of the job
    pub fn knit_options(&self) -> KnitOptions {
        KnitOptions {
            alignment: self.alignment,
            continuous_reporting: self.continuous_reporting,
            infinite_repeat: self.infinite_repeat,
            expected_api_version: self.check_api_version.then_some(PROTOCOL_API_VERSION),
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recent files list size
    pub max_recent_files: usize,
    /// Recently knitted images
    pub recent_files: Vec<PathBuf>,
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Knitting settings
    pub knitting: KnittingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_recent_files: 10,
            recent_files: Vec::new(),
            connection: ConnectionSettings::default(),
            knitting: KnittingSettings::default(),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform path of the default configuration file
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("knitkit").join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load config from file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if self.connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid("connection.read_timeout_ms", "must be > 0"));
        }
        if self.connection.response_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.response_timeout_ms",
                "must be > 0",
            ));
        }
        if self.connection.idle_timeout_ms == Some(0) {
            return Err(SettingsError::invalid(
                "connection.idle_timeout_ms",
                "must be > 0 when set",
            ));
        }

        let colors = self.knitting.num_colors;
        if colors == 0 || colors > MAX_COLORS {
            return Err(SettingsError::invalid(
                "knitting.num_colors",
                format!("{} is outside 1..={}", colors, MAX_COLORS),
            ));
        }

        self.knitting.needle_range()?;
        Ok(())
    }

    /// Add file to recent files list
    pub fn add_recent_file(&mut self, path: PathBuf) {
        self.recent_files.retain(|f| f != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(self.max_recent_files);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
