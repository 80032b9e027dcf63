use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use crate::nats::NatsConfig;

/// Complete radarview configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarConfig {
    #[serde(default)]
    pub transport: NatsConfig,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Dump file configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DumpConfig {
    /// Directory receiving one dump file per run
    #[serde(default = "default_dump_directory")]
    pub directory: PathBuf,
    /// Flush the dump every this many received messages
    #[serde(default = "default_flush_every")]
    pub flush_every: u64,
}

fn default_dump_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_flush_every() -> u64 {
    1000
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            directory: default_dump_directory(),
            flush_every: default_flush_every(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Background image; its pixel size is the drawing space
    #[serde(default = "default_background")]
    pub background: PathBuf,
    /// Physical field width covered by the background (meters)
    #[serde(default = "default_field_width")]
    pub field_width: f64,
    /// Physical field height covered by the background (meters)
    #[serde(default = "default_field_height")]
    pub field_height: f64,
    /// Render loop cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_window_title")]
    pub window_title: String,
}

fn default_background() -> PathBuf {
    PathBuf::from("ground.png")
}

fn default_field_width() -> f64 {
    28.0
}

fn default_field_height() -> f64 {
    15.0
}

fn default_poll_interval_ms() -> u64 {
    14
}

fn default_window_title() -> String {
    "radarview".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            field_width: default_field_width(),
            field_height: default_field_height(),
            poll_interval_ms: default_poll_interval_ms(),
            window_title: default_window_title(),
        }
    }
}

/// Configuration errors; all are fatal at startup
#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, e) => {
                write!(f, "cannot read config file {}: {}", path.display(), e)
            }
            ConfigError::Parse(e) => write!(f, "invalid config file: {}", e),
            ConfigError::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RadarConfig {
    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// RADARVIEW_URL replaces the broker address, RADARVIEW_DRAW_TOPIC the
    /// draw topic.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RADARVIEW_URL") {
            self.transport.url = url;
        }
        if let Some(topic) = lookup("RADARVIEW_DRAW_TOPIC") {
            self.transport.draw_topic = topic;
        }
    }

    /// Check the settings the loop relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.transport;
        if t.url.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.url is empty".to_string()));
        }
        if t.topics.is_empty() {
            return Err(ConfigError::Invalid("transport.topics is empty".to_string()));
        }
        if t.topics.iter().any(|topic| topic.is_empty()) {
            return Err(ConfigError::Invalid("transport.topics contains an empty topic".to_string()));
        }
        if !t.topics.contains(&t.draw_topic) {
            return Err(ConfigError::Invalid(format!(
                "draw topic '{}' is not among the subscribed topics",
                t.draw_topic
            )));
        }
        if self.dump.flush_every == 0 {
            return Err(ConfigError::Invalid("dump.flush_every must be positive".to_string()));
        }

        let d = &self.display;
        if !(d.field_width > 0.0 && d.field_width.is_finite())
            || !(d.field_height > 0.0 && d.field_height.is_finite())
        {
            return Err(ConfigError::Invalid(format!(
                "field extent must be positive, got {} x {}",
                d.field_width, d.field_height
            )));
        }

        Ok(())
    }
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<RadarConfig, ConfigError> {
    let config: RadarConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a TOML file, with environment overrides
pub fn load_config(path: &Path) -> Result<RadarConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let mut config: RadarConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
