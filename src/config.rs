use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DIGIT_RANGE: RangeInclusive<u32> = 1..=9;
pub const ITEM_RANGE: RangeInclusive<usize> = 2..=25;
pub const DURATION_MS_RANGE: RangeInclusive<u64> = 50..=5000;
pub const FONT_SIZE_RANGE: RangeInclusive<u16> = 10..=500;
pub const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid json: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw settings as edited by a user, a CLI or a config file. Nothing here is
/// trusted; [`Config::validate`] is the only way into the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub digit_count: u32,
    pub item_count: usize,
    pub flash_duration_ms: u64,
    pub interval_duration_ms: u64,
    pub allow_subtraction: bool,
    pub continuous_mode: bool,
    pub narration_enabled: bool,
    pub language_tag: String,
    pub font_size: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            digit_count: 2,
            item_count: 5,
            flash_duration_ms: 800,
            interval_duration_ms: 300,
            allow_subtraction: false,
            continuous_mode: false,
            narration_enabled: false,
            language_tag: DEFAULT_LANGUAGE.to_string(),
            font_size: 96,
        }
    }
}

impl Config {
    /// Clamp every numeric field to its documented bounds.
    pub fn validate(&self) -> Settings {
        let language_tag = match self.language_tag.trim() {
            "" => DEFAULT_LANGUAGE.to_string(),
            tag => tag.to_string(),
        };

        Settings {
            digit_count: clamp(self.digit_count, &DIGIT_RANGE),
            item_count: clamp(self.item_count, &ITEM_RANGE),
            flash_duration_ms: clamp(self.flash_duration_ms, &DURATION_MS_RANGE),
            interval_duration_ms: clamp(self.interval_duration_ms, &DURATION_MS_RANGE),
            allow_subtraction: self.allow_subtraction,
            continuous_mode: self.continuous_mode,
            narration_enabled: self.narration_enabled,
            language_tag,
            font_size: clamp(self.font_size, &FONT_SIZE_RANGE),
        }
    }
}

fn clamp<T: Ord + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    value.clamp(*range.start(), *range.end())
}

/// Validated, immutable settings snapshot consumed by the playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    digit_count: u32,
    item_count: usize,
    flash_duration_ms: u64,
    interval_duration_ms: u64,
    allow_subtraction: bool,
    continuous_mode: bool,
    narration_enabled: bool,
    language_tag: String,
    font_size: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().validate()
    }
}

impl From<&Config> for Settings {
    fn from(cfg: &Config) -> Self {
        cfg.validate()
    }
}

impl From<&Settings> for Config {
    fn from(s: &Settings) -> Self {
        Self {
            digit_count: s.digit_count,
            item_count: s.item_count,
            flash_duration_ms: s.flash_duration_ms,
            interval_duration_ms: s.interval_duration_ms,
            allow_subtraction: s.allow_subtraction,
            continuous_mode: s.continuous_mode,
            narration_enabled: s.narration_enabled,
            language_tag: s.language_tag.clone(),
            font_size: s.font_size,
        }
    }
}

impl Settings {
    pub fn digit_count(&self) -> u32 {
        self.digit_count
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_millis(self.interval_duration_ms)
    }

    pub fn allow_subtraction(&self) -> bool {
        self.allow_subtraction
    }

    pub fn continuous_mode(&self) -> bool {
        self.continuous_mode
    }

    pub fn narration_enabled(&self) -> bool {
        self.narration_enabled
    }

    pub fn language_tag(&self) -> &str {
        &self.language_tag
    }

    /// Presentation only; the engine passes it through.
    pub fn font_size(&self) -> u16 {
        self.font_size
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
}

/// Read-only JSON config file. Settings are never written back.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "anzan") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("anzan_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read that reports why the file could not be used.
    pub fn read(&self) -> Result<Config, ConfigError> {
        let bytes = fs::read(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match self.read() {
            Ok(cfg) => cfg,
            Err(ConfigError::Read { .. }) => Config::default(),
            Err(err) => {
                warn!(%err, "ignoring config file");
                Config::default()
            }
        }
    }
}
