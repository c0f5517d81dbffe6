//! Engine-wide configuration, aggregating per-component configuration.

use crate::types::snapshot::RetentionPolicy;
use context_engine_common::config::ValidatedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the `CompressionPipeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Fraction of the *available* budget (never `window_tokens` itself)
    /// that triggers a compression pass.
    pub trigger_ratio: f64,
    /// Messages never eligible for compression, most-recent-first.
    pub keep_recent: usize,
    /// Turns-since-creation promotion threshold for level 1 → 2.
    pub t1_turns: u32,
    /// Turns-since-creation promotion threshold for level 2 → 3; must exceed `t1_turns`.
    pub t2_turns: u32,
    #[serde(with = "duration_secs")]
    pub summarization_timeout: Duration,
    /// Reserve tokens held back for generation headroom.
    pub reserve_tokens: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            trigger_ratio: 0.80,
            keep_recent: 5,
            t1_turns: 6,
            t2_turns: 14,
            summarization_timeout: Duration::from_secs(60),
            reserve_tokens: 512,
        }
    }
}

/// Configuration for the `SnapshotCoordinator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub retention: RetentionPolicy,
    #[serde(with = "duration_secs")]
    pub io_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            io_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for `SizingController` and `VRAMMonitor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub overhead_multiplier: f64,
    pub low_memory_free_ratio: f64,
    pub critical_memory_free_ratio: f64,
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    pub conservative_default_window: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            overhead_multiplier: 1.3,
            low_memory_free_ratio: 0.20,
            critical_memory_free_ratio: 0.10,
            poll_interval: Duration::from_secs(5),
            conservative_default_window: 4096,
        }
    }
}

/// Top-level, validated configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub compression: CompressionConfig,
    pub snapshot: SnapshotConfig,
    pub sizing: SizingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("compression.t2_turns ({t2}) must exceed compression.t1_turns ({t1})")]
    AgingThresholdsOutOfOrder { t1: u32, t2: u32 },

    #[error("compression.trigger_ratio must be in (0.0, 1.0], got {0}")]
    InvalidTriggerRatio(f64),

    #[error("sizing.{field} must be in (0.0, 1.0], got {value}")]
    InvalidRatio { field: &'static str, value: f64 },

    #[error("failed to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path:?} as YAML: {source}")]
    Parse { path: PathBuf, source: serde_yaml_ng::Error },
}

impl EngineConfig {
    /// Default config file location, mirroring the teacher's per-OS config
    /// directory convention: `<config_dir>/context-engine/config.yaml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("context-engine").join("config.yaml"))
    }

    /// Loads and validates configuration from a YAML file. A missing file is
    /// not an error — it falls back to `EngineConfig::default()` so the
    /// engine runs unconfigured out of the box.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Self =
            serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }
}

impl ValidatedConfig for EngineConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.compression.t2_turns <= self.compression.t1_turns {
            return Err(ConfigError::AgingThresholdsOutOfOrder {
                t1: self.compression.t1_turns,
                t2: self.compression.t2_turns,
            });
        }
        if !(0.0..=1.0).contains(&self.compression.trigger_ratio) || self.compression.trigger_ratio <= 0.0 {
            return Err(ConfigError::InvalidTriggerRatio(self.compression.trigger_ratio));
        }
        if !(0.0..=1.0).contains(&self.sizing.low_memory_free_ratio) {
            return Err(ConfigError::InvalidRatio {
                field: "low_memory_free_ratio",
                value: self.sizing.low_memory_free_ratio,
            });
        }
        if !(0.0..=1.0).contains(&self.sizing.critical_memory_free_ratio) {
            return Err(ConfigError::InvalidRatio {
                field: "critical_memory_free_ratio",
                value: self.sizing.critical_memory_free_ratio,
            });
        }
        Ok(())
    }

    fn merge_with_defaults(self, _defaults: Self) -> Self {
        // Every field carries its own serde default, so a partially
        // specified YAML document already merges correctly on deserialize.
        self
    }

    fn description() -> &'static str {
        "Conversational context engine configuration (compression, snapshot, sizing)"
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
