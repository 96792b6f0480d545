//! Configuration loading from evbench.toml
//!
//! Evbench configuration can be specified in an `evbench.toml` file. The file
//! is discovered by walking up from the current directory; every field has a
//! default, and command line flags override file values.

use evbench_core::{ConfigError, DriverConfig, MeasureUnit};
use evbench_pool::MAX_USER_AREA;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file
pub const CONFIG_FILE: &str = "evbench.toml";

/// Evbench configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvbenchConfig {
    /// Driver settings
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Test pool settings
    #[serde(default)]
    pub pool: PoolSection,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// "cycles" or "time"
    #[serde(default)]
    pub unit: MeasureUnit,
    /// Measured rounds per case
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Burst size for `*_multi` cases
    #[serde(default = "default_burst")]
    pub burst_size: u32,
    /// 1-based case to run indefinitely (0 = run all)
    #[serde(default)]
    pub index: usize,
    /// Pin the worker thread to this CPU
    #[serde(default)]
    pub cpu: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            unit: MeasureUnit::default(),
            rounds: default_rounds(),
            burst_size: default_burst(),
            index: 0,
            cpu: None,
        }
    }
}

fn default_rounds() -> u32 {
    1000
}
fn default_burst() -> u32 {
    8
}

/// Test pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSection {
    /// Event payload size in bytes
    #[serde(default = "default_event_size")]
    pub event_size: usize,
    /// Vector table size
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,
    /// User area bytes per event
    #[serde(default = "default_user_area")]
    pub user_area_size: usize,
    /// Pool cache hint (omitted = pool default)
    #[serde(default)]
    pub cache_size: Option<u32>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            event_size: default_event_size(),
            vector_size: default_vector_size(),
            user_area_size: default_user_area(),
            cache_size: None,
        }
    }
}

fn default_event_size() -> usize {
    1024
}
fn default_vector_size() -> usize {
    8
}
fn default_user_area() -> usize {
    8
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fixed-width text lines
    #[default]
    Human,
    /// One JSON document
    Json,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// "human" or "json"
    #[serde(default)]
    pub format: OutputFormat,
}

impl EvbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find `evbench.toml` in `start` or any of its ancestors
    pub fn find_from(start: impl Into<PathBuf>) -> Option<PathBuf> {
        let mut dir = start.into();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Discover and load configuration by walking up from the current
    /// directory. A file that exists but does not parse is an error.
    pub fn discover() -> anyhow::Result<Option<(PathBuf, Self)>> {
        let Some(path) = std::env::current_dir().ok().and_then(Self::find_from) else {
            return Ok(None);
        };
        let config = Self::load(&path)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", path.display(), e))?;
        Ok(Some((path, config)))
    }

    /// Check pool parameters and build the driver configuration.
    ///
    /// Burst size, rounds and index are checked by the driver against the
    /// registry.
    pub fn to_driver_config(&self) -> Result<DriverConfig, ConfigError> {
        if self.pool.event_size == 0 {
            return Err(ConfigError::InvalidValue {
                what: "event size",
                value: 0,
            });
        }
        if self.pool.vector_size == 0 {
            return Err(ConfigError::InvalidValue {
                what: "vector size",
                value: 0,
            });
        }
        if self.pool.user_area_size == 0 || self.pool.user_area_size > MAX_USER_AREA {
            return Err(ConfigError::InvalidValue {
                what: "user area size",
                value: self.pool.user_area_size as i64,
            });
        }

        Ok(DriverConfig {
            unit: self.runner.unit,
            rounds: self.runner.rounds,
            burst_size: self.runner.burst_size,
            single_case: (self.runner.index > 0).then_some(self.runner.index),
        })
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Evbench Configuration

[runner]
# Measurement unit: "cycles" or "time"
unit = "cycles"
# Measured rounds per case
rounds = 1000
# Burst size for *_multi cases (1..=64)
burst_size = 8
# Case to run indefinitely until Ctrl-C (0 = run all)
index = 0
# Pin the worker thread to a CPU (uncomment to enable)
# cpu = 1

[pool]
# Event payload size in bytes
event_size = 1024
# Vector table size
vector_size = 8
# User area bytes per event
user_area_size = 8
# Pool cache size (uncomment to override the pool default)
# cache_size = 64

[output]
# Report format: human or json
format = "human"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvbenchConfig::default();
        assert_eq!(config.runner.unit, MeasureUnit::Cycles);
        assert_eq!(config.runner.rounds, 1000);
        assert_eq!(config.runner.burst_size, 8);
        assert_eq!(config.pool.event_size, 1024);
        assert_eq!(config.pool.cache_size, None);
        assert_eq!(config.output.format, OutputFormat::Human);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            unit = "time"
            burst_size = 16

            [output]
            format = "json"
        "#;

        let config: EvbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.unit, MeasureUnit::Time);
        assert_eq!(config.runner.burst_size, 16);
        assert_eq!(config.output.format, OutputFormat::Json);
        // Defaults should still apply
        assert_eq!(config.runner.rounds, 1000);
        assert_eq!(config.pool.vector_size, 8);
    }

    #[test]
    fn test_default_toml_parses() {
        let config: EvbenchConfig = toml::from_str(&EvbenchConfig::default_toml()).unwrap();
        assert_eq!(config, EvbenchConfig::default());
    }

    #[test]
    fn test_driver_config() {
        let mut config = EvbenchConfig::default();
        config.runner.index = 3;
        let driver = config.to_driver_config().unwrap();
        assert_eq!(driver.single_case, Some(3));

        config.runner.index = 0;
        assert_eq!(config.to_driver_config().unwrap().single_case, None);

        config.pool.event_size = 0;
        assert!(matches!(
            config.to_driver_config(),
            Err(ConfigError::InvalidValue { what: "event size", .. })
        ));
    }

    #[test]
    fn test_find_from_walks_up() {
        let root = std::env::temp_dir().join(format!("evbench-config-{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "[runner]\nrounds = 5\n").unwrap();

        let found = EvbenchConfig::find_from(&nested).unwrap();
        assert_eq!(found, root.join(CONFIG_FILE));
        assert_eq!(EvbenchConfig::load(&found).unwrap().runner.rounds, 5);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
