//! Configuration management
//!
//! Handles loading and validating pool configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::pool::BufferPool;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Buffer pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Total byte budget of the pool
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// The one buffer size cached for reuse
    #[serde(default = "default_slot_size")]
    pub slot_size: usize,
    /// Default allocation timeout in microseconds
    #[serde(default = "default_allocate_timeout_us")]
    pub allocate_timeout_us: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            slot_size: default_slot_size(),
            allocate_timeout_us: default_allocate_timeout_us(),
        }
    }
}

impl PoolConfig {
    /// Default timeout to pass to `allocate` when the caller has no better
    /// deadline of its own.
    pub fn allocate_timeout(&self) -> Duration {
        Duration::from_micros(self.allocate_timeout_us)
    }

    /// Construct the pool after validating the configured sizes.
    pub fn build(&self) -> Result<BufferPool> {
        self.validate()?;
        Ok(BufferPool::new(self.capacity, self.slot_size))
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("pool.capacity must be > 0");
        }
        if self.slot_size == 0 {
            anyhow::bail!("pool.slot_size must be > 0");
        }
        if self.slot_size > self.capacity {
            anyhow::bail!(
                "pool.slot_size ({}) must not exceed pool.capacity ({})",
                self.slot_size,
                self.capacity
            );
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_capacity() -> usize {
    1024 * 1024
}
fn default_slot_size() -> usize {
    8192
}
fn default_allocate_timeout_us() -> u64 {
    500_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config file")?;

        config.pool.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool.capacity, 1024 * 1024);
        assert_eq!(config.pool.slot_size, 8192);
        assert_eq!(
            config.pool.allocate_timeout(),
            Duration::from_micros(500_000)
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [pool]
            capacity = 4096
            slot_size = 512
            allocate_timeout_us = 1000

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.capacity, 4096);
        assert_eq!(config.pool.slot_size, 512);
        assert_eq!(config.pool.allocate_timeout(), Duration::from_micros(1000));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pool]
            capacity = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.capacity, 2048);
        assert_eq!(config.pool.slot_size, 8192);
    }

    #[test]
    fn test_build_rejects_oversized_slot() {
        let config = PoolConfig {
            capacity: 1024,
            slot_size: 2048,
            allocate_timeout_us: 1000,
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_build_rejects_zero_capacity() {
        let config = PoolConfig {
            capacity: 0,
            slot_size: 128,
            allocate_timeout_us: 1000,
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_build_constructs_pool() {
        let config = PoolConfig {
            capacity: 1024,
            slot_size: 128,
            allocate_timeout_us: 1000,
        };
        let pool = config.build().unwrap();
        assert_eq!(pool.capacity(), 1024);
        assert_eq!(pool.slot_size(), 128);
    }
}
