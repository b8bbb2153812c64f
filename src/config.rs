// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the buffered sender.
//!
//! # Example
//!
//! ```
//! use buffered_sender::SenderConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SenderConfig::default();
//! assert_eq!(config.initial_batch_action_count, 512);
//! assert_eq!(config.max_retries_per_action, 10);
//!
//! // Manual flushing only, small batches
//! let config = SenderConfig {
//!     auto_flush: false,
//!     initial_batch_action_count: 50,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::resilience::BackoffConfig;

/// Invalid configuration, reported at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("initial_batch_action_count must be at least 1, got {0}")]
    BatchActionCount(usize),
    #[error("max_retries_per_action must be at least 1")]
    MaxRetries,
    #[error("max_concurrent_batches must be between 1 and {max}, got {0}", max = Semaphore::MAX_PERMITS)]
    Concurrency(usize),
    #[error("auto_flush_interval_ms must be greater than 0 when auto_flush is enabled")]
    FlushInterval,
    #[error("key_field must not be empty")]
    KeyField,
}

/// Configuration for the sender.
///
/// All fields have sensible defaults and can be loaded from any serde format.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Flush automatically on batch size and on a timer (default: true)
    #[serde(default = "default_auto_flush")]
    pub auto_flush: bool,

    /// Timer interval for auto-flush in milliseconds (default: 60 s)
    #[serde(default = "default_auto_flush_interval_ms")]
    pub auto_flush_interval_ms: u64,

    /// Actions per request before any payload-too-large shrinking (default: 512)
    #[serde(default = "default_initial_batch_action_count")]
    pub initial_batch_action_count: usize,

    /// Sends allowed per action before it is declared terminal (default: 10)
    #[serde(default = "default_max_retries_per_action")]
    pub max_retries_per_action: u32,

    /// Batches that may be on the wire at once within one round (default: 1)
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Base delay after a throttled round (default: 800 ms)
    #[serde(default = "default_throttling_delay_ms")]
    pub throttling_delay_ms: u64,

    /// Cap on the throttling delay (default: 60 s)
    #[serde(default = "default_max_throttling_delay_ms")]
    pub max_throttling_delay_ms: u64,

    /// Document field holding the key (default: "id")
    #[serde(default = "default_key_field")]
    pub key_field: String,
}

fn default_auto_flush() -> bool { true }
fn default_auto_flush_interval_ms() -> u64 { 60_000 }
fn default_initial_batch_action_count() -> usize { 512 }
fn default_max_retries_per_action() -> u32 { 10 }
fn default_max_concurrent_batches() -> usize { 1 }
fn default_throttling_delay_ms() -> u64 { 800 }
fn default_max_throttling_delay_ms() -> u64 { 60_000 }
fn default_key_field() -> String { "id".to_string() }

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            auto_flush: default_auto_flush(),
            auto_flush_interval_ms: default_auto_flush_interval_ms(),
            initial_batch_action_count: default_initial_batch_action_count(),
            max_retries_per_action: default_max_retries_per_action(),
            max_concurrent_batches: default_max_concurrent_batches(),
            throttling_delay_ms: default_throttling_delay_ms(),
            max_throttling_delay_ms: default_max_throttling_delay_ms(),
            key_field: default_key_field(),
        }
    }
}

impl SenderConfig {
    /// Check the configuration. Called by the sender constructors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_batch_action_count < 1 {
            return Err(ConfigError::BatchActionCount(self.initial_batch_action_count));
        }
        if self.max_retries_per_action < 1 {
            return Err(ConfigError::MaxRetries);
        }
        if self.max_concurrent_batches < 1 || self.max_concurrent_batches > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Concurrency(self.max_concurrent_batches));
        }
        if self.auto_flush && self.auto_flush_interval_ms == 0 {
            return Err(ConfigError::FlushInterval);
        }
        if self.key_field.is_empty() {
            return Err(ConfigError::KeyField);
        }
        Ok(())
    }

    #[must_use]
    pub fn auto_flush_interval(&self) -> Duration {
        Duration::from_millis(self.auto_flush_interval_ms)
    }

    #[must_use]
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.throttling_delay_ms),
            max_delay: Duration::from_millis(self.max_throttling_delay_ms),
            factor: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SenderConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.auto_flush);
        assert_eq!(config.auto_flush_interval(), Duration::from_secs(60));
        assert_eq!(config.key_field, "id");
    }

    #[test]
    fn test_zero_batch_count_rejected() {
        let config = SenderConfig { initial_batch_action_count: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::BatchActionCount(0)));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = SenderConfig { max_retries_per_action: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::MaxRetries));
    }

    #[test]
    fn test_concurrency_bounds() {
        let config = SenderConfig { max_concurrent_batches: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::Concurrency(0)));

        let config = SenderConfig { max_concurrent_batches: usize::MAX, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::Concurrency(usize::MAX)));

        let config = SenderConfig { max_concurrent_batches: Semaphore::MAX_PERMITS, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_only_matters_with_auto_flush() {
        let config = SenderConfig { auto_flush_interval_ms: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::FlushInterval));

        let config = SenderConfig { auto_flush: false, auto_flush_interval_ms: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_key_field_rejected() {
        let config = SenderConfig { key_field: String::new(), ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::KeyField));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: SenderConfig = serde_json::from_str(
            r#"{"auto_flush": false, "initial_batch_action_count": 100, "key_field": "hotelId"}"#,
        ).unwrap();

        assert!(!config.auto_flush);
        assert_eq!(config.initial_batch_action_count, 100);
        assert_eq!(config.key_field, "hotelId");
        assert_eq!(config.max_retries_per_action, 10);
        assert_eq!(config.throttling_delay_ms, 800);
    }

    #[test]
    fn test_backoff_from_config() {
        let config = SenderConfig {
            throttling_delay_ms: 10,
            max_throttling_delay_ms: 25,
            ..Default::default()
        };
        let backoff = config.backoff();
        assert_eq!(backoff.delay_for(1), Duration::from_millis(10));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(25));
    }
}
