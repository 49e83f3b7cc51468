//! Configuration data model and validation

use crate::types::{AppError, Result, SubTest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Total wall-clock budget for the whole run, in milliseconds
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,

    /// Payload size of one latency round
    #[serde(default = "default_latency_message_size")]
    pub latency_message_size: usize,

    /// Throughput write/datagram size; zero selects the per-transport default
    #[serde(default)]
    pub throughput_buffer_size: usize,

    /// Cap on latency samples collected per probe
    #[serde(default = "default_max_latency_samples")]
    pub max_latency_samples: usize,

    /// Sub-tests to run
    #[serde(default = "default_tests")]
    pub tests: Vec<SubTest>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Emit the result as JSON instead of tables
    #[serde(default)]
    pub json: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
            latency_message_size: default_latency_message_size(),
            throughput_buffer_size: 0,
            max_latency_samples: default_max_latency_samples(),
            tests: default_tests(),
            enable_color: default_enable_color(),
            json: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total budget as Duration
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    /// Validate the configuration and return any errors
    ///
    /// Sizes and sample caps are never rejected here; the probes normalize
    /// out-of-range values to their defaults.
    pub fn validate(&self) -> Result<()> {
        if self.budget_ms == 0 {
            return Err(AppError::config("Budget must be greater than 0 ms"));
        }

        if self.budget_ms > crate::defaults::MAX_TOTAL_BUDGET_MS {
            return Err(AppError::config(format!(
                "Budget cannot exceed {} ms",
                crate::defaults::MAX_TOTAL_BUDGET_MS
            )));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(budget) = std::env::var("LOOPBACK_BUDGET_MS") {
            self.budget_ms = budget.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid LOOPBACK_BUDGET_MS value '{}': {}", budget, e))
            })?;
        }

        if let Ok(size) = std::env::var("LOOPBACK_MESSAGE_SIZE") {
            self.latency_message_size = size.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid LOOPBACK_MESSAGE_SIZE value '{}': {}", size, e))
            })?;
        }

        if let Ok(size) = std::env::var("LOOPBACK_BUFFER_SIZE") {
            self.throughput_buffer_size = size.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid LOOPBACK_BUFFER_SIZE value '{}': {}", size, e))
            })?;
        }

        if let Ok(samples) = std::env::var("LOOPBACK_MAX_SAMPLES") {
            self.max_latency_samples = samples.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid LOOPBACK_MAX_SAMPLES value '{}': {}", samples, e))
            })?;
        }

        if let Ok(tests) = std::env::var("LOOPBACK_TESTS") {
            self.tests = parse_test_list(&tests).map_err(|e| {
                AppError::config(format!("Invalid LOOPBACK_TESTS value '{}': {}", tests, e))
            })?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e))
            })?;
        }

        Ok(())
    }
}

/// Parse a comma-separated sub-test list, dropping duplicates and keeping first-seen order.
/// `all` selects every sub-test.
pub fn parse_test_list(value: &str) -> Result<Vec<SubTest>> {
    let mut tests = Vec::new();

    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.eq_ignore_ascii_case("all") {
            return Ok(SubTest::ALL.to_vec());
        }
        let test: SubTest = item.parse()?;
        if !tests.contains(&test) {
            tests.push(test);
        }
    }

    Ok(tests)
}

// Default value functions for serde
fn default_budget_ms() -> u64 {
    crate::defaults::DEFAULT_TOTAL_BUDGET.as_millis() as u64
}

fn default_latency_message_size() -> usize {
    crate::defaults::DEFAULT_LATENCY_MESSAGE_SIZE
}

fn default_max_latency_samples() -> usize {
    crate::defaults::MAX_LATENCY_SAMPLES
}

fn default_tests() -> Vec<SubTest> {
    SubTest::ALL.to_vec()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget(), Duration::from_secs(2));
        assert_eq!(config.tests.len(), 4);
    }

    #[test]
    fn test_zero_budget_invalid() {
        let mut config = Config::default();
        config.budget_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budget_ceiling() {
        let mut config = Config::default();
        config.budget_ms = crate::defaults::MAX_TOTAL_BUDGET_MS;
        assert!(config.validate().is_ok());

        config.budget_ms += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_sizes_are_accepted() {
        let mut config = Config::default();
        config.latency_message_size = 0;
        config.throughput_buffer_size = 10 * 1024 * 1024;
        config.max_latency_samples = 0;
        config.tests.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_test_list() {
        let tests = parse_test_list("udp-latency, tcp_latency,udp-latency").unwrap();
        assert_eq!(tests, vec![SubTest::UdpLatency, SubTest::TcpLatency]);

        assert_eq!(parse_test_list("all").unwrap(), SubTest::ALL.to_vec());
        assert!(parse_test_list("").unwrap().is_empty());
        assert!(parse_test_list("tcp-latency,sctp").is_err());
    }

    #[test]
    fn test_merge_from_env() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        std::env::set_var("LOOPBACK_BUDGET_MS", "750");
        std::env::set_var("LOOPBACK_TESTS", "tcp-throughput");
        std::env::set_var("LOOPBACK_MESSAGE_SIZE", " 256 ");

        let mut config = Config::default();
        let result = config.merge_from_env();

        std::env::remove_var("LOOPBACK_BUDGET_MS");
        std::env::remove_var("LOOPBACK_TESTS");
        std::env::remove_var("LOOPBACK_MESSAGE_SIZE");

        assert!(result.is_ok());
        assert_eq!(config.budget_ms, 750);
        assert_eq!(config.latency_message_size, 256);
        assert_eq!(config.tests, vec![SubTest::TcpThroughput]);
    }

    #[test]
    fn test_merge_from_env_invalid_value() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        std::env::set_var("LOOPBACK_MAX_SAMPLES", "lots");
        let mut config = Config::default();
        let result = config.merge_from_env();
        std::env::remove_var("LOOPBACK_MAX_SAMPLES");

        assert!(result.is_err());
    }
}
