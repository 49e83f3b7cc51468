//! Configuration validation utilities and rules

use crate::{
    error::Result,
    models::{Config, LoopbackBenchConfig},
    probe::{normalize_buffer_size, normalize_max_samples, normalize_message_size},
    types::{SubTest, Transport},
};
use colored::Colorize;
use std::time::Duration;

/// Per-test slices below this rarely collect meaningful data
pub const MIN_USEFUL_SLICE: Duration = Duration::from_millis(20);

/// Budgets above this are reported as long runs
const LONG_RUN_BUDGET_MS: u64 = 60_000;

/// Configuration validator that reports settings the engine will adjust
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation plus advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_test_selection(config));
        warnings.extend(Self::validate_sizes(config));
        warnings.extend(Self::validate_budget(config));

        Ok(warnings)
    }

    fn validate_test_selection(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.tests.is_empty() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "No sub-tests enabled; every result will be reported as unsuccessful".to_string(),
            ));
        }

        warnings
    }

    fn validate_sizes(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for test in &config.tests {
            let transport = test.transport();
            if test.is_latency() {
                let size = config.latency_message_size;
                let effective = normalize_message_size(transport, size);
                if effective != size {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!(
                            "Message size {} is out of range for {}; using {} bytes",
                            size, test, effective
                        ),
                    ));
                } else if transport == Transport::Udp && size < 4 {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!(
                            "Message size {} is too small to tag UDP rounds; late echoes may be counted",
                            size
                        ),
                    ));
                }
            } else {
                let size = config.throughput_buffer_size;
                let effective = normalize_buffer_size(transport, size);
                // Zero is the documented way to ask for the default
                if size != 0 && effective != size {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!(
                            "Buffer size {} is out of range for {}; using {} bytes",
                            size, test, effective
                        ),
                    ));
                }
            }
        }

        let latency_enabled = config.tests.iter().any(SubTest::is_latency);
        let samples = normalize_max_samples(config.max_latency_samples);
        if latency_enabled && samples != config.max_latency_samples {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Sample cap {} is out of range; using {}",
                    config.max_latency_samples, samples
                ),
            ));
        }

        warnings
    }

    fn validate_budget(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(slice) = LoopbackBenchConfig::from(config).per_test_budget() {
            if slice < MIN_USEFUL_SLICE {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Each sub-test gets only {:.1}ms; results may be empty or noisy (recommended: >= {}ms)",
                        slice.as_secs_f64() * 1000.0,
                        MIN_USEFUL_SLICE.as_millis()
                    ),
                ));
            }
        }

        if config.budget_ms > LONG_RUN_BUDGET_MS {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Budget of {}ms makes for a long run", config.budget_ms),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
