//! Environment variable handling and .env file management

use crate::config::parse_test_list;
use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; variables already set are kept
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Loopback Bench Configuration
#
# Values here are used as defaults and can be overridden by
# environment variables and command-line arguments.

# Total wall-clock budget in milliseconds, split evenly across sub-tests
# LOOPBACK_BUDGET_MS=2000

# Latency message size in bytes (TCP <= 65536, UDP <= 65000)
# LOOPBACK_MESSAGE_SIZE=64

# Throughput buffer/datagram size in bytes; 0 uses the transport default
# LOOPBACK_BUFFER_SIZE=0

# Maximum latency samples per probe (1-8192)
# LOOPBACK_MAX_SAMPLES=8192

# Sub-tests to run (comma-separated, or "all")
# LOOPBACK_TESTS=tcp-latency,udp-latency,tcp-throughput,udp-throughput

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example configurations:
#
# Quick latency-only check:
# LOOPBACK_TESTS=tcp-latency,udp-latency
# LOOPBACK_BUDGET_MS=500
#
# Jumbo UDP datagrams:
# LOOPBACK_TESTS=udp-throughput
# LOOPBACK_BUFFER_SIZE=60000
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "LOOPBACK_BUDGET_MS" => {
                let budget: u64 = value.parse().map_err(|e| {
                    AppError::config(format!("Invalid LOOPBACK_BUDGET_MS value '{}': {}", value, e))
                })?;
                if budget == 0 || budget > crate::defaults::MAX_TOTAL_BUDGET_MS {
                    return Err(AppError::config(format!(
                        "LOOPBACK_BUDGET_MS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_TOTAL_BUDGET_MS,
                        budget
                    )));
                }
            }
            "LOOPBACK_MESSAGE_SIZE" | "LOOPBACK_BUFFER_SIZE" | "LOOPBACK_MAX_SAMPLES" => {
                value
                    .parse::<usize>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "LOOPBACK_TESTS" => {
                parse_test_list(value)
                    .map_err(|e| AppError::config(format!("Invalid LOOPBACK_TESTS value '{}': {}", value, e)))?;
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>().map_err(|e| {
                    AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e))
                })?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("LOOPBACK_BUDGET_MS", "Total run budget in milliseconds", "2000"),
            ("LOOPBACK_MESSAGE_SIZE", "Latency message size in bytes", "64"),
            ("LOOPBACK_BUFFER_SIZE", "Throughput buffer size in bytes (0 = default)", "0"),
            ("LOOPBACK_MAX_SAMPLES", "Latency sample cap per probe", "8192"),
            ("LOOPBACK_TESTS", "Comma-separated sub-tests to run", "tcp-latency,udp-latency"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the contents of an env file without loading it; `None` if it does not exist
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_save_example_file() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("Loopback Bench Configuration"));
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("LOOPBACK_BUDGET_MS", "500").is_ok());
        assert!(EnvManager::validate_env_var("LOOPBACK_MESSAGE_SIZE", "0").is_ok());
        assert!(EnvManager::validate_env_var("LOOPBACK_TESTS", "tcp-latency, udp_throughput").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("UNRELATED", "anything").is_ok());

        assert!(EnvManager::validate_env_var("LOOPBACK_BUDGET_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("LOOPBACK_BUDGET_MS", "600001").is_err());
        assert!(EnvManager::validate_env_var("LOOPBACK_MAX_SAMPLES", "-1").is_err());
        assert!(EnvManager::validate_env_var("LOOPBACK_TESTS", "icmp").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();
        assert!(help.contains("LOOPBACK_BUDGET_MS"));
        assert!(help.contains("Configuration Priority"));
    }

    #[test]
    fn test_check_env_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "# comment\nLOOPBACK_BUDGET_MS=abc\nLOOPBACK_TESTS=udp-latency\n",
        )
        .unwrap();

        let warnings = EnvManager::check_env_file(temp_file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("LOOPBACK_BUDGET_MS"));

        let missing = temp_file.path().with_extension("missing");
        assert!(EnvManager::check_env_file(&missing).unwrap().is_none());
    }
}
