//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};
use std::path::Path;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build the configuration: defaults, then .env, then environment, then CLI
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        self.load_env_file()?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn load_env_file(&self) -> Result<()> {
        match &self.cli.env_file {
            Some(path) => EnvManager::load_env_file_from(path, self.cli.debug),
            None => EnvManager::load_env_file_from(Path::new(".env"), self.cli.debug),
        }
    }

    fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(budget_ms) = self.cli.budget_ms {
            config.budget_ms = budget_ms;
        }
        if let Some(size) = self.cli.message_size {
            config.latency_message_size = size;
        }
        if let Some(size) = self.cli.buffer_size {
            config.throughput_buffer_size = size;
        }
        if let Some(samples) = self.cli.max_samples {
            config.max_latency_samples = samples;
        }
        if !self.cli.tests.is_empty() {
            config.tests.clear();
            for test in &self.cli.tests {
                if !config.tests.contains(test) {
                    config.tests.push(*test);
                }
            }
        }

        if self.cli.color {
            config.enable_color = true;
        }
        if self.cli.no_color || self.cli.json {
            config.enable_color = false;
        }

        // CLI-only flags
        config.json = self.cli.json;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let tests: Vec<&str> = config.tests.iter().map(|t| t.as_str()).collect();
    let buffer = if config.throughput_buffer_size == 0 {
        "transport default".to_string()
    } else {
        format!("{} bytes", config.throughput_buffer_size)
    };

    let summary = [
        format!("Budget: {}ms", config.budget_ms),
        format!("Message Size: {} bytes", config.latency_message_size),
        format!("Buffer Size: {}", buffer),
        format!("Max Samples: {}", config.max_latency_samples),
        format!("Sub-tests: {}", if tests.is_empty() { "none".to_string() } else { tests.join(", ") }),
        format!("Color Output: {}", config.enable_color),
        format!("JSON Output: {}", config.json),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;
    use crate::types::SubTest;
    use clap::Parser;
    use std::env;
    use tempfile::NamedTempFile;

    const VARS: [&str; 6] = [
        "LOOPBACK_BUDGET_MS",
        "LOOPBACK_MESSAGE_SIZE",
        "LOOPBACK_BUFFER_SIZE",
        "LOOPBACK_MAX_SAMPLES",
        "LOOPBACK_TESTS",
        "ENABLE_COLOR",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    /// Parse with an env file that does not exist, so ./.env never interferes
    fn parse_isolated(args: &[&str]) -> Result<Config> {
        let missing = std::env::temp_dir().join("lbench-parser-test-missing.env");
        let mut argv = vec!["lbench", "--env-file"];
        let missing = missing.to_string_lossy().to_string();
        argv.push(&missing);
        argv.extend_from_slice(args);
        ConfigParser::new(Cli::parse_from(argv)).parse()
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parse_isolated(&[
            "--budget-ms", "300",
            "--message-size", "32",
            "--test", "udp-latency",
            "--test", "udp-latency",
            "--no-color",
            "--verbose",
        ])
        .unwrap();

        assert_eq!(config.budget_ms, 300);
        assert_eq!(config.latency_message_size, 32);
        assert_eq!(config.tests, vec![SubTest::UdpLatency]);
        assert!(!config.enable_color);
        assert!(config.verbose);
        assert!(!config.json);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("LOOPBACK_BUDGET_MS", "900");
        env::set_var("LOOPBACK_MAX_SAMPLES", "50");

        let result = parse_isolated(&["--budget-ms", "1200"]);
        clear_env();
        let config = result.unwrap();

        assert_eq!(config.budget_ms, 1200);
        assert_eq!(config.max_latency_samples, 50);
    }

    #[test]
    fn test_env_file_is_loaded() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let env_file = NamedTempFile::new().unwrap();
        std::fs::write(env_file.path(), "LOOPBACK_TESTS=tcp-throughput\nLOOPBACK_BUFFER_SIZE=8192\n").unwrap();
        let path = env_file.path().to_string_lossy().to_string();

        let result = ConfigParser::new(Cli::parse_from(["lbench", "--env-file", path.as_str()])).parse();
        clear_env();
        let config = result.unwrap();

        assert_eq!(config.tests, vec![SubTest::TcpThroughput]);
        assert_eq!(config.throughput_buffer_size, 8192);
    }

    #[test]
    fn test_json_disables_color() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parse_isolated(&["--json"]).unwrap();
        assert!(config.json);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_invalid_env_value_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("ENABLE_COLOR", "sometimes");

        let result = parse_isolated(&[]);
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());
        assert!(summary.contains("Budget: 2000ms"));
        assert!(summary.contains("Buffer Size: transport default"));
        assert!(summary.contains("Sub-tests: tcp-latency, udp-latency, tcp-throughput, udp-throughput"));
    }
}
