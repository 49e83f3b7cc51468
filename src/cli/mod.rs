//! Command-line interface

use crate::types::SubTest;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Loopback Bench - measure TCP/UDP latency and throughput over 127.0.0.1
#[derive(Parser, Debug, Clone)]
#[command(name = "lbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Total run budget in milliseconds, split evenly across sub-tests
    #[arg(short, long = "budget-ms", value_name = "MS", value_parser = parse_budget_ms)]
    pub budget_ms: Option<u64>,

    /// Latency message size in bytes
    #[arg(long, value_name = "BYTES")]
    pub message_size: Option<usize>,

    /// Throughput buffer/datagram size in bytes (0 = transport default)
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,

    /// Maximum latency samples per probe
    #[arg(long, value_name = "COUNT")]
    pub max_samples: Option<usize>,

    /// Sub-test to run (repeatable; default: all four)
    #[arg(short = 't', long = "test", value_enum, action = ArgAction::Append)]
    pub tests: Vec<SubTest>,

    /// Emit results as JSON
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Read settings from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Print an example .env file and exit
    #[arg(long)]
    pub env_example: bool,

    /// Describe supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.json && (self.env_example || self.env_help) {
            return Err("--json cannot be combined with --env-example or --env-help".to_string());
        }

        Ok(())
    }

    /// True when the invocation only prints reference text
    pub fn is_info_request(&self) -> bool {
        self.env_example || self.env_help
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color || self.json {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Configuration Summary:\n");
        match self.budget_ms {
            Some(ms) => summary.push_str(&format!("  Budget: {}ms\n", ms)),
            None => summary.push_str("  Budget: default\n"),
        }
        if let Some(size) = self.message_size {
            summary.push_str(&format!("  Message size: {} bytes\n", size));
        }
        if let Some(size) = self.buffer_size {
            summary.push_str(&format!("  Buffer size: {} bytes\n", size));
        }
        if let Some(samples) = self.max_samples {
            summary.push_str(&format!("  Max samples: {}\n", samples));
        }
        if !self.tests.is_empty() {
            let names: Vec<&str> = self.tests.iter().map(|t| t.as_str()).collect();
            summary.push_str(&format!("  Sub-tests: {}\n", names.join(", ")));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  JSON output: {}\n", self.json));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

/// Parse a budget in milliseconds within the accepted range
fn parse_budget_ms(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid budget: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid budget: {}", s))
        .and_then(|ms| {
            if ms == 0 {
                Err("Budget must be greater than 0".to_string())
            } else if ms > crate::defaults::MAX_TOTAL_BUDGET_MS {
                Err(format!(
                    "Budget cannot exceed {} ms",
                    crate::defaults::MAX_TOTAL_BUDGET_MS
                ))
            } else {
                Ok(ms)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["lbench"]);
        assert!(cli.budget_ms.is_none());
        assert!(cli.tests.is_empty());
        assert!(!cli.json);
        assert!(!cli.verbose);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "lbench",
            "--budget-ms", "800",
            "--message-size", "128",
            "--buffer-size", "4096",
            "--max-samples", "100",
            "--test", "tcp-latency",
            "-t", "udp-throughput",
            "--json",
            "--no-color",
            "--verbose",
            "--debug",
            "--env-file", "custom.env",
        ]);

        assert_eq!(cli.budget_ms, Some(800));
        assert_eq!(cli.message_size, Some(128));
        assert_eq!(cli.buffer_size, Some(4096));
        assert_eq!(cli.max_samples, Some(100));
        assert_eq!(cli.tests, vec![SubTest::TcpLatency, SubTest::UdpThroughput]);
        assert!(cli.json);
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(cli.debug);
        assert_eq!(cli.env_file, Some(PathBuf::from("custom.env")));
    }

    #[test]
    fn test_unknown_sub_test_rejected() {
        assert!(Cli::try_parse_from(["lbench", "--test", "icmp-latency"]).is_err());
    }

    #[test]
    fn test_budget_parsing() {
        assert_eq!(parse_budget_ms("1").unwrap(), 1);
        assert_eq!(parse_budget_ms("600000").unwrap(), 600_000);

        assert!(parse_budget_ms("0").is_err());
        assert!(parse_budget_ms("600001").is_err());
        assert!(parse_budget_ms("+5").is_err());
        assert!(parse_budget_ms("0x10").is_err());
        assert!(parse_budget_ms("abc").is_err());
        assert!(parse_budget_ms("-5").is_err());
    }

    #[test]
    fn test_validate_conflicts() {
        let cli = Cli::parse_from(["lbench", "--color", "--no-color"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["lbench", "--json", "--env-help"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_use_colors() {
        assert!(!Cli::parse_from(["lbench", "--no-color"]).use_colors());
        assert!(!Cli::parse_from(["lbench", "--json"]).use_colors());
        assert!(Cli::parse_from(["lbench", "--color"]).use_colors());
    }

    #[test]
    fn test_config_summary() {
        let cli = Cli::parse_from(["lbench", "--budget-ms", "500", "--test", "udp-latency", "--verbose"]);
        let summary = cli.get_config_summary();
        assert!(summary.contains("Budget: 500ms"));
        assert!(summary.contains("Sub-tests: udp-latency"));
        assert!(summary.contains("Verbose mode: true"));
    }
}
