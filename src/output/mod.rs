//! Output formatting and display system
//!
//! Renders a benchmark run as plain or colored tables, or as a single
//! JSON document for scripts.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{
    Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, RowStatus,
    TableFormat,
};

use crate::{
    error::{AppError, Result},
    executor::RunSummary,
    models::{LoopbackBenchConfig, LoopbackBenchResult},
    types::SubTest,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Machine-readable report of one run
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub budget_ms: u64,
    pub slice_ms: f64,
    pub duration_ms: f64,
    pub enabled: &'a [SubTest],
    pub successful_tests: usize,
    pub results: &'a LoopbackBenchResult,
}

impl<'a> JsonReport<'a> {
    pub fn new(config: &LoopbackBenchConfig, result: &'a LoopbackBenchResult, summary: &'a RunSummary) -> Self {
        Self {
            version: crate::VERSION,
            timestamp: Utc::now(),
            budget_ms: config.total_budget.as_millis() as u64,
            slice_ms: summary.slice.as_secs_f64() * 1000.0,
            duration_ms: summary.total_duration.as_secs_f64() * 1000.0,
            enabled: &summary.enabled,
            successful_tests: summary.successful_tests,
            results: result,
        }
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    /// Display complete run results as tables
    pub fn display_results(&self, result: &LoopbackBenchResult, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Loopback Benchmark Results")?);
        output.push_str("\n\n");

        output.push_str(&self.formatter.format_run_summary(summary)?);
        output.push_str("\n\n");

        if summary.enabled.iter().any(SubTest::is_latency) {
            output.push_str(&self.formatter.format_latency_table(result, &summary.enabled)?);
            output.push_str("\n\n");
        }

        if summary.enabled.iter().any(|t| !t.is_latency()) {
            output.push_str(&self.formatter.format_throughput_table(result, &summary.enabled)?);
            output.push_str("\n\n");
        }

        if summary.enabled.is_empty() {
            output.push_str(&self.formatter.format_warning("No sub-tests were enabled")?);
        } else if result.all_success_of(&summary.enabled) {
            output.push_str(&self.formatter.format_success("All enabled sub-tests succeeded")?);
        } else if result.any_success() {
            output.push_str(&self.formatter.format_warning(&format!(
                "{} of {} sub-tests failed",
                summary.failed_tests(),
                summary.enabled.len()
            ))?);
        } else {
            output.push_str(&self.formatter.format_error("Every enabled sub-test failed")?);
        }

        Ok(output)
    }

    /// Display a quick summary line
    pub fn display_quick_summary(&self, result: &LoopbackBenchResult, summary: &RunSummary) -> Result<String> {
        self.formatter.format_quick_summary(result, summary)
    }

    /// Serialize a run as pretty-printed JSON
    pub fn display_json(
        config: &LoopbackBenchConfig,
        result: &LoopbackBenchResult,
        summary: &RunSummary,
    ) -> Result<String> {
        serde_json::to_string_pretty(&JsonReport::new(config, result, summary))
            .map_err(|e| AppError::internal(format!("Failed to serialize results: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatencyResult, ThroughputResult};
    use std::time::Duration;

    fn run(enabled: Vec<SubTest>) -> (LoopbackBenchResult, RunSummary) {
        let mut samples = vec![10.0, 20.0, 30.0];
        let result = LoopbackBenchResult {
            tcp_latency: LatencyResult::from_samples(&mut samples, 0),
            udp_latency: LatencyResult::failed(),
            tcp_throughput: ThroughputResult::failed(),
            udp_throughput: ThroughputResult::failed(),
        };
        let successful_tests = enabled.iter().filter(|t| result.success_of(**t)).count();
        let summary = RunSummary {
            enabled,
            slice: Duration::from_millis(250),
            total_duration: Duration::from_millis(260),
            successful_tests,
        };
        (result, summary)
    }

    #[test]
    fn test_display_results_sections() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());

        let (result, summary) = run(vec![SubTest::TcpLatency]);
        let text = coordinator.display_results(&result, &summary).unwrap();
        assert!(text.contains("Loopback Benchmark Results"));
        assert!(text.contains("TCP latency"));
        assert!(!text.contains("TCP throughput"));
        assert!(text.contains("SUCCESS: All enabled sub-tests succeeded"));

        let (result, summary) = run(SubTest::ALL.to_vec());
        let text = coordinator.display_results(&result, &summary).unwrap();
        assert!(text.contains("UDP throughput"));
        assert!(text.contains("WARNING: 3 of 4 sub-tests failed"));
    }

    #[test]
    fn test_display_results_nothing_enabled() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        let (result, summary) = run(Vec::new());
        let text = coordinator.display_results(&result, &summary).unwrap();
        assert!(text.contains("No sub-tests were enabled"));
    }

    #[test]
    fn test_display_json() {
        let (result, summary) = run(vec![SubTest::TcpLatency, SubTest::UdpLatency]);
        let config = LoopbackBenchConfig::with_only(
            Duration::from_millis(500),
            &[SubTest::TcpLatency, SubTest::UdpLatency],
        );

        let json = OutputCoordinator::display_json(&config, &result, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["budget_ms"], 500);
        assert_eq!(value["enabled"][1], "udp-latency");
        assert_eq!(value["successful_tests"], 1);
        assert_eq!(value["results"]["tcp_latency"]["success"], true);
        assert_eq!(value["results"]["udp_throughput"]["bytes_transferred"], 0);
    }
}
