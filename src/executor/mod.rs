//! Benchmark orchestration
//!
//! Splits one wall-clock budget evenly across the enabled sub-tests and
//! runs them strictly one after another in the fixed order of
//! [`SubTest::ALL`]. A failing sub-test never stops the ones after it.

use crate::{
    logging::ProbeLogger,
    models::{LoopbackBenchConfig, LoopbackBenchResult},
    probe::{LatencyProbe, Probe, ThroughputProbe},
    types::SubTest,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Timing summary of one orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Sub-tests that ran, in execution order
    pub enabled: Vec<SubTest>,
    /// Budget handed to each sub-test
    pub slice: Duration,
    /// Wall-clock time the whole run took
    pub total_duration: Duration,
    pub successful_tests: usize,
}

impl RunSummary {
    pub fn failed_tests(&self) -> usize {
        self.enabled.len().saturating_sub(self.successful_tests)
    }

    /// Percentage of enabled sub-tests that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.enabled.is_empty() {
            0.0
        } else {
            self.successful_tests as f64 / self.enabled.len() as f64 * 100.0
        }
    }
}

/// Runs the enabled sub-tests under one total budget
pub struct BenchmarkOrchestrator {
    config: LoopbackBenchConfig,
    logger: ProbeLogger,
}

impl BenchmarkOrchestrator {
    pub fn new(config: LoopbackBenchConfig) -> Self {
        Self {
            config,
            logger: ProbeLogger::quiet(),
        }
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &LoopbackBenchConfig {
        &self.config
    }

    /// Probe for one sub-test, configured from the run configuration
    pub fn probe_for(&self, test: SubTest) -> Box<dyn Probe> {
        let transport = test.transport();
        if test.is_latency() {
            Box::new(
                LatencyProbe::new(transport)
                    .with_message_size(self.config.latency_message_size)
                    .with_max_samples(self.config.max_latency_samples)
                    .with_logger(self.logger.clone()),
            )
        } else {
            Box::new(
                ThroughputProbe::new(transport)
                    .with_buffer_size(self.config.throughput_buffer_size)
                    .with_logger(self.logger.clone()),
            )
        }
    }

    /// Run every enabled sub-test and aggregate the results
    pub async fn run(&self) -> LoopbackBenchResult {
        self.run_with_summary().await.0
    }

    /// Like [`run`](Self::run), also reporting how the budget was spent
    pub async fn run_with_summary(&self) -> (LoopbackBenchResult, RunSummary) {
        let started = Instant::now();
        let enabled = self.config.enabled_tests();
        let mut result = LoopbackBenchResult::default();

        let Some(slice) = self.config.per_test_budget() else {
            let summary = RunSummary {
                enabled,
                slice: Duration::ZERO,
                total_duration: started.elapsed(),
                successful_tests: 0,
            };
            return (result, summary);
        };

        self.logger
            .log_slice_plan(self.config.total_budget, &enabled, slice)
            .await;
        let operation = self.logger.logger().start_operation("loopback-bench").await;

        for test in &enabled {
            let report = self.probe_for(*test).run(slice).await;
            result.set(*test, report);
        }

        self.logger
            .logger()
            .end_operation(&operation, "loopback-bench", result.any_success())
            .await;

        let summary = RunSummary {
            successful_tests: result.successful_count(),
            enabled,
            slice,
            total_duration: started.elapsed(),
        };
        (result, summary)
    }
}

/// Run all four sub-tests, splitting `budget` evenly
pub async fn run_loopback_bench(budget: Duration) -> LoopbackBenchResult {
    BenchmarkOrchestrator::new(LoopbackBenchConfig::with_budget(budget))
        .run()
        .await
}

/// Run the sub-tests enabled in `config`
pub async fn run_loopback_bench_with_config(config: &LoopbackBenchConfig) -> LoopbackBenchResult {
    BenchmarkOrchestrator::new(config.clone()).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_enabled_tests_returns_immediately() {
        let config = LoopbackBenchConfig::with_only(Duration::from_secs(10), &[]);
        let started = Instant::now();
        let (result, summary) = BenchmarkOrchestrator::new(config).run_with_summary().await;

        assert!(!result.any_success());
        assert_eq!(result, LoopbackBenchResult::default());
        assert!(summary.enabled.is_empty());
        assert_eq!(summary.success_rate(), 0.0);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_failed_tests_never_underflows() {
        let summary = RunSummary {
            enabled: vec![SubTest::TcpLatency],
            slice: Duration::from_millis(100),
            total_duration: Duration::from_millis(120),
            successful_tests: 3,
        };
        assert_eq!(summary.failed_tests(), 0);

        let summary = RunSummary { successful_tests: 0, ..summary };
        assert_eq!(summary.failed_tests(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_budget_ends_at_sample_cap() {
        let mut config = LoopbackBenchConfig::with_only(Duration::MAX, &[SubTest::UdpLatency]);
        config.max_latency_samples = 3;
        let (result, summary) = BenchmarkOrchestrator::new(config).run_with_summary().await;

        assert!(result.udp_latency.success);
        assert_eq!(result.udp_latency.sample_count, 3);
        assert_eq!(summary.slice, Duration::MAX);
    }

    #[test]
    fn test_probe_for_matches_sub_test() {
        let orchestrator = BenchmarkOrchestrator::new(LoopbackBenchConfig::default());
        for test in SubTest::ALL {
            assert_eq!(orchestrator.probe_for(test).sub_test(), test);
        }
    }

    #[tokio::test]
    async fn test_selective_run_leaves_disabled_defaults() {
        let config = LoopbackBenchConfig::with_only(Duration::from_millis(100), &[SubTest::TcpLatency]);
        let (result, summary) = BenchmarkOrchestrator::new(config).run_with_summary().await;

        assert!(result.tcp_latency.success);
        assert!(!result.udp_latency.success);
        assert!(!result.tcp_throughput.success);
        assert!(!result.udp_throughput.success);
        assert_eq!(summary.slice, Duration::from_millis(100));
        assert_eq!(summary.successful_tests, 1);
        assert_eq!(summary.failed_tests(), 0);
    }

    #[tokio::test]
    async fn test_full_run_slices_budget() {
        let (result, summary) =
            BenchmarkOrchestrator::new(LoopbackBenchConfig::with_budget(Duration::from_millis(400)))
                .run_with_summary()
                .await;

        assert_eq!(summary.enabled, SubTest::ALL.to_vec());
        assert_eq!(summary.slice, Duration::from_millis(100));
        assert!(result.any_success());
        // Four slices plus per-probe warm-up, drain and teardown
        assert!(summary.total_duration < Duration::from_secs(3));
    }
}
