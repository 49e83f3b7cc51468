//! Benchmark result and run-configuration value objects

use crate::models::Config;
use crate::stats::{self, SampleSummary};
use crate::types::SubTest;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round-trip latency summary for one transport, in microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    /// Same value as p50
    pub median_us: f64,
    pub p90_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub stddev_us: f64,
    pub sample_count: u64,
    /// UDP rounds without a matching echo; always zero for TCP
    pub lost_rounds: u64,
    pub success: bool,
}

impl LatencyResult {
    /// Unsuccessful, zero-sample result
    pub fn failed() -> Self {
        Self::default()
    }

    /// Reduce raw samples (sorted in place) into a result
    pub fn from_samples(samples: &mut [f64], lost_rounds: u64) -> Self {
        Self::from_summary(&stats::reduce(samples), lost_rounds)
    }

    pub fn from_summary(summary: &SampleSummary, lost_rounds: u64) -> Self {
        Self {
            min_us: summary.min,
            max_us: summary.max,
            mean_us: summary.mean,
            median_us: summary.p50,
            p90_us: summary.p90,
            p95_us: summary.p95,
            p99_us: summary.p99,
            p999_us: summary.p999,
            stddev_us: summary.stddev,
            sample_count: summary.count as u64,
            lost_rounds,
            success: summary.is_success(),
        }
    }

    /// Tail spread between the median and p99
    pub fn jitter_us(&self) -> f64 {
        if self.success {
            self.p99_us - self.median_us
        } else {
            0.0
        }
    }

    /// Percentage of attempted rounds that produced no sample
    pub fn loss_percentage(&self) -> f64 {
        let attempted = self.sample_count + self.lost_rounds;
        if attempted == 0 {
            0.0
        } else {
            self.lost_rounds as f64 / attempted as f64 * 100.0
        }
    }
}

/// One-directional transfer rate for one transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputResult {
    pub mib_per_sec: f64,
    pub mbits_per_sec: f64,
    /// Bytes counted by the sink
    pub bytes_transferred: u64,
    /// Bytes the source handed to the kernel
    pub bytes_sent: u64,
    pub duration_sec: f64,
    pub success: bool,
}

impl ThroughputResult {
    /// Unsuccessful, zero-byte result
    pub fn failed() -> Self {
        Self::default()
    }

    /// Derive rates from the sink's byte count and the send-loop duration
    pub fn from_transfer(bytes_transferred: u64, bytes_sent: u64, duration: Duration) -> Self {
        let duration_sec = duration.as_secs_f64();
        let success = duration_sec > 0.0 && bytes_transferred > 0;

        let (mib_per_sec, mbits_per_sec) = if duration_sec > 0.0 {
            let bytes = bytes_transferred as f64;
            (
                bytes / (1024.0 * 1024.0) / duration_sec,
                bytes * 8.0 / 1_000_000.0 / duration_sec,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            mib_per_sec,
            mbits_per_sec,
            bytes_transferred,
            bytes_sent,
            duration_sec,
            success,
        }
    }

    /// Fraction of sent bytes that reached the sink
    pub fn delivery_ratio(&self) -> f64 {
        if self.bytes_sent == 0 {
            0.0
        } else {
            self.bytes_transferred as f64 / self.bytes_sent as f64
        }
    }
}

/// Outcome of a single sub-test, as produced by a probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeReport {
    Latency(LatencyResult),
    Throughput(ThroughputResult),
}

impl ProbeReport {
    pub fn success(&self) -> bool {
        match self {
            ProbeReport::Latency(result) => result.success,
            ProbeReport::Throughput(result) => result.success,
        }
    }
}

/// Aggregate of the four sub-test results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopbackBenchResult {
    pub tcp_latency: LatencyResult,
    pub udp_latency: LatencyResult,
    pub tcp_throughput: ThroughputResult,
    pub udp_throughput: ThroughputResult,
}

impl LoopbackBenchResult {
    pub fn any_success(&self) -> bool {
        SubTest::ALL.iter().any(|t| self.success_of(*t))
    }

    pub fn all_success(&self) -> bool {
        SubTest::ALL.iter().all(|t| self.success_of(*t))
    }

    /// True when every listed sub-test succeeded; false for an empty list
    pub fn all_success_of(&self, tests: &[SubTest]) -> bool {
        !tests.is_empty() && tests.iter().all(|t| self.success_of(*t))
    }

    pub fn successful_count(&self) -> usize {
        SubTest::ALL.iter().filter(|t| self.success_of(**t)).count()
    }

    pub fn success_of(&self, test: SubTest) -> bool {
        match test {
            SubTest::TcpLatency => self.tcp_latency.success,
            SubTest::UdpLatency => self.udp_latency.success,
            SubTest::TcpThroughput => self.tcp_throughput.success,
            SubTest::UdpThroughput => self.udp_throughput.success,
        }
    }

    /// Copy of one sub-test's result
    pub fn get(&self, test: SubTest) -> ProbeReport {
        match test {
            SubTest::TcpLatency => ProbeReport::Latency(self.tcp_latency.clone()),
            SubTest::UdpLatency => ProbeReport::Latency(self.udp_latency.clone()),
            SubTest::TcpThroughput => ProbeReport::Throughput(self.tcp_throughput.clone()),
            SubTest::UdpThroughput => ProbeReport::Throughput(self.udp_throughput.clone()),
        }
    }

    /// Store a probe's outcome in the slot for `test`; a mismatched report kind is ignored
    pub fn set(&mut self, test: SubTest, report: ProbeReport) {
        match (test, report) {
            (SubTest::TcpLatency, ProbeReport::Latency(result)) => self.tcp_latency = result,
            (SubTest::UdpLatency, ProbeReport::Latency(result)) => self.udp_latency = result,
            (SubTest::TcpThroughput, ProbeReport::Throughput(result)) => self.tcp_throughput = result,
            (SubTest::UdpThroughput, ProbeReport::Throughput(result)) => self.udp_throughput = result,
            _ => {}
        }
    }
}

/// Run configuration for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackBenchConfig {
    /// Wall-clock budget shared evenly by the enabled sub-tests
    pub total_budget: Duration,
    pub latency_message_size: usize,
    /// Zero selects the per-transport default
    pub throughput_buffer_size: usize,
    pub max_latency_samples: usize,
    pub enable_tcp_latency: bool,
    pub enable_udp_latency: bool,
    pub enable_tcp_throughput: bool,
    pub enable_udp_throughput: bool,
}

impl Default for LoopbackBenchConfig {
    fn default() -> Self {
        Self::with_budget(crate::defaults::DEFAULT_TOTAL_BUDGET)
    }
}

impl LoopbackBenchConfig {
    /// All four sub-tests enabled with default sizes
    pub fn with_budget(total_budget: Duration) -> Self {
        Self {
            total_budget,
            latency_message_size: crate::defaults::DEFAULT_LATENCY_MESSAGE_SIZE,
            throughput_buffer_size: 0,
            max_latency_samples: crate::defaults::MAX_LATENCY_SAMPLES,
            enable_tcp_latency: true,
            enable_udp_latency: true,
            enable_tcp_throughput: true,
            enable_udp_throughput: true,
        }
    }

    /// Only the listed sub-tests enabled
    pub fn with_only(total_budget: Duration, tests: &[SubTest]) -> Self {
        let mut config = Self::with_budget(total_budget);
        for test in SubTest::ALL {
            config.set_enabled(test, tests.contains(&test));
        }
        config
    }

    pub fn is_enabled(&self, test: SubTest) -> bool {
        match test {
            SubTest::TcpLatency => self.enable_tcp_latency,
            SubTest::UdpLatency => self.enable_udp_latency,
            SubTest::TcpThroughput => self.enable_tcp_throughput,
            SubTest::UdpThroughput => self.enable_udp_throughput,
        }
    }

    pub fn set_enabled(&mut self, test: SubTest, enabled: bool) {
        match test {
            SubTest::TcpLatency => self.enable_tcp_latency = enabled,
            SubTest::UdpLatency => self.enable_udp_latency = enabled,
            SubTest::TcpThroughput => self.enable_tcp_throughput = enabled,
            SubTest::UdpThroughput => self.enable_udp_throughput = enabled,
        }
    }

    /// Enabled sub-tests in execution order
    pub fn enabled_tests(&self) -> Vec<SubTest> {
        SubTest::ALL
            .iter()
            .copied()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    /// Budget slice per enabled sub-test; the remainder of the division is dropped
    pub fn per_test_budget(&self) -> Option<Duration> {
        match self.enabled_tests().len() as u32 {
            0 => None,
            count => Some(self.total_budget / count),
        }
    }
}

impl From<&Config> for LoopbackBenchConfig {
    fn from(config: &Config) -> Self {
        Self {
            total_budget: config.budget(),
            latency_message_size: config.latency_message_size,
            throughput_buffer_size: config.throughput_buffer_size,
            max_latency_samples: config.max_latency_samples,
            enable_tcp_latency: config.tests.contains(&SubTest::TcpLatency),
            enable_udp_latency: config.tests.contains(&SubTest::UdpLatency),
            enable_tcp_throughput: config.tests.contains(&SubTest::TcpThroughput),
            enable_udp_throughput: config.tests.contains(&SubTest::UdpThroughput),
        }
    }
}
