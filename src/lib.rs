//! Loopback Bench
//!
//! Measures TCP and UDP round-trip latency and one-directional throughput
//! over the local loopback interface. Every probe runs a background
//! echo/sink task against a foreground measurement loop, stays inside a
//! caller-supplied time budget and always returns a populated result.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod net;
pub mod output;
pub mod probe;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{run_loopback_bench, run_loopback_bench_with_config, BenchmarkOrchestrator};
pub use models::{Config, LatencyResult, LoopbackBenchConfig, LoopbackBenchResult, ThroughputResult};
pub use probe::{
    measure_tcp_latency, measure_tcp_throughput, measure_udp_latency, measure_udp_throughput,
    LatencyProbe, ThroughputProbe,
};
pub use stats::{reduce, SampleSummary};
pub use types::{SubTest, Transport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build information set by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values and engine limits
pub mod defaults {
    use std::time::Duration;

    /// First port of the rotating probe window
    pub const PORT_BASE: u16 = 47_000;
    /// Number of distinct ports handed out before the window wraps
    pub const PORT_WINDOW_SIZE: u16 = 1_000;

    pub const DEFAULT_LATENCY_MESSAGE_SIZE: usize = 64;
    pub const MAX_TCP_MESSAGE_SIZE: usize = 65_536;
    /// Largest UDP payload used for either latency messages or throughput datagrams
    pub const MAX_UDP_PAYLOAD: usize = 65_000;

    pub const DEFAULT_TCP_BUFFER_SIZE: usize = 128 * 1024;
    pub const MAX_TCP_BUFFER_SIZE: usize = 1024 * 1024;
    pub const DEFAULT_UDP_BUFFER_SIZE: usize = 8 * 1024;

    /// Ceiling on latency samples per probe, also the default cap
    pub const MAX_LATENCY_SAMPLES: usize = 8_192;

    pub const WARMUP_DELAY: Duration = Duration::from_millis(5);
    pub const DRAIN_DELAY: Duration = Duration::from_millis(50);
    /// Accept/receive timeout the background tasks use to poll the stop flag
    pub const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const CLIENT_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);
    pub const TCP_ROUND_TIMEOUT: Duration = Duration::from_millis(200);
    pub const UDP_ROUND_TIMEOUT: Duration = Duration::from_millis(100);

    pub const DEFAULT_TOTAL_BUDGET: Duration = Duration::from_secs(2);
    pub const MAX_TOTAL_BUDGET_MS: u64 = 600_000;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
