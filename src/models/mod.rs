//! Data models for the loopback benchmark

pub mod config;
pub mod results;

// Re-export main model types
pub use config::Config;
pub use results::{
    LatencyResult, LoopbackBenchConfig, LoopbackBenchResult, ProbeReport, ThroughputResult,
};
