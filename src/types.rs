//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Transport a probe runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four sub-tests of a loopback benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SubTest {
    TcpLatency,
    UdpLatency,
    TcpThroughput,
    UdpThroughput,
}

impl SubTest {
    /// Fixed execution order used by the orchestrator
    pub const ALL: [SubTest; 4] = [
        SubTest::TcpLatency,
        SubTest::UdpLatency,
        SubTest::TcpThroughput,
        SubTest::UdpThroughput,
    ];

    pub fn transport(&self) -> Transport {
        match self {
            SubTest::TcpLatency | SubTest::TcpThroughput => Transport::Tcp,
            SubTest::UdpLatency | SubTest::UdpThroughput => Transport::Udp,
        }
    }

    pub fn is_latency(&self) -> bool {
        matches!(self, SubTest::TcpLatency | SubTest::UdpLatency)
    }

    /// Identifier used on the command line and in environment variables
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTest::TcpLatency => "tcp-latency",
            SubTest::UdpLatency => "udp-latency",
            SubTest::TcpThroughput => "tcp-throughput",
            SubTest::UdpThroughput => "udp-throughput",
        }
    }

    /// Human-readable label for reports
    pub fn label(&self) -> &'static str {
        match self {
            SubTest::TcpLatency => "TCP latency",
            SubTest::UdpLatency => "UDP latency",
            SubTest::TcpThroughput => "TCP throughput",
            SubTest::UdpThroughput => "UDP throughput",
        }
    }
}

impl fmt::Display for SubTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubTest {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        SubTest::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| AppError::parse(format!("Unknown sub-test: {}", s)))
    }
}

/// Latency classification used for colouring loopback round trips
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyLevel {
    /// Under 50µs, typical for an idle loopback
    Excellent,
    /// 50-200µs
    Good,
    /// 200µs-1ms
    Fair,
    /// Above 1ms, a loaded or throttled host
    Poor,
}

impl LatencyLevel {
    pub fn from_micros(us: f64) -> Self {
        if us < 50.0 {
            Self::Excellent
        } else if us < 200.0 {
            Self::Good
        } else if us < 1000.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_test_order_and_transport() {
        assert_eq!(SubTest::ALL[0], SubTest::TcpLatency);
        assert_eq!(SubTest::ALL[3], SubTest::UdpThroughput);
        assert_eq!(SubTest::UdpLatency.transport(), Transport::Udp);
        assert_eq!(SubTest::TcpThroughput.transport(), Transport::Tcp);
        assert!(SubTest::TcpLatency.is_latency());
        assert!(!SubTest::UdpThroughput.is_latency());
    }

    #[test]
    fn test_sub_test_parsing() {
        assert_eq!("tcp-latency".parse::<SubTest>().unwrap(), SubTest::TcpLatency);
        assert_eq!("UDP_THROUGHPUT".parse::<SubTest>().unwrap(), SubTest::UdpThroughput);
        assert_eq!(" udp-latency ".parse::<SubTest>().unwrap(), SubTest::UdpLatency);
        assert!("icmp-latency".parse::<SubTest>().is_err());
    }

    #[test]
    fn test_latency_level() {
        assert_eq!(LatencyLevel::from_micros(12.0), LatencyLevel::Excellent);
        assert_eq!(LatencyLevel::from_micros(120.0), LatencyLevel::Good);
        assert_eq!(LatencyLevel::from_micros(500.0), LatencyLevel::Fair);
        assert_eq!(LatencyLevel::from_micros(2500.0), LatencyLevel::Poor);
    }
}
