//! Loopback latency and throughput probes
//!
//! Every probe pairs one spawned background task (echo server or sink)
//! with a foreground measurement loop in the caller. The two sides share
//! only a [`StopFlag`]; the background task polls it between I/O
//! operations, all of which carry short timeouts, and the caller always
//! joins the task before returning a result.

pub mod latency;
pub mod throughput;

pub use latency::{measure_tcp_latency, measure_udp_latency, LatencyProbe};
pub use throughput::{measure_tcp_throughput, measure_udp_throughput, ThroughputProbe};

use crate::defaults::{
    DEFAULT_LATENCY_MESSAGE_SIZE, DEFAULT_TCP_BUFFER_SIZE, DEFAULT_UDP_BUFFER_SIZE,
    MAX_LATENCY_SAMPLES, MAX_TCP_BUFFER_SIZE, MAX_TCP_MESSAGE_SIZE, MAX_UDP_PAYLOAD,
};
use crate::error::Result;
use crate::models::ProbeReport;
use crate::types::{SubTest, Transport};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// A single measurement that always produces a report
#[async_trait]
pub trait Probe: Send + Sync {
    /// Sub-test this probe measures
    fn sub_test(&self) -> SubTest;

    /// Run for at most `budget` plus a small fixed overhead
    async fn run(&self, budget: Duration) -> ProbeReport;
}

/// One-shot stop signal written by the caller and polled by the background task
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owns a spawned background task and its stop flag.
///
/// Callers finish with [`BackgroundTask::stop_and_join`]. If the guard is
/// dropped instead (the probe future was cancelled), the flag is raised and
/// the task aborted so nothing outlives the probe.
pub(crate) struct BackgroundTask<T> {
    handle: Option<JoinHandle<T>>,
    stop: StopFlag,
}

impl<T: Send + 'static> BackgroundTask<T> {
    pub(crate) fn spawn<F>(stop: StopFlag, task: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(task)),
            stop,
        }
    }

    /// Raise the stop flag and wait for the task; `None` if it panicked or was aborted
    pub(crate) async fn stop_and_join(mut self) -> Option<T> {
        self.stop.stop();
        match self.handle.take() {
            Some(handle) => handle.await.ok(),
            None => None,
        }
    }
}

impl<T> Drop for BackgroundTask<T> {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Latency payload size for `transport`; zero or oversize falls back to the default
pub fn normalize_message_size(transport: Transport, requested: usize) -> usize {
    let ceiling = match transport {
        Transport::Tcp => MAX_TCP_MESSAGE_SIZE,
        Transport::Udp => MAX_UDP_PAYLOAD,
    };
    if requested == 0 || requested > ceiling {
        DEFAULT_LATENCY_MESSAGE_SIZE
    } else {
        requested
    }
}

/// Throughput write/datagram size for `transport`; zero or oversize falls back to the default
pub fn normalize_buffer_size(transport: Transport, requested: usize) -> usize {
    let (default, ceiling) = match transport {
        Transport::Tcp => (DEFAULT_TCP_BUFFER_SIZE, MAX_TCP_BUFFER_SIZE),
        Transport::Udp => (DEFAULT_UDP_BUFFER_SIZE, MAX_UDP_PAYLOAD),
    };
    if requested == 0 || requested > ceiling {
        default
    } else {
        requested
    }
}

/// Sample cap; zero or above the ceiling becomes the ceiling
pub fn normalize_max_samples(requested: usize) -> usize {
    if requested == 0 || requested > MAX_LATENCY_SAMPLES {
        MAX_LATENCY_SAMPLES
    } else {
        requested
    }
}

/// Heap buffer of `len` bytes set to `fill`, failing instead of aborting on exhaustion
pub(crate) fn alloc_buffer(len: usize, fill: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, fill);
    Ok(buffer)
}

/// About thirty years, the horizon a budget saturates to
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant `budget` from now; budgets past what `Instant` can represent saturate
/// to a far-off deadline so the sample cap or the caller ends the loop instead
pub(crate) fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
