//! One-directional bulk transfer probe

use super::{alloc_buffer, deadline_after, normalize_buffer_size, BackgroundTask, Probe, StopFlag};
use crate::defaults::{DRAIN_DELAY, SERVER_POLL_INTERVAL, WARMUP_DELAY};
use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use crate::models::{ProbeReport, ThroughputResult};
use crate::net::{PortAllocator, SocketFactory};
use crate::types::{SubTest, Transport};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Datagrams sent between explicit yields so the sink keeps up on a single-threaded runtime
const UDP_SENDS_PER_YIELD: u32 = 64;

/// Filler byte for the source buffer
const FILL_BYTE: u8 = 0xa5;

/// Source/sink throughput measurement over one transport
#[derive(Debug, Clone)]
pub struct ThroughputProbe {
    transport: Transport,
    buffer_size: usize,
    logger: ProbeLogger,
    factory: SocketFactory,
    ports: PortAllocator,
}

impl ThroughputProbe {
    /// Probe with the transport's default buffer size
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            buffer_size: normalize_buffer_size(transport, 0),
            logger: ProbeLogger::quiet(),
            factory: SocketFactory::new(),
            ports: PortAllocator::new(),
        }
    }

    /// Requested size, normalized for the transport
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = normalize_buffer_size(self.transport, buffer_size);
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Run the probe; setup failures yield an unsuccessful, zero-byte result
    pub async fn measure(&self, budget: Duration) -> ThroughputResult {
        let test = self.sub_test();
        self.logger.log_probe_start(test, budget, self.buffer_size).await;

        let outcome = match self.transport {
            Transport::Tcp => self.measure_tcp(budget).await,
            Transport::Udp => self.measure_udp(budget).await,
        };

        match outcome {
            Ok(result) => {
                self.logger.log_throughput_result(test, &result).await;
                result
            }
            Err(e) => {
                self.logger.log_setup_failure(test, &e).await;
                ThroughputResult::failed()
            }
        }
    }

    async fn measure_tcp(&self, budget: Duration) -> Result<ThroughputResult> {
        let sink_buf = alloc_buffer(self.buffer_size, 0)?;
        let send_buf = alloc_buffer(self.buffer_size, FILL_BYTE)?;

        let requested = self.ports.allocate();
        let listener = self.factory.create_tcp_server(requested)?;
        let sink_addr = self.bound_addr(listener.local_addr(), requested).await?;

        let stop = StopFlag::new();
        let sink = BackgroundTask::spawn(stop.clone(), tcp_sink(listener, sink_buf, stop));
        tokio::time::sleep(WARMUP_DELAY).await;

        let mut source = match self.factory.create_tcp_client(sink_addr).await {
            Ok(source) => source,
            Err(e) => {
                sink.stop_and_join().await;
                return Err(e);
            }
        };

        let started = Instant::now();
        let bytes_sent = self.send_tcp(&mut source, &send_buf, deadline_after(budget)).await;
        let elapsed = started.elapsed();

        tokio::time::sleep(DRAIN_DELAY).await;
        let bytes_transferred = sink.stop_and_join().await.unwrap_or(0);
        drop(source);

        Ok(ThroughputResult::from_transfer(bytes_transferred, bytes_sent, elapsed))
    }

    /// Write the buffer repeatedly until the deadline; partial writes resume mid-buffer
    async fn send_tcp(&self, source: &mut TcpStream, buf: &[u8], deadline: Instant) -> u64 {
        let mut sent: u64 = 0;
        let mut offset = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, source.write(&buf[offset..])).await {
                Ok(Ok(0)) => {
                    let error = AppError::transport("sink closed the connection");
                    self.logger.log_transport_failure(SubTest::TcpThroughput, &error).await;
                    break;
                }
                Ok(Ok(written)) => {
                    sent += written as u64;
                    offset = (offset + written) % buf.len();
                }
                Ok(Err(e)) => {
                    let error = AppError::transport(e.to_string());
                    self.logger.log_transport_failure(SubTest::TcpThroughput, &error).await;
                    break;
                }
                Err(_) => break,
            }
        }

        sent
    }

    async fn measure_udp(&self, budget: Duration) -> Result<ThroughputResult> {
        let sink_buf = alloc_buffer(self.buffer_size, 0)?;
        let send_buf = alloc_buffer(self.buffer_size, FILL_BYTE)?;

        let requested = self.ports.allocate();
        let server = self.factory.create_udp_server(requested, true)?;
        let sink_addr = self.bound_addr(server.local_addr(), requested).await?;

        let stop = StopFlag::new();
        let sink = BackgroundTask::spawn(stop.clone(), udp_sink(server, sink_buf, stop));
        tokio::time::sleep(WARMUP_DELAY).await;

        let source = match self.factory.create_udp_client() {
            Ok(source) => source,
            Err(e) => {
                sink.stop_and_join().await;
                return Err(e);
            }
        };

        let started = Instant::now();
        let bytes_sent = send_udp(&source, sink_addr, &send_buf, deadline_after(budget)).await;
        let elapsed = started.elapsed();

        tokio::time::sleep(DRAIN_DELAY).await;
        let bytes_transferred = sink.stop_and_join().await.unwrap_or(0);
        drop(source);

        Ok(ThroughputResult::from_transfer(bytes_transferred, bytes_sent, elapsed))
    }

    async fn bound_addr(&self, local: std::io::Result<SocketAddr>, requested: u16) -> Result<SocketAddr> {
        let addr = local.map_err(|e| AppError::socket(format!("Failed to read bound address: {}", e)))?;
        if addr.port() != requested {
            self.logger.log_port_fallback(self.sub_test(), requested, addr.port()).await;
        }
        Ok(addr)
    }
}

#[async_trait]
impl Probe for ThroughputProbe {
    fn sub_test(&self) -> SubTest {
        match self.transport {
            Transport::Tcp => SubTest::TcpThroughput,
            Transport::Udp => SubTest::UdpThroughput,
        }
    }

    async fn run(&self, budget: Duration) -> ProbeReport {
        ProbeReport::Throughput(self.measure(budget).await)
    }
}

/// Send datagrams until the deadline; send errors count as drops
async fn send_udp(source: &UdpSocket, sink_addr: SocketAddr, buf: &[u8], deadline: Instant) -> u64 {
    let mut sent: u64 = 0;
    let mut since_yield = 0u32;

    while Instant::now() < deadline {
        if let Ok(written) = source.send_to(buf, sink_addr).await {
            sent += written as u64;
        }

        since_yield += 1;
        if since_yield == UDP_SENDS_PER_YIELD {
            since_yield = 0;
            tokio::task::yield_now().await;
        }
    }

    sent
}

/// Accept one connection and count received bytes until stopped or closed
async fn tcp_sink(listener: TcpListener, mut buf: Vec<u8>, stop: StopFlag) -> u64 {
    let mut stream = loop {
        if stop.is_stopped() {
            return 0;
        }
        match tokio::time::timeout(SERVER_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, _))) => break stream,
            Ok(Err(_)) => return 0,
            Err(_) => continue,
        }
    };

    let mut total: u64 = 0;
    while !stop.is_stopped() {
        match tokio::time::timeout(SERVER_POLL_INTERVAL, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => break,
            Ok(Ok(len)) => total += len as u64,
            Err(_) => continue,
        }
    }
    total
}

/// Count received datagram bytes until stopped
async fn udp_sink(socket: UdpSocket, mut buf: Vec<u8>, stop: StopFlag) -> u64 {
    let mut total: u64 = 0;
    while !stop.is_stopped() {
        match tokio::time::timeout(SERVER_POLL_INTERVAL, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => total += len as u64,
            Ok(Err(_)) | Err(_) => continue,
        }
    }
    total
}

/// TCP throughput with an optional write size
pub async fn measure_tcp_throughput(budget: Duration, buffer_size: Option<usize>) -> ThroughputResult {
    ThroughputProbe::new(Transport::Tcp)
        .with_buffer_size(buffer_size.unwrap_or(0))
        .measure(budget)
        .await
}

/// UDP throughput with an optional datagram size
pub async fn measure_udp_throughput(budget: Duration, buffer_size: Option<usize>) -> ThroughputResult {
    ThroughputProbe::new(Transport::Udp)
        .with_buffer_size(buffer_size.unwrap_or(0))
        .measure(budget)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DEFAULT_TCP_BUFFER_SIZE, DEFAULT_UDP_BUFFER_SIZE};

    #[test]
    fn test_probe_builder_normalizes() {
        let probe = ThroughputProbe::new(Transport::Tcp).with_buffer_size(0);
        assert_eq!(probe.buffer_size(), DEFAULT_TCP_BUFFER_SIZE);
        assert_eq!(probe.sub_test(), SubTest::TcpThroughput);

        let probe = ThroughputProbe::new(Transport::Udp).with_buffer_size(100_000);
        assert_eq!(probe.buffer_size(), DEFAULT_UDP_BUFFER_SIZE);
        assert_eq!(probe.sub_test(), SubTest::UdpThroughput);
    }

    #[tokio::test]
    async fn test_tcp_throughput_transfers_bytes() {
        let result = measure_tcp_throughput(Duration::from_millis(100), None).await;

        assert!(result.success);
        assert!(result.bytes_transferred > 0);
        assert!(result.bytes_transferred <= result.bytes_sent);
        assert!(result.duration_sec > 0.0);
        assert!(result.duration_sec < 1.0);

        let expected_mbits = result.mib_per_sec * 8.0 * 1024.0 * 1024.0 / 1_000_000.0;
        assert!((result.mbits_per_sec - expected_mbits).abs() <= expected_mbits * 0.01);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_throughput_transfers_bytes() {
        let result = measure_udp_throughput(Duration::from_millis(100), Some(1400)).await;

        assert!(result.success);
        assert!(result.bytes_sent > 0);
        assert!(result.bytes_transferred > 0);
        assert!(result.delivery_ratio() <= 1.0);
    }

    #[tokio::test]
    async fn test_udp_throughput_single_threaded_runtime() {
        let result = measure_udp_throughput(Duration::from_millis(50), None).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_zero_budget_sends_nothing() {
        let result = measure_tcp_throughput(Duration::ZERO, Some(4096)).await;
        assert!(!result.success);
        assert_eq!(result.bytes_sent, 0);
        assert_eq!(result.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn test_short_budget_returns_promptly() {
        for transport in [Transport::Tcp, Transport::Udp] {
            let started = Instant::now();
            ThroughputProbe::new(transport).measure(Duration::from_millis(10)).await;
            assert!(started.elapsed() < Duration::from_millis(10) + Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn test_unbounded_deadline_keeps_sending() {
        let factory = SocketFactory::new();
        let sink = factory.create_udp_server(0, true).unwrap();
        let source = factory.create_udp_client().unwrap();
        let deadline = deadline_after(Duration::MAX);

        // Only the outer timeout can end the loop
        let sending = tokio::time::timeout(
            Duration::from_millis(30),
            send_udp(&source, sink.local_addr().unwrap(), &[1u8; 512], deadline),
        )
        .await;
        assert!(sending.is_err());
    }

    #[tokio::test]
    async fn test_tcp_sink_counts_until_close() {
        let factory = SocketFactory::new();
        let listener = factory.create_tcp_server(0).unwrap();
        let addr = listener.local_addr().unwrap();

        let stop = StopFlag::new();
        let sink = BackgroundTask::spawn(stop.clone(), tcp_sink(listener, vec![0u8; 1024], stop));

        let mut source = factory.create_tcp_client(addr).await.unwrap();
        source.write_all(&[7u8; 3000]).await.unwrap();
        drop(source);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.stop_and_join().await, Some(3000));
    }
}
