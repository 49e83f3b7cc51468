//! Round-trip latency probe
//!
//! The background task echoes every message back verbatim. TCP rounds
//! that fail end the loop since the stream is presumed broken; UDP rounds
//! that time out or come back short are counted as lost and the loop
//! carries on.

use super::{alloc_buffer, deadline_after, normalize_max_samples, normalize_message_size, BackgroundTask, Probe, StopFlag};
use crate::defaults::{SERVER_POLL_INTERVAL, TCP_ROUND_TIMEOUT, UDP_ROUND_TIMEOUT, WARMUP_DELAY};
use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use crate::models::{LatencyResult, ProbeReport};
use crate::net::{with_receive_timeout, PortAllocator, SocketFactory};
use crate::types::{SubTest, Transport};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Bytes at the start of a UDP message that carry the round number
const ROUND_TAG_LEN: usize = 4;

/// Ping-pong latency measurement over one transport
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    transport: Transport,
    message_size: usize,
    max_samples: usize,
    logger: ProbeLogger,
    factory: SocketFactory,
    ports: PortAllocator,
}

impl LatencyProbe {
    /// Probe with default message size and sample cap
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            message_size: normalize_message_size(transport, 0),
            max_samples: normalize_max_samples(0),
            logger: ProbeLogger::quiet(),
            factory: SocketFactory::new(),
            ports: PortAllocator::new(),
        }
    }

    /// Requested size, normalized for the transport
    pub fn with_message_size(mut self, message_size: usize) -> Self {
        self.message_size = normalize_message_size(self.transport, message_size);
        self
    }

    /// Requested cap, normalized to the sample ceiling
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = normalize_max_samples(max_samples);
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Run the probe; setup failures yield an unsuccessful, zero-sample result
    pub async fn measure(&self, budget: Duration) -> LatencyResult {
        let test = self.sub_test();
        self.logger.log_probe_start(test, budget, self.message_size).await;

        let outcome = match self.transport {
            Transport::Tcp => self.measure_tcp(budget).await,
            Transport::Udp => self.measure_udp(budget).await,
        };

        match outcome {
            Ok(result) => {
                self.logger.log_latency_result(test, &result).await;
                result
            }
            Err(e) => {
                self.logger.log_setup_failure(test, &e).await;
                LatencyResult::failed()
            }
        }
    }

    async fn measure_tcp(&self, budget: Duration) -> Result<LatencyResult> {
        let size = self.message_size;
        let mut samples: Vec<f64> = Vec::new();
        samples.try_reserve_exact(self.max_samples)?;
        let echo_buf = alloc_buffer(size, 0)?;
        let send_buf = alloc_buffer(size, 0x5a)?;
        let mut recv_buf = alloc_buffer(size, 0)?;

        let requested = self.ports.allocate();
        let listener = self.factory.create_tcp_server(requested)?;
        let server_addr = self.bound_addr(listener.local_addr(), requested).await?;

        let stop = StopFlag::new();
        let echo = BackgroundTask::spawn(stop.clone(), tcp_echo(listener, echo_buf, stop));
        tokio::time::sleep(WARMUP_DELAY).await;

        let mut client = match self.connect_tcp(server_addr).await {
            Ok(client) => client,
            Err(e) => {
                echo.stop_and_join().await;
                return Err(e);
            }
        };

        self.tcp_rounds(&mut client, &send_buf, &mut recv_buf, &mut samples, deadline_after(budget))
            .await;

        echo.stop_and_join().await;
        drop(client);

        Ok(LatencyResult::from_samples(&mut samples, 0))
    }

    async fn measure_udp(&self, budget: Duration) -> Result<LatencyResult> {
        let size = self.message_size;
        let mut samples: Vec<f64> = Vec::new();
        samples.try_reserve_exact(self.max_samples)?;
        let echo_buf = alloc_buffer(size, 0)?;
        let mut send_buf = alloc_buffer(size, 0x5a)?;
        let mut recv_buf = alloc_buffer(size, 0)?;

        let requested = self.ports.allocate();
        let server = self.factory.create_udp_server(requested, false)?;
        let server_addr = self.bound_addr(server.local_addr(), requested).await?;

        let stop = StopFlag::new();
        let echo = BackgroundTask::spawn(stop.clone(), udp_echo(server, echo_buf, stop));
        tokio::time::sleep(WARMUP_DELAY).await;

        let client = match self.factory.create_udp_client() {
            Ok(client) => client,
            Err(e) => {
                echo.stop_and_join().await;
                return Err(e);
            }
        };

        let lost_rounds = self
            .udp_rounds(&client, server_addr, &mut send_buf, &mut recv_buf, &mut samples, deadline_after(budget))
            .await;

        echo.stop_and_join().await;
        drop(client);

        Ok(LatencyResult::from_samples(&mut samples, lost_rounds))
    }

    /// Ping-pong on a connected stream until the cap or the deadline.
    /// A failed round ends the loop; samples gathered so far are kept.
    async fn tcp_rounds(
        &self,
        client: &mut TcpStream,
        send_buf: &[u8],
        recv_buf: &mut [u8],
        samples: &mut Vec<f64>,
        deadline: Instant,
    ) {
        while samples.len() < self.max_samples && Instant::now() < deadline {
            let started = Instant::now();
            let round = tokio::time::timeout(TCP_ROUND_TIMEOUT, async {
                client.write_all(send_buf).await?;
                client.read_exact(&mut *recv_buf).await?;
                Ok::<_, std::io::Error>(())
            })
            .await;

            match round {
                Ok(Ok(())) => samples.push(started.elapsed().as_secs_f64() * 1_000_000.0),
                Ok(Err(e)) => {
                    let error = AppError::transport(e.to_string());
                    self.logger.log_transport_failure(SubTest::TcpLatency, &error).await;
                    break;
                }
                Err(_) => {
                    let error = AppError::timeout(format!("No echo within {:?}", TCP_ROUND_TIMEOUT));
                    self.logger.log_transport_failure(SubTest::TcpLatency, &error).await;
                    break;
                }
            }
        }
    }

    /// Ping-pong datagrams with `server_addr` until the cap or the deadline,
    /// returning how many rounds were lost
    async fn udp_rounds(
        &self,
        client: &UdpSocket,
        server_addr: SocketAddr,
        send_buf: &mut [u8],
        recv_buf: &mut [u8],
        samples: &mut Vec<f64>,
        deadline: Instant,
    ) -> u64 {
        let tagged = send_buf.len() >= ROUND_TAG_LEN;
        let mut round: u64 = 0;
        let mut lost_rounds: u64 = 0;

        while samples.len() < self.max_samples && Instant::now() < deadline {
            round += 1;
            let tag = round as u32;
            if tagged {
                send_buf[..ROUND_TAG_LEN].copy_from_slice(&tag.to_be_bytes());
            }

            let started = Instant::now();
            match udp_round(client, server_addr, send_buf, recv_buf, tagged.then_some(tag)).await {
                Ok(()) => samples.push(started.elapsed().as_secs_f64() * 1_000_000.0),
                Err(e) => {
                    lost_rounds += 1;
                    self.logger.log_transport_loss(SubTest::UdpLatency, round, &e).await;
                }
            }
        }

        lost_rounds
    }

    async fn connect_tcp(&self, server_addr: SocketAddr) -> Result<TcpStream> {
        let client = self.factory.create_tcp_client(server_addr).await?;
        self.factory.apply_latency_tuning(&client)?;
        Ok(client)
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
impl Probe for LatencyProbe {
    fn sub_test(&self) -> SubTest {
        match self.transport {
            Transport::Tcp => SubTest::TcpLatency,
            Transport::Udp => SubTest::UdpLatency,
        }
    }

    async fn run(&self, budget: Duration) -> ProbeReport {
        ProbeReport::Latency(self.measure(budget).await)
    }
}

/// One UDP ping-pong. Datagrams from other peers or carrying an earlier
/// round's tag are skipped until the round timeout expires.
async fn udp_round(
    client: &UdpSocket,
    server_addr: SocketAddr,
    message: &[u8],
    reply: &mut [u8],
    tag: Option<u32>,
) -> Result<()> {
    let round_deadline = Instant::now() + UDP_ROUND_TIMEOUT;

    let sent = client
        .send_to(message, server_addr)
        .await
        .map_err(|e| AppError::transport(format!("send failed: {}", e)))?;
    if sent != message.len() {
        return Err(AppError::transport(format!("short send: {} of {} bytes", sent, message.len())));
    }

    loop {
        let remaining = round_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AppError::timeout(format!("No echo within {:?}", UDP_ROUND_TIMEOUT)));
        }

        let (len, from) = with_receive_timeout(remaining, client.recv_from(reply)).await?;
        if from != server_addr {
            continue;
        }
        if let Some(expected) = tag {
            if len < ROUND_TAG_LEN || reply[..ROUND_TAG_LEN] != expected.to_be_bytes() {
                continue;
            }
        }
        if len != message.len() {
            return Err(AppError::transport(format!("short echo: {} of {} bytes", len, message.len())));
        }
        return Ok(());
    }
}

/// Accept one connection and echo it until stopped or the peer closes
async fn tcp_echo(listener: TcpListener, mut buf: Vec<u8>, stop: StopFlag) {
    let mut stream = loop {
        if stop.is_stopped() {
            return;
        }
        match tokio::time::timeout(SERVER_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, _))) => break stream,
            Ok(Err(_)) => return,
            Err(_) => continue,
        }
    };
    let _ = stream.set_nodelay(true);

    while !stop.is_stopped() {
        let len = match tokio::time::timeout(SERVER_POLL_INTERVAL, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => return,
            Ok(Ok(len)) => len,
            Err(_) => continue,
        };
        match tokio::time::timeout(SERVER_POLL_INTERVAL, stream.write_all(&buf[..len])).await {
            Ok(Ok(())) => {}
            _ => return,
        }
    }
}

/// Echo every datagram back to its sender until stopped
async fn udp_echo(socket: UdpSocket, mut buf: Vec<u8>, stop: StopFlag) {
    while !stop.is_stopped() {
        match tokio::time::timeout(SERVER_POLL_INTERVAL, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, peer))) => {
                let _ = socket.send_to(&buf[..len], peer).await;
            }
            // ICMP errors from earlier sends surface here; keep serving
            Ok(Err(_)) | Err(_) => continue,
        }
    }
}

/// TCP round-trip latency with optional size and sample cap
pub async fn measure_tcp_latency(
    budget: Duration,
    message_size: Option<usize>,
    max_samples: Option<usize>,
) -> LatencyResult {
    LatencyProbe::new(Transport::Tcp)
        .with_message_size(message_size.unwrap_or(0))
        .with_max_samples(max_samples.unwrap_or(0))
        .measure(budget)
        .await
}

/// UDP round-trip latency with optional size and sample cap
pub async fn measure_udp_latency(
    budget: Duration,
    message_size: Option<usize>,
    max_samples: Option<usize>,
) -> LatencyResult {
    LatencyProbe::new(Transport::Udp)
        .with_message_size(message_size.unwrap_or(0))
        .with_max_samples(max_samples.unwrap_or(0))
        .measure(budget)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DEFAULT_LATENCY_MESSAGE_SIZE, MAX_LATENCY_SAMPLES};

    #[test]
    fn test_probe_builder_normalizes() {
        let probe = LatencyProbe::new(Transport::Udp)
            .with_message_size(70_000)
            .with_max_samples(0);
        assert_eq!(probe.message_size(), DEFAULT_LATENCY_MESSAGE_SIZE);
        assert_eq!(probe.max_samples(), MAX_LATENCY_SAMPLES);
        assert_eq!(probe.sub_test(), SubTest::UdpLatency);

        let probe = LatencyProbe::new(Transport::Tcp).with_message_size(1024).with_max_samples(10);
        assert_eq!(probe.message_size(), 1024);
        assert_eq!(probe.max_samples(), 10);
        assert_eq!(probe.sub_test(), SubTest::TcpLatency);
    }

    #[tokio::test]
    async fn test_tcp_latency_collects_samples() {
        let result = measure_tcp_latency(Duration::from_millis(100), None, None).await;

        assert!(result.success);
        assert!(result.sample_count > 0);
        assert!(result.sample_count <= MAX_LATENCY_SAMPLES as u64);
        assert_eq!(result.lost_rounds, 0);
        assert!(result.min_us <= result.median_us);
        assert!(result.median_us <= result.max_us);
    }

    #[tokio::test]
    async fn test_udp_latency_collects_samples() {
        let result = measure_udp_latency(Duration::from_millis(100), Some(256), None).await;

        assert!(result.success);
        assert!(result.sample_count > 0);
        assert!(result.p99_us <= result.max_us);
    }

    #[tokio::test]
    async fn test_sample_cap_stops_loop() {
        let started = Instant::now();
        let result = measure_tcp_latency(Duration::from_secs(5), Some(16), Some(25)).await;

        assert!(result.success);
        assert_eq!(result.sample_count, 25);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_tiny_udp_messages_skip_tagging() {
        let result = measure_udp_latency(Duration::from_millis(50), Some(1), Some(50)).await;
        assert!(result.success);
        assert!(result.sample_count <= 50);
    }

    #[tokio::test]
    async fn test_short_budget_returns_promptly() {
        for transport in [Transport::Tcp, Transport::Udp] {
            let started = Instant::now();
            let result = LatencyProbe::new(transport).measure(Duration::from_millis(10)).await;
            assert!(started.elapsed() < Duration::from_millis(10) + Duration::from_millis(500));
            assert_eq!(result.success, result.sample_count > 0);
        }
    }

    #[tokio::test]
    async fn test_zero_budget_yields_no_samples() {
        let result = measure_udp_latency(Duration::ZERO, None, None).await;
        assert!(!result.success);
        assert_eq!(result.sample_count, 0);
        assert_eq!(result, LatencyResult::failed());
    }

    #[tokio::test]
    async fn test_udp_round_skips_stale_tags() {
        let factory = SocketFactory::new();
        let server = factory.create_udp_server(0, false).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = factory.create_udp_client().unwrap();
        let client_addr = client.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let (len, _) = server.recv_from(&mut buf).await.unwrap();
            // Stale echo from an earlier round first, then the real one
            let mut stale = buf;
            stale[..4].copy_from_slice(&6u32.to_be_bytes());
            server.send_to(&stale[..len], client_addr).await.unwrap();
            server.send_to(&buf[..len], client_addr).await.unwrap();
        });

        let mut message = [0u8; 8];
        message[..4].copy_from_slice(&7u32.to_be_bytes());
        let mut reply = [0u8; 8];
        udp_round(&client, server_addr, &message, &mut reply, Some(7)).await.unwrap();
        assert_eq!(reply, message);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_udp_round_times_out_without_echo() {
        let factory = SocketFactory::new();
        // Bound but never read, so nothing comes back
        let silent = factory.create_udp_server(0, false).unwrap();
        let client = factory.create_udp_client().unwrap();

        let message = [1u8; 8];
        let mut reply = [0u8; 8];
        let result = udp_round(&client, silent.local_addr().unwrap(), &message, &mut reply, Some(1)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_huge_budget_stops_at_sample_cap() {
        let tcp = measure_tcp_latency(Duration::MAX, None, Some(5)).await;
        assert!(tcp.success);
        assert_eq!(tcp.sample_count, 5);

        let udp = measure_udp_latency(Duration::MAX, None, Some(3)).await;
        assert!(udp.success);
        assert_eq!(udp.sample_count, 3);
    }

    #[tokio::test]
    async fn test_tcp_rounds_keep_samples_after_peer_closes() {
        let probe = LatencyProbe::new(Transport::Tcp).with_message_size(32).with_max_samples(100);
        let listener = SocketFactory::new().create_tcp_server(0).unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo three rounds, then hang up
        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 32];
            for _ in 0..3 {
                stream.read_exact(&mut buf).await.unwrap();
                stream.write_all(&buf).await.unwrap();
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let send_buf = vec![0x5a; 32];
        let mut recv_buf = vec![0; 32];
        let mut samples = Vec::new();
        probe
            .tcp_rounds(&mut client, &send_buf, &mut recv_buf, &mut samples, deadline_after(Duration::from_secs(5)))
            .await;
        peer.await.unwrap();

        let result = LatencyResult::from_samples(&mut samples, 0);
        assert!(result.success);
        assert_eq!(result.sample_count, 3);
    }

    #[tokio::test]
    async fn test_udp_rounds_count_losses_and_continue() {
        let probe = LatencyProbe::new(Transport::Udp).with_message_size(16).with_max_samples(4);
        let factory = SocketFactory::new();
        let server = factory.create_udp_server(0, false).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = factory.create_udp_client().unwrap();

        // Echo odd datagrams, drop even ones
        let peer = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let mut received = 0u32;
            loop {
                let (len, from) = server.recv_from(&mut buf).await.unwrap();
                received += 1;
                if received % 2 == 1 {
                    server.send_to(&buf[..len], from).await.unwrap();
                }
            }
        });

        let mut send_buf = vec![0x5a; 16];
        let mut recv_buf = vec![0; 16];
        let mut samples = Vec::new();
        let lost_rounds = probe
            .udp_rounds(
                &client,
                server_addr,
                &mut send_buf,
                &mut recv_buf,
                &mut samples,
                deadline_after(Duration::from_secs(5)),
            )
            .await;
        peer.abort();

        let result = LatencyResult::from_samples(&mut samples, lost_rounds);
        assert!(result.success);
        assert_eq!(result.sample_count, 4);
        assert_eq!(result.lost_rounds, 3);
    }
}
