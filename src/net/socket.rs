//! Loopback socket construction
//!
//! Servers bind to `127.0.0.1` with address reuse enabled. When the
//! allocated port is already taken the bind is retried once on an
//! OS-assigned port, so callers must always read the bound address back
//! from the returned socket instead of assuming the requested port.

use crate::defaults::CLIENT_CONNECT_TIMEOUT;
use crate::error::{AppError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};

/// Only address any probe socket ever binds or connects to
pub const LOOPBACK: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Listen backlog for TCP servers; each probe accepts a single connection
const TCP_BACKLOG: u32 = 16;

/// Receive buffer requested for UDP sinks so bursts are not dropped by the kernel
const UDP_SINK_RECV_BUFFER: usize = 4 * 1024 * 1024;

/// Builds configured TCP/UDP sockets on the loopback interface
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketFactory;

impl SocketFactory {
    pub fn new() -> Self {
        Self
    }

    /// Bind and listen on `127.0.0.1:port`
    pub fn create_tcp_server(&self, port: u16) -> Result<TcpListener> {
        match bind_tcp_listener(port) {
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && port != 0 => {
                bind_tcp_listener(0).map_err(|e| {
                    AppError::socket(format!("Failed to bind TCP server on ephemeral port: {}", e))
                })
            }
            other => other.map_err(|e| {
                AppError::socket(format!("Failed to bind TCP server on {}:{}: {}", LOOPBACK, port, e))
            }),
        }
    }

    /// Bind a UDP server on `127.0.0.1:port`; sinks also get an enlarged receive buffer
    pub fn create_udp_server(&self, port: u16, sink: bool) -> Result<UdpSocket> {
        let socket = match bind_udp(port, sink) {
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && port != 0 => {
                bind_udp(0, sink).map_err(|e| {
                    AppError::socket(format!("Failed to bind UDP server on ephemeral port: {}", e))
                })?
            }
            other => other.map_err(|e| {
                AppError::socket(format!("Failed to bind UDP server on {}:{}: {}", LOOPBACK, port, e))
            })?,
        };

        UdpSocket::from_std(socket)
            .map_err(|e| AppError::socket(format!("Failed to register UDP server: {}", e)))
    }

    /// Connect to a loopback TCP server, bounded by [`CLIENT_CONNECT_TIMEOUT`]
    pub async fn create_tcp_client(&self, server: SocketAddr) -> Result<TcpStream> {
        match tokio::time::timeout(CLIENT_CONNECT_TIMEOUT, TcpStream::connect(server)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(AppError::socket(format!(
                "Failed to connect to TCP server {}: {}",
                server, e
            ))),
            Err(_) => Err(AppError::socket(format!(
                "Connecting to TCP server {} timed out after {:?}",
                server, CLIENT_CONNECT_TIMEOUT
            ))),
        }
    }

    /// UDP client on an ephemeral loopback port; addressing happens per send
    pub fn create_udp_client(&self) -> Result<UdpSocket> {
        let socket = bind_udp(0, false)
            .map_err(|e| AppError::socket(format!("Failed to bind UDP client: {}", e)))?;
        UdpSocket::from_std(socket)
            .map_err(|e| AppError::socket(format!("Failed to register UDP client: {}", e)))
    }

    /// Disable Nagle so small round trips are not coalesced
    pub fn apply_latency_tuning(&self, stream: &TcpStream) -> Result<()> {
        stream
            .set_nodelay(true)
            .map_err(|e| AppError::socket(format!("Failed to set TCP_NODELAY: {}", e)))
    }
}

/// Await a receive-side operation for at most `limit`.
///
/// Tokio sockets have no `SO_RCVTIMEO`; the bound is applied to the
/// future instead. Expiry maps to [`AppError::Timeout`], I/O failure to
/// [`AppError::Transport`].
pub async fn with_receive_timeout<F, T>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AppError::transport(e.to_string())),
        Err(_) => Err(AppError::timeout(format!("No data within {:?}", limit))),
    }
}

fn bind_tcp_listener(port: u16) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::V4(SocketAddrV4::new(LOOPBACK, port)))?;
    socket.listen(TCP_BACKLOG)
}

fn bind_udp(port: u16, sink: bool) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if sink {
        // Best effort; the kernel may clamp or refuse the request
        let _ = socket.set_recv_buffer_size(UDP_SINK_RECV_BUFFER);
    }
    let addr = SocketAddrV4::new(LOOPBACK, port);
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_server_and_client_on_loopback() {
        let factory = SocketFactory::new();
        let listener = factory.create_tcp_server(0).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_eq!(addr.ip(), std::net::IpAddr::V4(LOOPBACK));

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf).await.unwrap();
        });

        let mut client = factory.create_tcp_client(addr).await.unwrap();
        factory.apply_latency_tuning(&client).unwrap();
        assert!(client.nodelay().unwrap());

        client.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_server_falls_back_when_port_taken() {
        let factory = SocketFactory::new();
        let first = factory.create_tcp_server(0).unwrap();
        let taken = first.local_addr().unwrap().port();

        let second = factory.create_tcp_server(taken).unwrap();
        let bound = second.local_addr().unwrap().port();
        assert_ne!(bound, taken);
        assert_ne!(bound, 0);
    }

    #[tokio::test]
    async fn test_udp_server_and_client_exchange() {
        let factory = SocketFactory::new();
        let server = factory.create_udp_server(0, false).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = factory.create_udp_client().unwrap();

        client.send_to(b"hello", server_addr).await.unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = with_receive_timeout(Duration::from_secs(1), server.recv_from(&mut buf))
            .await
            .unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_connect_without_server_fails() {
        let factory = SocketFactory::new();
        // Bind then drop to find a port with nothing listening
        let port = {
            let listener = factory.create_tcp_server(0).unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = factory
            .create_tcp_client(SocketAddr::V4(SocketAddrV4::new(LOOPBACK, port)))
            .await;
        assert!(matches!(result, Err(AppError::Socket(_))));
    }

    #[tokio::test]
    async fn test_receive_timeout_expires() {
        let factory = SocketFactory::new();
        let server = factory.create_udp_server(0, false).unwrap();
        let mut buf = [0u8; 8];

        let started = std::time::Instant::now();
        let result = with_receive_timeout(Duration::from_millis(20), server.recv_from(&mut buf)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
