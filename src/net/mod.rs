//! Loopback socket setup: port allocation and socket construction

pub mod port;
pub mod socket;

pub use port::{allocate_port, PortAllocator};
pub use socket::{with_receive_timeout, SocketFactory, LOOPBACK};
