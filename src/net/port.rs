//! Rotating loopback port allocation

use crate::defaults::{PORT_BASE, PORT_WINDOW_SIZE};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide allocation counter, advanced once per probe invocation
static PORT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hands out candidate ports from a fixed window above [`PORT_BASE`].
///
/// Consecutive calls return distinct ports until the window wraps. Wrapped
/// ports are safe to reuse because every probe closes its sockets before
/// returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortAllocator;

impl PortAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Next candidate port; never fails
    pub fn allocate(&self) -> u16 {
        let counter = PORT_COUNTER.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        port_for_counter(counter)
    }
}

/// Convenience wrapper around [`PortAllocator::allocate`]
pub fn allocate_port() -> u16 {
    PortAllocator.allocate()
}

fn port_for_counter(counter: u64) -> u16 {
    PORT_BASE + (counter % u64::from(PORT_WINDOW_SIZE)) as u16
}
