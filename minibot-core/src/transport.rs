//! Datagram transport and clock capabilities.

use core::net::{Ipv4Addr, SocketAddrV4};

/// Error type for transport operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Socket I/O error.
    Io,
    /// Could not bind the requested port.
    Bind,
    /// Datagram could not be sent (no route, broadcast refused).
    Send,
}

/// Non-blocking datagram socket bound to one local port at a time.
///
/// Network association happens before the transport is handed to the
/// session; the session only polls, broadcasts and rebinds.
pub trait DatagramTransport {
    /// Read at most one pending datagram into `buf`.
    ///
    /// Returns `Ok(None)` immediately when nothing is waiting. Datagrams
    /// longer than `buf` are truncated.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError>;

    /// Send one datagram to `dest` (typically a broadcast address).
    fn send_to(&mut self, payload: &[u8], dest: SocketAddrV4) -> Result<(), TransportError>;

    /// Move the socket to `port`. On failure the previous binding is kept.
    fn rebind(&mut self, port: u16) -> Result<(), TransportError>;

    /// Port the socket is currently bound to.
    fn local_port(&self) -> u16;

    /// Address advertised in discovery pings.
    fn local_ip(&self) -> Ipv4Addr;
}

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
