//! Session configuration.

use core::net::Ipv4Addr;
use core::num::NonZeroU16;

use minibot_proto::{DEFAULT_COMMAND_PORT, DEFAULT_DISCOVERY_PORT};

/// Default period between discovery pings.
pub const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 2000;

/// Default command silence before the session drops back to discovery.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

const DEFAULT_FIXED_PORT: NonZeroU16 = match NonZeroU16::new(DEFAULT_COMMAND_PORT) {
    Some(port) => port,
    None => panic!("default command port is zero"),
};

/// How the robot obtains its command port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortMode {
    /// Broadcast discovery pings from `port` and wait for a `PORT:` assignment.
    Discovery { port: u16 },
    /// Listen on `port` for commands; no discovery.
    Fixed { port: NonZeroU16 },
}

impl PortMode {
    /// Port the transport should be bound to at startup.
    #[must_use]
    pub const fn initial_port(self) -> u16 {
        match self {
            PortMode::Discovery { port } => port,
            PortMode::Fixed { port } => port.get(),
        }
    }
}

impl Default for PortMode {
    fn default() -> Self {
        PortMode::Discovery {
            port: DEFAULT_DISCOVERY_PORT,
        }
    }
}

/// Timing and addressing for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub port_mode: PortMode,
    pub discovery_interval_ms: u64,
    pub command_timeout_ms: u64,
    /// Destination address of discovery pings.
    pub broadcast: Ipv4Addr,
}

impl SessionConfig {
    /// Fixed-port configuration with default timings.
    #[must_use]
    pub fn fixed(port: NonZeroU16) -> Self {
        Self {
            port_mode: PortMode::Fixed { port },
            ..Self::default()
        }
    }

    /// Fixed-port configuration on the default command port.
    #[must_use]
    pub fn fixed_default() -> Self {
        Self::fixed(DEFAULT_FIXED_PORT)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port_mode: PortMode::default(),
            discovery_interval_ms: DEFAULT_DISCOVERY_INTERVAL_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            broadcast: Ipv4Addr::BROADCAST,
        }
    }
}
