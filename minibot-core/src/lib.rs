//! Platform-agnostic control core for a UDP-driven minibot.
//!
//! This crate turns decoded datagrams into session transitions and actuator
//! commands without any platform-specific dependencies. It can be used both
//! in embedded `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! - [`session`]: Discovery, port assignment, timeout and emergency stop ([`SessionManager`])
//! - [`motor`]: Normalized commands to PWM duty values ([`MotorDriver`], [`MotorCalibration`])
//! - [`controller`]: Latest accepted sample and game status ([`ControllerState`])
//! - [`mapping`]: Controller sample to actuator commands ([`DriveMapping`])
//! - [`output`]: PWM capability trait ([`PwmOutput`])
//! - [`transport`]: Datagram socket and clock traits ([`DatagramTransport`], [`Clock`])
//! - [`config`]: Port mode and timings ([`SessionConfig`])
//!
//! # Session lifecycle
//!
//! ```text
//!              PORT:<id>:<port>
//! Discovering ------------------> Connected
//!      ^                              |
//!      +------- no command for -------+
//!               command_timeout_ms
//! ```
//!
//! `ESTOP` stops every actuator in any state; frames and status updates are
//! dropped until `ESTOP_OFF`.
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod controller;
pub mod mapping;
pub mod motor;
pub mod output;
pub mod session;
pub mod transport;

// Re-export main types at crate root
pub use config::{
    PortMode, SessionConfig, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_DISCOVERY_INTERVAL_MS,
};
pub use controller::ControllerState;
pub use mapping::{axis_to_normalized, DriveCommand, DriveMapping};
pub use motor::{
    CalibrationError, DriveError, MotorCalibration, MotorDriver, MOTOR_RANGE, SERVO_RANGE,
};
pub use output::{MotorChannel, OutputError, PwmChannel, PwmOutput};
pub use session::{SessionManager, SessionState};
pub use transport::{Clock, DatagramTransport, TransportError};
