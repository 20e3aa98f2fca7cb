//! SessionManager: discovery, port assignment, timeout and emergency stop.
//!
//! The manager owns the transport, the motor driver and all session state.
//! Each [`tick`](SessionManager::tick) reads the clock once and then, in
//! order:
//!
//! 1. rebinds the transport if it is not on the port the state expects
//! 2. sends a discovery ping (Discovering) or checks the command timeout (Connected)
//! 3. reads at most one datagram and applies it
//!
//! Datagram handling while Discovering only looks at port assignments.
//! Otherwise `ESTOP`/`ESTOP_OFF` are always honored, and status updates and
//! controller frames are only honored while Connected and not stopped.
//!
//! A stop, an `ESTOP_OFF`, a new connection or leaving teleop invalidates the
//! current sample: [`has_fresh_command`](SessionManager::has_fresh_command)
//! stays false until the next controller frame is accepted.

use core::net::SocketAddrV4;
use core::num::NonZeroU16;

use log::{debug, info, warn};
use minibot_proto::{
    discovery_message, GameStatus, Message, PacketDecoder, RobotIdentity, MAX_DATAGRAM_LEN,
};

use crate::config::{PortMode, SessionConfig};
use crate::controller::ControllerState;
use crate::mapping::DriveCommand;
use crate::motor::{DriveError, MotorDriver, MOTOR_RANGE, SERVO_RANGE};
use crate::output::{MotorChannel, PwmOutput};
use crate::transport::{Clock, DatagramTransport};

/// Connection state of the control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Waiting for a port assignment, pinging periodically.
    Discovering,
    /// Bound to `port` and accepting commands.
    Connected { port: NonZeroU16 },
}

/// Control session of one robot.
pub struct SessionManager<T, P, C> {
    transport: T,
    motors: MotorDriver<P>,
    clock: C,
    decoder: PacketDecoder,
    config: SessionConfig,
    state: SessionState,
    controller: ControllerState,
    emergency_stop: bool,
    last_ping_ms: Option<u64>,
    last_command_ms: u64,
    // Fixed mode: motors already stopped for the current silence period.
    silence_handled: bool,
    // A frame was accepted since the last stop, release or reconnect.
    fresh_command: bool,
    // Set by `halt` during the current tick.
    stopped: bool,
}

impl<T, P, C> SessionManager<T, P, C>
where
    T: DatagramTransport,
    P: PwmOutput,
    C: Clock,
{
    /// Create a session and stop every actuator.
    ///
    /// The first discovery ping goes out on the first tick.
    pub fn new(
        identity: RobotIdentity,
        transport: T,
        motors: MotorDriver<P>,
        clock: C,
        config: SessionConfig,
    ) -> Self {
        let now = clock.now_ms();
        let state = match config.port_mode {
            PortMode::Discovery { .. } => SessionState::Discovering,
            PortMode::Fixed { port } => SessionState::Connected { port },
        };

        let mut session = Self {
            transport,
            motors,
            clock,
            decoder: PacketDecoder::new(identity),
            config,
            state,
            controller: ControllerState::new(),
            emergency_stop: false,
            last_ping_ms: None,
            last_command_ms: now,
            silence_handled: false,
            fresh_command: false,
            stopped: false,
        };
        session.motors.stop_all();
        info!(
            "session for '{}' starting in {:?}",
            session.decoder.identity(),
            session.config.port_mode
        );
        session
    }

    /// Run one iteration of the control loop.
    ///
    /// Returns `true` when this tick stopped every actuator (timeout or
    /// emergency stop).
    pub fn tick(&mut self) -> bool {
        self.stopped = false;
        let now = self.clock.now_ms();

        self.ensure_bound();

        match self.state {
            SessionState::Discovering => self.maybe_ping(now),
            SessionState::Connected { .. } => self.check_timeout(now),
        }

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let len = match self.transport.try_recv(&mut buf) {
            Ok(Some(len)) => len.min(MAX_DATAGRAM_LEN),
            Ok(None) => return self.stopped,
            Err(e) => {
                warn!("receive failed: {:?}", e);
                return self.stopped;
            }
        };

        let message = self.decoder.decode(&buf[..len], self.controller.game_status());
        self.apply(message, now);
        self.stopped
    }

    /// Write `command` to the actuators.
    ///
    /// Refused with [`DriveError::Inhibited`] unless the session is
    /// Connected, not emergency-stopped and in teleop. The whole command is
    /// range-checked before the first write.
    pub fn drive(&mut self, command: &DriveCommand) -> Result<(), DriveError> {
        if !self.can_drive() {
            return Err(DriveError::Inhibited);
        }

        let motors_in_range = [command.left, command.right, command.aux]
            .iter()
            .all(|value| MOTOR_RANGE.contains(value));
        if !motors_in_range || !SERVO_RANGE.contains(&command.servo_angle) {
            return Err(DriveError::OutOfRange);
        }

        self.motors.drive_motor(MotorChannel::Left, command.left)?;
        self.motors.drive_motor(MotorChannel::Right, command.right)?;
        self.motors.drive_motor(MotorChannel::Aux, command.aux)?;
        self.motors.drive_servo(command.servo_angle)?;
        Ok(())
    }

    /// Neutral command on every channel, regardless of session state.
    pub fn stop_all(&mut self) {
        self.motors.stop_all();
    }

    /// Whether [`drive`](Self::drive) would currently write to the actuators.
    #[must_use]
    pub fn can_drive(&self) -> bool {
        self.is_connected() && !self.emergency_stop && self.controller.is_teleop()
    }

    /// Whether a controller frame has been accepted since the session last
    /// stopped, was released from an emergency stop, connected or left
    /// teleop.
    #[inline]
    #[must_use]
    pub fn has_fresh_command(&self) -> bool {
        self.fresh_command
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// Command port, or 0 while Discovering.
    #[must_use]
    pub fn assigned_port(&self) -> u16 {
        match self.state {
            SessionState::Connected { port } => port.get(),
            SessionState::Discovering => 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop
    }

    #[inline]
    #[must_use]
    pub fn controller(&self) -> &ControllerState {
        &self.controller
    }

    #[inline]
    #[must_use]
    pub fn game_status(&self) -> GameStatus {
        self.controller.game_status()
    }

    /// Clock time of the last accepted command.
    #[inline]
    #[must_use]
    pub fn last_command_ms(&self) -> u64 {
        self.last_command_ms
    }

    #[inline]
    #[must_use]
    pub fn identity(&self) -> &RobotIdentity {
        self.decoder.identity()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get a reference to the motor driver.
    pub fn motors(&self) -> &MotorDriver<P> {
        &self.motors
    }

    /// Get a mutable reference to the motor driver.
    pub fn motors_mut(&mut self) -> &mut MotorDriver<P> {
        &mut self.motors
    }

    /// Decompose the session into its transport, motor driver and clock.
    pub fn into_parts(self) -> (T, MotorDriver<P>, C) {
        (self.transport, self.motors, self.clock)
    }

    /// Port the transport should currently be bound to.
    fn expected_port(&self) -> u16 {
        match self.state {
            SessionState::Connected { port } => port.get(),
            SessionState::Discovering => self.config.port_mode.initial_port(),
        }
    }

    fn ensure_bound(&mut self) {
        let port = self.expected_port();
        if self.transport.local_port() == port {
            return;
        }
        match self.transport.rebind(port) {
            Ok(()) => info!("listening on port {}", port),
            Err(e) => warn!("rebind to port {} failed: {:?}", port, e),
        }
    }

    fn maybe_ping(&mut self, now: u64) {
        let PortMode::Discovery { port } = self.config.port_mode else {
            return;
        };
        let due = match self.last_ping_ms {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.config.discovery_interval_ms,
        };
        if !due {
            return;
        }
        self.last_ping_ms = Some(now);

        let ping = discovery_message(self.decoder.identity(), self.transport.local_ip());
        let dest = SocketAddrV4::new(self.config.broadcast, port);
        match self.transport.send_to(ping.as_bytes(), dest) {
            Ok(()) => debug!("sent discovery ping: {}", ping),
            Err(e) => warn!("discovery ping failed: {:?}", e),
        }
    }

    fn check_timeout(&mut self, now: u64) {
        let silence = now.saturating_sub(self.last_command_ms);
        if silence <= self.config.command_timeout_ms {
            return;
        }

        match self.config.port_mode {
            PortMode::Discovery { port } => {
                info!(
                    "no command for {} ms, reverting to discovery on port {}",
                    silence, port
                );
                self.state = SessionState::Discovering;
                if let Err(e) = self.transport.rebind(port) {
                    warn!("rebind to discovery port {} failed: {:?}", port, e);
                }
                self.halt();
            }
            PortMode::Fixed { .. } => {
                if !self.silence_handled {
                    warn!("no command for {} ms, stopping motors", silence);
                    self.halt();
                    self.silence_handled = true;
                }
            }
        }
    }

    fn apply(&mut self, message: Message<'_>, now: u64) {
        if self.state == SessionState::Discovering {
            if let Message::PortAssignment { name, port } = message {
                self.accept_assignment(name, port, now);
                return;
            }
        }

        match message {
            Message::EmergencyStop => {
                if !self.emergency_stop {
                    warn!("emergency stop activated");
                }
                self.emergency_stop = true;
                self.halt();
                self.refresh(now);
                return;
            }
            Message::EmergencyStopRelease => {
                if self.emergency_stop {
                    info!("emergency stop released");
                }
                self.emergency_stop = false;
                self.fresh_command = false;
                self.refresh(now);
                return;
            }
            _ => {}
        }

        if !self.is_connected() || self.emergency_stop {
            return;
        }

        match message {
            Message::GameStatusUpdate(status) => {
                if status != self.controller.game_status() {
                    info!("game status: {}", status);
                }
                self.controller.set_game_status(status);
                if status != GameStatus::Teleop {
                    self.fresh_command = false;
                }
                self.refresh(now);
            }
            Message::ControllerFrame(sample) => {
                self.controller.set_sample(sample);
                self.fresh_command = true;
                self.refresh(now);
            }
            _ => {}
        }
    }

    fn accept_assignment(&mut self, name: &str, port: u16, now: u64) {
        let Some(port) = NonZeroU16::new(port) else {
            debug!("ignoring port assignment without a valid port");
            return;
        };
        if !self.decoder.identity().matches(name) {
            debug!("ignoring port assignment for '{}'", name);
            return;
        }

        match self.transport.rebind(port.get()) {
            Ok(()) => {
                self.state = SessionState::Connected { port };
                self.fresh_command = false;
                self.refresh(now);
                info!("assigned port {}, connected", port);
            }
            Err(e) => warn!("rebind to assigned port {} failed: {:?}", port, e),
        }
    }

    fn halt(&mut self) {
        self.motors.stop_all();
        self.fresh_command = false;
        self.stopped = true;
    }

    fn refresh(&mut self, now: u64) {
        self.last_command_ms = now;
        self.silence_handled = false;
    }
}
