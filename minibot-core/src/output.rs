//! PWM output capability and channel identifiers.

/// Error type for PWM output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// Peripheral/communication error.
    Io,
    /// Duty value above what the channel accepts.
    DutyOutOfRange,
    /// Channel not wired on this board.
    Unavailable,
}

/// A motor channel driven with a normalized command in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorChannel {
    Left,
    Right,
    /// Auxiliary DC motor (arm, intake, ...).
    Aux,
}

impl MotorChannel {
    pub const ALL: [MotorChannel; 3] = [MotorChannel::Left, MotorChannel::Right, MotorChannel::Aux];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            MotorChannel::Left => 0,
            MotorChannel::Right => 1,
            MotorChannel::Aux => 2,
        }
    }
}

/// Every PWM channel the robot drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmChannel {
    Motor(MotorChannel),
    Servo,
}

impl From<MotorChannel> for PwmChannel {
    fn from(channel: MotorChannel) -> Self {
        PwmChannel::Motor(channel)
    }
}

/// Raw PWM capability: write a duty value to a channel.
///
/// This is the only way the core touches hardware, so a fake can stand in
/// for the peripheral in tests.
pub trait PwmOutput {
    /// Write `duty` (0..=[`max_duty`](Self::max_duty)) to `channel`.
    fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), OutputError>;

    /// Largest duty value the peripheral accepts (e.g. 65535 at 16-bit resolution).
    fn max_duty(&self) -> u32;
}

impl<P: PwmOutput + ?Sized> PwmOutput for &mut P {
    fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), OutputError> {
        (**self).set_duty(channel, duty)
    }

    fn max_duty(&self) -> u32 {
        (**self).max_duty()
    }
}
