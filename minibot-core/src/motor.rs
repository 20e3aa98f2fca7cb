//! Normalized motor/servo commands to PWM duty values.
//!
//! Motors take a command in [-1, 1]:
//!
//! ```text
//! duty = round(value * multiplier + offset[channel])
//! ```
//!
//! The servo takes an angle in [-50, 50] degrees, converted to a pulse width
//! and then to a duty value over the configured PWM period:
//!
//! ```text
//! ms   = 0.01 * angle + 1.5
//! duty = round(ms / period_ms * max_duty)
//! ```
//!
//! The PWM period is always supplied by configuration; there is no built-in
//! guess.

use core::ops::RangeInclusive;

use log::warn;

use crate::output::{MotorChannel, OutputError, PwmChannel, PwmOutput};

/// Accepted motor command range.
pub const MOTOR_RANGE: RangeInclusive<f32> = -1.0..=1.0;

/// Accepted servo angle range in degrees.
pub const SERVO_RANGE: RangeInclusive<f32> = -50.0..=50.0;

/// Servo pulse width at 0 degrees.
const SERVO_CENTER_MS: f32 = 1.5;

/// Pulse width change per degree.
const SERVO_MS_PER_DEGREE: f32 = 0.01;

/// Error type for drive commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// Command outside the accepted range; nothing was written.
    OutOfRange,
    /// Session is not in a state that allows motion; nothing was written.
    Inhibited,
    /// The PWM peripheral rejected the write.
    Output(OutputError),
}

/// Error type for calibration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Multiplier is NaN or infinite.
    InvalidMultiplier,
    /// Full-scale command on this channel maps outside `0..=max_duty`.
    MotorDutyOutOfRange(MotorChannel),
    /// Servo period is not a positive finite number.
    InvalidServoPeriod,
    /// Full-scale servo pulse does not fit in one period.
    ServoDutyOutOfRange,
}

/// Per-channel offsets, shared multiplier and servo period.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCalibration {
    multiplier: f32,
    offsets: [i32; 3],
    servo_period_ms: f32,
}

impl MotorCalibration {
    /// Same offset on every motor channel (uncalibrated board).
    #[must_use]
    pub const fn uniform(multiplier: f32, offset: i32, servo_period_ms: f32) -> Self {
        Self {
            multiplier,
            offsets: [offset; 3],
            servo_period_ms,
        }
    }

    /// Offsets indexed left, right, aux.
    #[must_use]
    pub const fn per_channel(multiplier: f32, offsets: [i32; 3], servo_period_ms: f32) -> Self {
        Self {
            multiplier,
            offsets,
            servo_period_ms,
        }
    }

    #[inline]
    #[must_use]
    pub const fn multiplier(&self) -> f32 {
        self.multiplier
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self, channel: MotorChannel) -> i32 {
        self.offsets[channel.index()]
    }

    #[inline]
    #[must_use]
    pub const fn servo_period_ms(&self) -> f32 {
        self.servo_period_ms
    }

    /// Unrounded duty for a motor command.
    #[inline]
    fn motor_raw(&self, channel: MotorChannel, value: f32) -> f32 {
        value * self.multiplier + self.offset(channel) as f32
    }

    /// Unrounded duty for a servo angle.
    #[inline]
    fn servo_raw(&self, angle: f32, max_duty: u32) -> f32 {
        let pulse_ms = SERVO_MS_PER_DEGREE * angle + SERVO_CENTER_MS;
        pulse_ms / self.servo_period_ms * max_duty as f32
    }

    /// Check that every in-range command maps into `0..=max_duty`.
    pub fn validate(&self, max_duty: u32) -> Result<(), CalibrationError> {
        if !self.multiplier.is_finite() {
            return Err(CalibrationError::InvalidMultiplier);
        }

        let max = max_duty as f32;
        for channel in MotorChannel::ALL {
            let a = self.motor_raw(channel, *MOTOR_RANGE.start());
            let b = self.motor_raw(channel, *MOTOR_RANGE.end());
            if a.min(b) < 0.0 || a.max(b) > max {
                return Err(CalibrationError::MotorDutyOutOfRange(channel));
            }
        }

        if !(self.servo_period_ms.is_finite() && self.servo_period_ms > 0.0) {
            return Err(CalibrationError::InvalidServoPeriod);
        }
        if self.servo_raw(*SERVO_RANGE.end(), max_duty) > max {
            return Err(CalibrationError::ServoDutyOutOfRange);
        }

        Ok(())
    }
}

/// Round a non-negative duty to the nearest integer.
#[inline]
fn round_duty(raw: f32) -> u32 {
    // Validated duties are never negative, so truncating after +0.5 rounds.
    (raw + 0.5) as u32
}

/// Drives the motor and servo channels of one robot.
///
/// Commands outside their range are rejected before anything is written.
pub struct MotorDriver<P> {
    pwm: P,
    calibration: MotorCalibration,
}

impl<P: PwmOutput> MotorDriver<P> {
    /// Create a driver, validating `calibration` against the PWM resolution.
    pub fn new(pwm: P, calibration: MotorCalibration) -> Result<Self, CalibrationError> {
        calibration.validate(pwm.max_duty())?;
        Ok(Self { pwm, calibration })
    }

    /// Drive a motor with `value` in [-1, 1]. Returns the duty written.
    pub fn drive_motor(&mut self, channel: MotorChannel, value: f32) -> Result<u32, DriveError> {
        // NaN fails `contains` as well
        if !MOTOR_RANGE.contains(&value) {
            return Err(DriveError::OutOfRange);
        }
        let duty = round_duty(self.calibration.motor_raw(channel, value));
        self.pwm
            .set_duty(channel.into(), duty)
            .map_err(DriveError::Output)?;
        Ok(duty)
    }

    /// Point the servo at `angle` degrees in [-50, 50]. Returns the duty written.
    pub fn drive_servo(&mut self, angle: f32) -> Result<u32, DriveError> {
        if !SERVO_RANGE.contains(&angle) {
            return Err(DriveError::OutOfRange);
        }
        let duty = round_duty(self.calibration.servo_raw(angle, self.pwm.max_duty()));
        self.pwm
            .set_duty(PwmChannel::Servo, duty)
            .map_err(DriveError::Output)?;
        Ok(duty)
    }

    /// Send the neutral command to every channel.
    ///
    /// Never fails: a channel that rejects the write is logged and the
    /// remaining channels are still stopped.
    pub fn stop_all(&mut self) {
        for channel in MotorChannel::ALL {
            if let Err(e) = self.drive_motor(channel, 0.0) {
                warn!("failed to stop {:?} motor: {:?}", channel, e);
            }
        }
        if let Err(e) = self.drive_servo(0.0) {
            warn!("failed to center servo: {:?}", e);
        }
    }

    #[inline]
    #[must_use]
    pub fn calibration(&self) -> &MotorCalibration {
        &self.calibration
    }

    /// Get a reference to the PWM output.
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Get a mutable reference to the PWM output.
    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }

    /// Decompose the driver into its PWM output.
    pub fn into_inner(self) -> P {
        self.pwm
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    struct RecordingPwm {
        writes: Vec<(PwmChannel, u32)>,
        max_duty: u32,
        fail_on: Option<PwmChannel>,
    }

    impl RecordingPwm {
        fn new(max_duty: u32) -> Self {
            Self {
                writes: Vec::new(),
                max_duty,
                fail_on: None,
            }
        }
    }

    impl PwmOutput for RecordingPwm {
        fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), OutputError> {
            if self.fail_on == Some(channel) {
                return Err(OutputError::Io);
            }
            self.writes.push((channel, duty));
            Ok(())
        }

        fn max_duty(&self) -> u32 {
            self.max_duty
        }
    }

    // 30/90 on a 16-bit channel, servo at 50 Hz
    const CALIBRATION: MotorCalibration = MotorCalibration::uniform(30.0, 90, 20.0);

    fn driver() -> MotorDriver<RecordingPwm> {
        MotorDriver::new(RecordingPwm::new(65535), CALIBRATION).unwrap()
    }

    #[test]
    fn test_drive_motor_rejects_out_of_range() {
        let mut motors = driver();
        assert_eq!(
            motors.drive_motor(MotorChannel::Left, -1.5),
            Err(DriveError::OutOfRange)
        );
        assert_eq!(
            motors.drive_motor(MotorChannel::Left, 1.5),
            Err(DriveError::OutOfRange)
        );
        assert_eq!(
            motors.drive_motor(MotorChannel::Left, f32::NAN),
            Err(DriveError::OutOfRange)
        );
        assert!(motors.pwm().writes.is_empty());
    }

    #[test]
    fn test_drive_motor_duties_are_ordered() {
        let mut motors = driver();
        let reverse = motors.drive_motor(MotorChannel::Left, -1.0).unwrap();
        let stop = motors.drive_motor(MotorChannel::Left, 0.0).unwrap();
        let forward = motors.drive_motor(MotorChannel::Left, 1.0).unwrap();
        assert_eq!((reverse, stop, forward), (60, 90, 120));
        assert!(reverse < stop && stop < forward);
        assert_eq!(motors.pwm().writes.len(), 3);
    }

    #[test]
    fn test_drive_motor_rounds() {
        let mut motors = driver();
        // 0.25 * 30 + 90 = 97.5
        assert_eq!(motors.drive_motor(MotorChannel::Aux, 0.25).unwrap(), 98);
        // 0.01 * 30 + 90 = 90.3
        assert_eq!(motors.drive_motor(MotorChannel::Aux, 0.01).unwrap(), 90);
    }

    #[test]
    fn test_per_channel_offsets() {
        let calibration = MotorCalibration::per_channel(30.0, [88, 93, 90], 20.0);
        let mut motors = MotorDriver::new(RecordingPwm::new(65535), calibration).unwrap();
        assert_eq!(motors.drive_motor(MotorChannel::Left, 0.0).unwrap(), 88);
        assert_eq!(motors.drive_motor(MotorChannel::Right, 0.0).unwrap(), 93);
        assert_eq!(
            motors.pwm().writes,
            [
                (PwmChannel::Motor(MotorChannel::Left), 88),
                (PwmChannel::Motor(MotorChannel::Right), 93)
            ]
        );
    }

    #[test]
    fn test_drive_servo() {
        let mut motors = driver();
        // 1.5 ms of 20 ms at 16 bits
        assert_eq!(motors.drive_servo(0.0).unwrap(), 4915);
        // 1.0 ms
        assert_eq!(motors.drive_servo(-50.0).unwrap(), 3277);
        // 2.0 ms
        assert_eq!(motors.drive_servo(50.0).unwrap(), 6554);
        assert_eq!(motors.drive_servo(50.5), Err(DriveError::OutOfRange));
        assert_eq!(motors.drive_servo(-51.0), Err(DriveError::OutOfRange));
        assert_eq!(motors.pwm().writes.len(), 3);
    }

    #[test]
    fn test_servo_uses_configured_period() {
        let calibration = MotorCalibration::uniform(30.0, 90, 10.0);
        let mut motors = MotorDriver::new(RecordingPwm::new(65535), calibration).unwrap();
        // 1.5 ms of 10 ms
        assert_eq!(motors.drive_servo(0.0).unwrap(), 9830);
    }

    #[test]
    fn test_stop_all_touches_every_channel() {
        let mut motors = driver();
        motors.stop_all();
        assert_eq!(
            motors.pwm().writes,
            [
                (PwmChannel::Motor(MotorChannel::Left), 90),
                (PwmChannel::Motor(MotorChannel::Right), 90),
                (PwmChannel::Motor(MotorChannel::Aux), 90),
                (PwmChannel::Servo, 4915),
            ]
        );
    }

    #[test]
    fn test_stop_all_continues_past_failures() {
        let mut motors = driver();
        motors.pwm_mut().fail_on = Some(PwmChannel::Motor(MotorChannel::Right));
        motors.stop_all();
        assert_eq!(motors.pwm().writes.len(), 3);
    }

    #[test]
    fn test_output_error_surfaces() {
        let mut motors = driver();
        motors.pwm_mut().fail_on = Some(PwmChannel::Servo);
        assert_eq!(
            motors.drive_servo(10.0),
            Err(DriveError::Output(OutputError::Io))
        );
    }

    #[test]
    fn test_calibration_validation() {
        // Offset below multiplier would need negative duty
        let calibration = MotorCalibration::uniform(30.0, 10, 20.0);
        assert_eq!(
            calibration.validate(65535),
            Err(CalibrationError::MotorDutyOutOfRange(MotorChannel::Left))
        );

        // Does not fit an 8-bit channel
        let calibration = MotorCalibration::per_channel(30.0, [90, 90, 240], 20.0);
        assert_eq!(
            calibration.validate(255),
            Err(CalibrationError::MotorDutyOutOfRange(MotorChannel::Aux))
        );

        let calibration = MotorCalibration::uniform(f32::INFINITY, 90, 20.0);
        assert_eq!(
            calibration.validate(65535),
            Err(CalibrationError::InvalidMultiplier)
        );

        let calibration = MotorCalibration::uniform(30.0, 90, 0.0);
        assert_eq!(
            calibration.validate(65535),
            Err(CalibrationError::InvalidServoPeriod)
        );

        // A 2 ms pulse cannot fit in a 1.5 ms period
        let calibration = MotorCalibration::uniform(30.0, 90, 1.5);
        assert_eq!(
            calibration.validate(65535),
            Err(CalibrationError::ServoDutyOutOfRange)
        );
    }

    #[test]
    fn test_negative_multiplier_reverses_direction() {
        let calibration = MotorCalibration::uniform(-30.0, 90, 20.0);
        let mut motors = MotorDriver::new(RecordingPwm::new(65535), calibration).unwrap();
        assert_eq!(motors.drive_motor(MotorChannel::Left, 1.0).unwrap(), 60);
    }
}
