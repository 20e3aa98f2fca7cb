//! Teleop mapping from a controller sample to actuator commands.
//!
//! Tank drive: left stick Y drives the left motor, right stick Y the right
//! motor. Right stick X steers the servo over its full range. Cross and
//! circle run the auxiliary motor forward and reverse.

use minibot_proto::{ControllerSample, AXIS_CENTER};

use crate::motor::SERVO_RANGE;

/// Normalize an axis byte to [-1, 1], snapping values inside `deadband` to 0.
#[must_use]
pub fn axis_to_normalized(raw: u8, deadband: f32) -> f32 {
    let center = AXIS_CENTER as f32;
    let value = ((raw as f32 - center) / center).clamp(-1.0, 1.0);
    if value > -deadband && value < deadband {
        0.0
    } else {
        value
    }
}

/// Commands for every actuator, ready for
/// [`SessionManager::drive`](crate::SessionManager::drive).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveCommand {
    pub left: f32,
    pub right: f32,
    pub aux: f32,
    /// Degrees.
    pub servo_angle: f32,
}

impl DriveCommand {
    pub const STOP: Self = Self {
        left: 0.0,
        right: 0.0,
        aux: 0.0,
        servo_angle: 0.0,
    };
}

impl Default for DriveCommand {
    fn default() -> Self {
        Self::STOP
    }
}

/// Tuning for [`DriveMapping::command_for`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveMapping {
    /// Normalized stick travel treated as centered.
    pub deadband: f32,
    /// Auxiliary motor command while cross/circle is held, in [0, 1].
    pub aux_power: f32,
    /// Stick up (low byte values) means forward.
    pub invert_y: bool,
}

impl Default for DriveMapping {
    fn default() -> Self {
        Self {
            deadband: 0.05,
            aux_power: 1.0,
            invert_y: true,
        }
    }
}

impl DriveMapping {
    #[must_use]
    pub fn command_for(&self, sample: &ControllerSample) -> DriveCommand {
        let mut left = axis_to_normalized(sample.left_y, self.deadband);
        let mut right = axis_to_normalized(sample.right_y, self.deadband);
        if self.invert_y {
            left = -left;
            right = -right;
        }

        let power = self.aux_power.clamp(0.0, 1.0);
        let aux = match (sample.cross(), sample.circle()) {
            (true, false) => power,
            (false, true) => -power,
            _ => 0.0,
        };

        let servo_angle = axis_to_normalized(sample.right_x, self.deadband) * *SERVO_RANGE.end();

        DriveCommand {
            left,
            right,
            aux,
            servo_angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minibot_proto::Buttons;

    #[test]
    fn test_axis_to_normalized() {
        assert_eq!(axis_to_normalized(127, 0.0), 0.0);
        assert_eq!(axis_to_normalized(0, 0.0), -1.0);
        // 128 / 127 clamps
        assert_eq!(axis_to_normalized(255, 0.0), 1.0);
        assert_eq!(axis_to_normalized(130, 0.05), 0.0);
        assert!(axis_to_normalized(140, 0.05) > 0.1);
    }

    #[test]
    fn test_neutral_sample_stops() {
        let mapping = DriveMapping::default();
        assert_eq!(
            mapping.command_for(&ControllerSample::neutral()),
            DriveCommand::STOP
        );
    }

    #[test]
    fn test_tank_drive() {
        let mapping = DriveMapping::default();
        let sample = ControllerSample {
            left_y: 0,
            right_y: 255,
            ..ControllerSample::neutral()
        };
        let cmd = mapping.command_for(&sample);
        // stick up is forward with inverted Y
        assert_eq!(cmd.left, 1.0);
        assert_eq!(cmd.right, -1.0);

        let mapping = DriveMapping {
            invert_y: false,
            ..DriveMapping::default()
        };
        let cmd = mapping.command_for(&sample);
        assert_eq!(cmd.left, -1.0);
        assert_eq!(cmd.right, 1.0);
    }

    #[test]
    fn test_servo_steering() {
        let mapping = DriveMapping::default();
        let sample = ControllerSample {
            right_x: 0,
            ..ControllerSample::neutral()
        };
        assert_eq!(mapping.command_for(&sample).servo_angle, -50.0);
        let sample = ControllerSample {
            right_x: 255,
            ..ControllerSample::neutral()
        };
        assert_eq!(mapping.command_for(&sample).servo_angle, 50.0);
    }

    #[test]
    fn test_aux_buttons() {
        let mapping = DriveMapping {
            aux_power: 0.5,
            ..DriveMapping::default()
        };
        let mut sample = ControllerSample::neutral();

        sample.buttons = Buttons::CROSS;
        assert_eq!(mapping.command_for(&sample).aux, 0.5);

        sample.buttons = Buttons::CIRCLE;
        assert_eq!(mapping.command_for(&sample).aux, -0.5);

        sample.buttons = Buttons::CROSS | Buttons::CIRCLE;
        assert_eq!(mapping.command_for(&sample).aux, 0.0);

        sample.buttons = Buttons::SQUARE;
        assert_eq!(mapping.command_for(&sample).aux, 0.0);
    }
}
