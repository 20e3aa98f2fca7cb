//! Latest accepted controller input.

use minibot_proto::{ControllerSample, GameStatus};

/// Most recent controller sample and game status accepted by the session.
///
/// Only the session mutates this; everything else reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerState {
    sample: ControllerSample,
    status: GameStatus,
}

impl ControllerState {
    /// Sticks centered, nothing pressed, `Standby`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample: ControllerSample::neutral(),
            status: GameStatus::Standby,
        }
    }

    #[inline]
    #[must_use]
    pub const fn sample(&self) -> &ControllerSample {
        &self.sample
    }

    #[inline]
    #[must_use]
    pub const fn game_status(&self) -> GameStatus {
        self.status
    }

    /// Whether binary frames are currently honored.
    #[inline]
    #[must_use]
    pub fn is_teleop(&self) -> bool {
        self.status == GameStatus::Teleop
    }

    pub(crate) fn set_sample(&mut self, sample: ControllerSample) {
        self.sample = sample;
    }

    pub(crate) fn set_game_status(&mut self, status: GameStatus) {
        self.status = status;
    }
}
