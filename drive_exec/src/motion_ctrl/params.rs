//! Parameters structure for MotionCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::MotionCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Speed used by the forward and backward states.
    ///
    /// Units: meters/second
    pub linear_speed_ms: f64,

    /// Turn rate used by the rotate states.
    ///
    /// Units: radians/second
    pub angular_speed_rads: f64,

    /// Time spent in each state before moving on to the next.
    ///
    /// Units: milliseconds
    pub state_duration_ms: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// The state duration as a `Duration`.
    pub fn state_duration(&self) -> Duration {
        Duration::from_millis(self.state_duration_ms)
    }

    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), MotionCtrlError> {
        if !self.linear_speed_ms.is_finite() {
            return Err(MotionCtrlError::InvalidParam(
                "linear_speed_ms",
                format!("{} is not finite", self.linear_speed_ms),
            ));
        }
        if !self.angular_speed_rads.is_finite() {
            return Err(MotionCtrlError::InvalidParam(
                "angular_speed_rads",
                format!("{} is not finite", self.angular_speed_rads),
            ));
        }
        if self.state_duration_ms == 0 {
            return Err(MotionCtrlError::InvalidParam(
                "state_duration_ms",
                String::from("must be greater than zero"),
            ));
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            linear_speed_ms: 0.3,
            angular_speed_rads: 0.5,
            state_duration_ms: 3000,
        }
    }
}
