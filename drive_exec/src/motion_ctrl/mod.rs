//! Motion control module
//!
//! Runs the fixed demonstration cycle of motion states, each of which is held for the configured
//! state duration:
//!
//! `FORWARD -> ROTATE_RIGHT -> ROTATE_LEFT -> BACKWARD -> STOP -> FORWARD -> ...`
//!
//! Transitions are driven only by elapsed time, never by the state of the network.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use bridge_if::cmd::CmdVel;

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A phase of the movement cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MotionState {
    Forward,
    RotateRight,
    RotateLeft,
    Backward,
    Stop,
}

/// Possible errors that can occur during MotionCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MotionCtrlError {
    #[error("MotionCtrl has not been initialised")]
    NotInitialised,

    #[error("Invalid MotionCtrl parameter {0}: {1}")]
    InvalidParam(&'static str, String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionState {
    /// The state which follows this one in the cycle.
    pub fn next(self) -> Self {
        match self {
            MotionState::Forward => MotionState::RotateRight,
            MotionState::RotateRight => MotionState::RotateLeft,
            MotionState::RotateLeft => MotionState::Backward,
            MotionState::Backward => MotionState::Stop,
            MotionState::Stop => MotionState::Forward,
        }
    }

    /// Upper case name of the state as it appears in the logs.
    pub fn name(self) -> &'static str {
        match self {
            MotionState::Forward => "FORWARD",
            MotionState::RotateRight => "ROTATE_RIGHT",
            MotionState::RotateLeft => "ROTATE_LEFT",
            MotionState::Backward => "BACKWARD",
            MotionState::Stop => "STOP",
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        MotionState::Forward
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Velocity setpoints for the given state.
///
/// Positive angular rates turn the robot to the left, negative to the right.
pub fn setpoints_for(state: MotionState, params: &Params) -> CmdVel {
    match state {
        MotionState::Forward => CmdVel::new(params.linear_speed_ms, 0.0),
        MotionState::RotateRight => CmdVel::new(0.0, -params.angular_speed_rads),
        MotionState::RotateLeft => CmdVel::new(0.0, params.angular_speed_rads),
        MotionState::Backward => CmdVel::new(-params.linear_speed_ms, 0.0),
        MotionState::Stop => CmdVel::new(0.0, 0.0),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cycle_order() {
        let mut state = MotionState::default();
        let mut seen = vec![state];

        for _ in 0..5 {
            state = state.next();
            seen.push(state);
        }

        assert_eq!(
            seen,
            vec![
                MotionState::Forward,
                MotionState::RotateRight,
                MotionState::RotateLeft,
                MotionState::Backward,
                MotionState::Stop,
                MotionState::Forward,
            ]
        );
    }

    #[test]
    fn test_setpoints() {
        let params = Params::default();

        assert_eq!(
            setpoints_for(MotionState::Forward, &params),
            CmdVel::new(0.3, 0.0)
        );
        assert_eq!(
            setpoints_for(MotionState::RotateRight, &params),
            CmdVel::new(0.0, -0.5)
        );
        assert_eq!(
            setpoints_for(MotionState::RotateLeft, &params),
            CmdVel::new(0.0, 0.5)
        );
        assert_eq!(
            setpoints_for(MotionState::Backward, &params),
            CmdVel::new(-0.3, 0.0)
        );

        // Stop is always zero, however many times it is asked for
        for _ in 0..3 {
            assert_eq!(
                setpoints_for(MotionState::Stop, &params),
                CmdVel::new(0.0, 0.0)
            );
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(MotionState::RotateRight.to_string(), "ROTATE_RIGHT");
        assert_eq!(MotionState::Stop.name(), "STOP");
    }
}
