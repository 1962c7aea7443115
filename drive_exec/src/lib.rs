//! # Drive library.
//!
//! This library allows other crates in the workspace to access items defined inside the drive
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command emitter - sends the current velocity setpoints to the bridge at a fixed rate
pub mod cmd_emitter;

/// Main loop cycle - one tick of the executable
pub mod cycle;

/// Data store - state of the executable which outlives a single cycle
pub mod data_store;

/// Session lifecycle handler - reacts to connection events raised by the bridge session
pub mod lifecycle;

/// Motion control module - steps through the demonstration motion cycle
pub mod motion_ctrl;

/// Network attachment - associates the host to the robot's access point
pub mod net_attach;

/// Executable parameters
pub mod params;

#[cfg(test)]
pub(crate) mod test_utils;
