//! # Command Emitter
//!
//! Sends the current velocity setpoints to the bridge at a fixed interval, independent of how
//! often the motion state changes. Emission is fire and forget, nothing is retried or buffered:
//! a command which cannot be sent is superseded by the next one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bridge_if::{
    cmd::CmdVel,
    net::{SessionError, Transport},
};
use log::{debug, trace, warn};
use std::time::Duration;

use crate::motion_ctrl::MotionState;
use util::time;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Rate limiter and sender for `cmd_vel` events.
#[derive(Debug, Default)]
pub struct CmdEmitter {
    /// Minimum time between two emissions
    interval: Duration,

    /// Monotonic time of the last emission
    last_emit: Duration,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What happened when the emitter was processed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EmitOutcome {
    /// The emission interval has not elapsed yet.
    NotDue,

    /// The command was handed to the session.
    Sent,

    /// The session was not connected, the command was dropped.
    Dropped,

    /// The command could not be encoded or sent.
    Failed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdEmitter {
    /// Create a new emitter. The first command is sent once `interval` has elapsed.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: Duration::ZERO,
        }
    }

    /// Return if an emission is due at the given time.
    pub fn is_due(&self, now: Duration) -> bool {
        time::elapsed_since(now, self.last_emit) >= self.interval
    }

    /// Monotonic time of the last emission attempt.
    pub fn last_emit(&self) -> Duration {
        self.last_emit
    }

    /// Emit the given command if the emission interval has elapsed.
    ///
    /// The interval restarts whether or not the command could actually be sent.
    pub fn proc<T: Transport>(
        &mut self,
        now: Duration,
        state: MotionState,
        cmd: &CmdVel,
        transport: &mut T,
    ) -> EmitOutcome {
        if !self.is_due(now) {
            return EmitOutcome::NotDue;
        }

        self.last_emit = now;

        if !transport.is_connected() {
            trace!("Not connected, dropping {:?}", cmd);
            return EmitOutcome::Dropped;
        }

        let event = match cmd.encode() {
            Ok(e) => e,
            Err(e) => {
                warn!("Could not encode the velocity command: {}", e);
                return EmitOutcome::Failed;
            }
        };

        match transport.emit(&event) {
            Ok(()) => {
                debug!(
                    "State: {} | linear_x={:.2}, angular_z={:.2}",
                    state, cmd.linear_x, cmd.angular_z
                );
                EmitOutcome::Sent
            }
            Err(SessionError::NotConnected) => {
                trace!("Not connected, dropping {}", event);
                EmitOutcome::Dropped
            }
            Err(e) => {
                warn!("Could not emit the velocity command: {}", e);
                EmitOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::MockTransport;

    #[test]
    fn test_interval() {
        let mut emitter = CmdEmitter::new(Duration::from_millis(100));
        let mut transport = MockTransport::connected();
        let cmd = CmdVel::new(0.3, 0.0);

        let outcomes: Vec<EmitOutcome> = [0u64, 50, 99, 100, 150, 199, 200]
            .iter()
            .map(|t| {
                emitter.proc(
                    Duration::from_millis(*t),
                    MotionState::Forward,
                    &cmd,
                    &mut transport,
                )
            })
            .collect();

        assert_eq!(
            outcomes,
            vec![
                EmitOutcome::NotDue,
                EmitOutcome::NotDue,
                EmitOutcome::NotDue,
                EmitOutcome::Sent,
                EmitOutcome::NotDue,
                EmitOutcome::NotDue,
                EmitOutcome::Sent,
            ]
        );
        assert_eq!(
            transport.emitted,
            vec![
                String::from(r#"["cmd_vel",{"linear_x":0.3,"angular_z":0.0}]"#);
                2
            ]
        );
    }

    #[test]
    fn test_drop_when_disconnected() {
        let mut emitter = CmdEmitter::new(Duration::from_millis(100));
        let mut transport = MockTransport::default();

        let outcome = emitter.proc(
            Duration::from_millis(100),
            MotionState::Stop,
            &CmdVel::default(),
            &mut transport,
        );

        assert_eq!(outcome, EmitOutcome::Dropped);
        assert!(transport.emitted.is_empty());

        // The interval still restarts so the next attempt is a full interval later
        assert_eq!(emitter.last_emit(), Duration::from_millis(100));
        assert!(!emitter.is_due(Duration::from_millis(150)));
    }
}
