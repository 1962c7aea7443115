//! # Main loop cycle
//!
//! One cycle of the executable, in the order:
//!
//! 1. Session input: poll the session and handle every lifecycle event it raised
//! 2. Motion control: advance the motion cycle if the state duration has elapsed
//! 3. Emission: send the current setpoints if the emission interval has elapsed
//!
//! Session events are always handled before any emission decision in the same cycle, so a join
//! request sent on connection precedes the first command of that connection.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bridge_if::net::Transport;
use log::warn;
use std::time::Duration;

use crate::{
    cmd_emitter::EmitOutcome,
    data_store::DataStore,
    lifecycle,
    motion_ctrl::{self, Transition},
};
use util::module::State;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// What happened during a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Number of session events handled
    pub num_events: usize,

    /// Motion state transition made this cycle
    pub transition: Option<Transition>,

    /// Result of the emission step
    pub emission: EmitOutcome,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute one cycle at the monotonic time `now`, measured from the start of the main loop.
///
/// Nothing in a cycle can fail in a way that stops the loop, errors are logged and the cycle
/// carries on.
pub fn tick<T: Transport>(ds: &mut DataStore, transport: &mut T, now: Duration) -> CycleReport {
    ds.cycle_start();

    // ---- SESSION INPUT ----

    let events = transport.poll();
    for event in events.iter() {
        lifecycle::handle_event(event, transport, ds);
    }

    // ---- MOTION CONTROL ----

    ds.motion_ctrl_input = motion_ctrl::InputData { now };

    match ds.motion_ctrl.proc(&ds.motion_ctrl_input) {
        Ok((o, r)) => {
            ds.motion_ctrl_output = o;
            ds.motion_ctrl_status_rpt = r;
        }
        Err(e) => warn!("Error during MotionCtrl processing: {}", e),
    }

    // ---- EMISSION ----

    let emission = ds.cmd_emitter.proc(
        now,
        ds.motion_ctrl.current(),
        &ds.motion_ctrl_output,
        transport,
    );

    match emission {
        EmitOutcome::Sent => ds.num_emissions += 1,
        EmitOutcome::Dropped => ds.num_dropped_emissions += 1,
        EmitOutcome::Failed => ds.num_failed_emissions += 1,
        EmitOutcome::NotDue => (),
    }

    ds.num_cycles += 1;

    CycleReport {
        num_events: events.len(),
        transition: ds.motion_ctrl_status_rpt.transition,
        emission,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{motion_ctrl::MotionState, params::DriveExecParams, test_utils::MockTransport};
    use bridge_if::net::{DisconnectReason, SessionEvent};

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn new_ds() -> DataStore {
        DataStore::new(&DriveExecParams::default()).unwrap()
    }

    #[test]
    fn test_emissions_per_state() {
        let mut ds = new_ds();
        let mut transport = MockTransport::connected();

        // Count emissions made while in each state over three full cycles, with 10 ms ticks
        let mut counts: Vec<(MotionState, u32)> = vec![(MotionState::Forward, 0)];

        for t in (10..=45_000).step_by(10) {
            let rpt = tick(&mut ds, &mut transport, ms(t));

            if let Some(tr) = rpt.transition {
                counts.push((tr.to, 0));
            }
            if rpt.emission == EmitOutcome::Sent {
                if let Some(last) = counts.last_mut() {
                    last.1 += 1;
                }
            }
        }

        // Ignore the first state, entered at t=0 rather than on a transition, and the last one
        // which may not be complete
        for (state, count) in counts[1..counts.len() - 1].iter() {
            assert!(
                (29..=31).contains(count),
                "{} emissions in {}",
                count,
                state
            );
        }
        assert_eq!(ds.num_emissions as usize, transport.emitted.len());
    }

    #[test]
    fn test_first_rotate_right_command() {
        let mut ds = new_ds();
        let mut transport = MockTransport::connected();

        for t in (0..3000).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }
        assert_eq!(ds.motion_ctrl.current(), MotionState::Forward);
        let forward_emissions = transport.emitted.len();

        let rpt = tick(&mut ds, &mut transport, ms(3000));
        assert_eq!(ds.motion_ctrl.current(), MotionState::RotateRight);
        assert!(rpt.transition.is_some());
        assert_eq!(rpt.emission, EmitOutcome::Sent);

        assert_eq!(transport.emitted.len(), forward_emissions + 1);
        assert_eq!(
            transport.emitted.last().map(String::as_str),
            Some(r#"["cmd_vel",{"linear_x":0.0,"angular_z":-0.5}]"#)
        );
    }

    #[test]
    fn test_join_precedes_commands() {
        let mut ds = new_ds();
        let mut transport = MockTransport::default();

        // Disconnected to start with, commands are dropped
        for t in (0..=500).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }
        assert!(transport.frames.is_empty());
        assert_eq!(ds.num_dropped_emissions, 5);

        // Connect on a tick where an emission is also due
        transport.queue(SessionEvent::Connected {
            url: String::from("ws://localhost:9009/socket.io/?EIO=4&transport=websocket"),
        });
        let rpt = tick(&mut ds, &mut transport, ms(600));
        assert_eq!(rpt.num_events, 1);
        assert_eq!(rpt.emission, EmitOutcome::Sent);

        assert_eq!(transport.frames.len(), 2);
        assert_eq!(transport.frames[0], "40");
        assert!(transport.frames[1].starts_with(r#"42["cmd_vel","#));

        for t in (610..=1000).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }

        // Exactly one join for the connection
        assert_eq!(transport.frames.iter().filter(|f| *f == "40").count(), 1);
        assert_eq!(ds.num_connections, 1);
    }

    #[test]
    fn test_motion_continues_through_disconnection() {
        let mut ds = new_ds();
        let mut transport = MockTransport::default();

        transport.queue(SessionEvent::Connected {
            url: String::from("ws://bridge"),
        });
        for t in (0..=2000).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }

        transport.queue(SessionEvent::Disconnected {
            reason: DisconnectReason::PingTimeout,
        });
        for t in (2010..=7000).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }

        // The cycle kept going while nobody was listening
        assert_eq!(ds.motion_ctrl.current(), MotionState::RotateLeft);
        assert_eq!(ds.num_disconnections, 1);
        assert!(ds.num_dropped_emissions >= 49);

        // And emission resumes on reconnection, after a new join
        transport.queue(SessionEvent::Connected {
            url: String::from("ws://bridge"),
        });
        let sent_before = transport.emitted.len();
        for t in (7010..=7500).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }
        assert_eq!(transport.joined.len(), 2);
        assert_eq!(transport.emitted.len(), sent_before + 5);
        assert_eq!(
            transport.emitted.last().map(String::as_str),
            Some(r#"["cmd_vel",{"linear_x":0.0,"angular_z":0.5}]"#)
        );
    }

    #[test]
    fn test_failed_sends_are_counted() {
        let mut ds = new_ds();
        let mut transport = MockTransport {
            fail_sends: true,
            ..MockTransport::connected()
        };

        for t in (0..=1000).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }

        // Failures are neither sent nor dropped, and the timer still restarts
        assert_eq!(ds.num_failed_emissions, 10);
        assert_eq!(ds.num_emissions, 0);
        assert_eq!(ds.num_dropped_emissions, 0);
        assert_eq!(ds.cmd_emitter.last_emit(), ms(1000));

        transport.fail_sends = false;
        for t in (1010..=1100).step_by(10) {
            tick(&mut ds, &mut transport, ms(t));
        }
        assert_eq!(ds.num_emissions, 1);
        assert_eq!(ds.num_failed_emissions, 10);
    }
}
