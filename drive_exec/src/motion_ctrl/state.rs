//! Implementations for the MotionCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use bridge_if::cmd::CmdVel;
use log::info;
use std::time::Duration;

// Internal
use super::{setpoints_for, MotionCtrlError, MotionState, Params};
use util::{module::State, time};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion control module state
#[derive(Debug, Default)]
pub struct MotionCtrl {
    pub(crate) params: Params,

    initialised: bool,

    /// The current motion state
    current: MotionState,

    /// Monotonic time of the last transition, or of initialisation if no transition has occured
    /// yet.
    last_transition: Duration,
}

/// Input data to Motion Control.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputData {
    /// Monotonic time since the start of the main loop.
    pub now: Duration,
}

/// A change of motion state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Transition {
    pub from: MotionState,
    pub to: MotionState,
}

/// Status report for MotionCtrl processing.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StatusReport {
    /// The transition made this cycle, if any
    pub transition: Option<Transition>,

    /// Time spent in the current state so far
    pub state_elapsed: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MotionCtrl {
    type InitData = Params;
    type InitError = MotionCtrlError;

    type InputData = InputData;
    type OutputData = CmdVel;
    type StatusReport = StatusReport;
    type ProcError = MotionCtrlError;

    /// Initialise the MotionCtrl module.
    ///
    /// The cycle starts in `FORWARD` with the state timer at zero.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        init_data.validate()?;

        self.params = init_data;
        self.current = MotionState::Forward;
        self.last_transition = Duration::ZERO;
        self.initialised = true;

        Ok(())
    }

    /// Advance the cycle if the current state has been held for the state duration, and return
    /// the setpoints of the (possibly new) current state.
    ///
    /// At most one transition is made per call, even if more than one state duration has passed
    /// since the last transition.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if !self.initialised {
            return Err(MotionCtrlError::NotInitialised);
        }

        let mut report = StatusReport::default();

        if time::elapsed_since(input_data.now, self.last_transition)
            >= self.params.state_duration()
        {
            let from = self.current;
            self.current = from.next();
            self.last_transition = input_data.now;

            match self.current {
                MotionState::Forward => info!("=== Restarting cycle - FORWARD ==="),
                s => info!("=== Transitioning to {} ===", s),
            }

            report.transition = Some(Transition {
                from,
                to: self.current,
            });
        }

        report.state_elapsed = time::elapsed_since(input_data.now, self.last_transition);

        Ok((setpoints_for(self.current, &self.params), report))
    }
}

impl MotionCtrl {
    /// The current motion state.
    pub fn current(&self) -> MotionState {
        self.current
    }

    /// Monotonic time of the last transition.
    pub fn last_transition(&self) -> Duration {
        self.last_transition
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(ms: u64) -> InputData {
        InputData {
            now: Duration::from_millis(ms),
        }
    }

    fn init_ctrl() -> MotionCtrl {
        let mut ctrl = MotionCtrl::default();
        ctrl.init(Params::default()).unwrap();
        ctrl
    }

    #[test]
    fn test_proc_before_init() {
        let mut ctrl = MotionCtrl::default();
        assert!(matches!(
            ctrl.proc(&ms(0)),
            Err(MotionCtrlError::NotInitialised)
        ));
    }

    #[test]
    fn test_init_rejects_invalid_params() {
        let mut ctrl = MotionCtrl::default();
        let params = Params {
            state_duration_ms: 0,
            ..Params::default()
        };
        assert!(ctrl.init(params).is_err());

        let params = Params {
            angular_speed_rads: std::f64::NAN,
            ..Params::default()
        };
        assert!(ctrl.init(params).is_err());
    }

    #[test]
    fn test_transition_at_state_duration() {
        let mut ctrl = init_ctrl();

        let (cmd, rpt) = ctrl.proc(&ms(2999)).unwrap();
        assert_eq!(ctrl.current(), MotionState::Forward);
        assert_eq!(cmd, CmdVel::new(0.3, 0.0));
        assert_eq!(rpt.transition, None);

        let (cmd, rpt) = ctrl.proc(&ms(3000)).unwrap();
        assert_eq!(ctrl.current(), MotionState::RotateRight);
        assert_eq!(cmd, CmdVel::new(0.0, -0.5));
        assert_eq!(
            rpt.transition,
            Some(Transition {
                from: MotionState::Forward,
                to: MotionState::RotateRight
            })
        );
        assert_eq!(rpt.state_elapsed, Duration::ZERO);
        assert_eq!(ctrl.last_transition(), Duration::from_millis(3000));
    }

    #[test]
    fn test_no_catch_up_after_stall() {
        let mut ctrl = init_ctrl();

        // A stall of more than three state durations still only makes one transition
        let (_, rpt) = ctrl.proc(&ms(10_000)).unwrap();
        assert_eq!(ctrl.current(), MotionState::RotateRight);
        assert!(rpt.transition.is_some());

        // And the timer restarts from the stalled tick
        ctrl.proc(&ms(12_999)).unwrap();
        assert_eq!(ctrl.current(), MotionState::RotateRight);
        ctrl.proc(&ms(13_000)).unwrap();
        assert_eq!(ctrl.current(), MotionState::RotateLeft);
    }

    #[test]
    fn test_cycle_with_jittered_ticks() {
        let mut ctrl = init_ctrl();
        let mut now = 0u64;
        let mut transitions = Vec::new();

        // Ticks of irregular length, between 7 and 19 ms
        let jitter = [7u64, 13, 19, 11, 8, 17];
        let mut i = 0;

        while now < 40_000 {
            now += jitter[i % jitter.len()];
            i += 1;

            let (_, rpt) = ctrl.proc(&ms(now)).unwrap();
            if let Some(t) = rpt.transition {
                transitions.push(t);
            }
        }

        assert!(transitions.len() >= 12);

        // Every transition follows the cycle, with no skips
        for t in transitions.iter() {
            assert_eq!(t.to, t.from.next());
        }
        for pair in transitions.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert_eq!(transitions[0].from, MotionState::Forward);
    }
}
