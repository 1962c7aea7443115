//! # Data Store

use bridge_if::cmd::CmdVel;

use crate::{
    cmd_emitter::CmdEmitter,
    motion_ctrl::{self, MotionCtrl, MotionCtrlError},
    params::DriveExecParams,
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
///
/// Created once at startup and passed into every cycle, it holds all state which lives longer
/// than a single cycle.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    // MotionCtrl
    pub motion_ctrl: MotionCtrl,
    pub motion_ctrl_input: motion_ctrl::InputData,
    pub motion_ctrl_output: CmdVel,
    pub motion_ctrl_status_rpt: motion_ctrl::StatusReport,

    // Emission
    pub cmd_emitter: CmdEmitter,

    /// Number of commands handed to the session
    pub num_emissions: u64,

    /// Number of commands dropped because the session was not connected
    pub num_dropped_emissions: u64,

    /// Number of commands which could not be encoded or sent
    pub num_failed_emissions: u64,

    // Session monitoring
    /// Number of times the session has connected
    pub num_connections: u64,

    /// Number of times the session has been lost
    pub num_disconnections: u64,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Create the data store and initialise the modules it holds.
    pub fn new(params: &DriveExecParams) -> Result<Self, MotionCtrlError> {
        let mut ds = DataStore::default();

        ds.motion_ctrl.init(params.motion.clone())?;
        ds.cmd_emitter = CmdEmitter::new(params.emit_interval());

        Ok(ds)
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle.
    pub fn cycle_start(&mut self) {
        self.motion_ctrl_input = motion_ctrl::InputData::default();
        self.motion_ctrl_status_rpt = motion_ctrl::StatusReport::default();
    }
}
