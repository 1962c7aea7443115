//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Attach to the robot's local network, retrying until it is up
//!     - Initialise all modules
//!     - Open the session to the delivery bridge
//!     - Main loop:
//!         - Session servicing and lifecycle event handling
//!         - Motion control processing
//!         - Command emission
//!         - Cycle management
//!
//! The loop runs until the process is killed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use bridge_if::net::SocketIoClient;
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{cycle, data_store::DataStore, net_attach, params::DriveExecParams};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Minimum level of the messages written to the log.
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// Shortest time the loop will yield for, even when the cycle has overrun.
const MIN_YIELD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LOG_LEVEL, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Executable\n");
    info!(
        "Running on: {}",
        host::describe(&host::get_uname().wrap_err("Failed to get host information")?)
    );
    info!("Session ID: {}\n", session.session_id);

    // ---- LOAD PARAMETERS ----

    let params: DriveExecParams =
        util::params::load_or_default("drive_exec.toml").wrap_err("Could not load exec params")?;
    params.validate().wrap_err("Invalid exec params")?;

    info!("Exec parameters loaded");

    // ---- NETWORK ATTACHMENT ----

    info!("Attaching to network \"{}\"", params.network.ssid);

    let mut link = net_attach::link_from_params(&params.network);
    let attempts = net_attach::attach_with_retry(link.as_mut(), &params.network, thread::sleep);

    info!("Network attached after {} attempt(s)", attempts);
    match net_attach::local_addr_towards(&params.bridge_endpoint) {
        Some(ip) => info!("IP address: {}\n", ip),
        None => warn!("Could not determine the local address towards the bridge\n"),
    }

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::new(&params).wrap_err("Failed to initialise the DataStore")?;

    info!("MotionCtrl init complete");
    info!("Module initialisation complete\n");

    // ---- INITIALISE SESSION TO THE BRIDGE ----

    let mut client = SocketIoClient::connect(params.bridge_endpoint.clone(), params.session.clone())
        .wrap_err("Failed to initialise the bridge session")?;

    info!("Bridge session to {} initialised", client.endpoint().url());

    info!("==============================================");
    info!("  Movement demo: cmd_vel over Socket.IO");
    info!(
        "  Cycle: FORWARD -> ROTATE_RIGHT -> ROTATE_LEFT -> BACKWARD -> STOP, {:.1} s each",
        params.motion.state_duration().as_secs_f64()
    );
    info!("==============================================\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let loop_start = Instant::now();
    let loop_period = params.loop_period();

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        cycle::tick(&mut ds, &mut client, cycle_start_instant - loop_start);

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match loop_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d.max(MIN_YIELD));
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    (cycle_dur - loop_period).as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                // Still yield the CPU
                thread::sleep(MIN_YIELD);
            }
        }
    }
}
