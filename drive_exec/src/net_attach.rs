//! # Network attachment
//!
//! Before anything else can run the host must be associated to the robot's access point. The
//! association itself is done by NetworkManager through `nmcli`; this module retries it, with a
//! fixed delay, until the link is up. Nothing else starts until it is.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bridge_if::net::Endpoint;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, ToSocketAddrs, UdpSocket},
    process::Command,
    time::Duration,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A local network link which can be associated using credentials.
pub trait NetworkLink {
    /// Start associating to the network.
    fn begin(&mut self, params: &NetworkParams) -> Result<(), AttachError>;

    /// Return if the link is currently associated.
    fn is_attached(&mut self, params: &NetworkParams) -> Result<bool, AttachError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the local network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// If false the network is assumed to be managed by the host, and no association is
    /// attempted.
    pub manage_link: bool,

    /// Network name (SSID)
    pub ssid: String,

    /// Network password
    pub password: String,

    /// Wireless interface to use, or `None` to let NetworkManager choose
    pub interface: Option<String>,

    /// Delay between two association attempts.
    ///
    /// Units: milliseconds
    pub attach_retry_ms: u64,

    /// Time NetworkManager may take to complete a single association.
    ///
    /// Units: seconds
    pub attach_wait_s: u32,
}

/// A link associated using NetworkManager's command line client.
#[derive(Debug, Default)]
pub struct NmcliLink;

/// A link whose association is handled outside of this executable.
#[derive(Debug, Default)]
pub struct HostManagedLink;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("Could not run nmcli: {0}")]
    CommandError(std::io::Error),

    #[error("nmcli exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("nmcli output was not valid UTF-8")]
    NonUtf8Output,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            manage_link: true,
            ssid: String::from("ESP32"),
            password: String::from("12345678"),
            interface: None,
            attach_retry_ms: 1000,
            attach_wait_s: 10,
        }
    }
}

impl NetworkParams {
    /// Delay between two association attempts as a `Duration`.
    pub fn attach_retry(&self) -> Duration {
        Duration::from_millis(self.attach_retry_ms)
    }
}

impl NetworkLink for NmcliLink {
    fn begin(&mut self, params: &NetworkParams) -> Result<(), AttachError> {
        let mut args = vec![
            String::from("--wait"),
            params.attach_wait_s.to_string(),
            String::from("device"),
            String::from("wifi"),
            String::from("connect"),
            params.ssid.clone(),
            String::from("password"),
            params.password.clone(),
        ];
        if let Some(ref iface) = params.interface {
            args.push(String::from("ifname"));
            args.push(iface.clone());
        }

        run_nmcli(&args).map(|_| ())
    }

    fn is_attached(&mut self, params: &NetworkParams) -> Result<bool, AttachError> {
        let stdout = run_nmcli(&[
            "-t".to_string(),
            "-f".to_string(),
            "DEVICE,TYPE,STATE,CONNECTION".to_string(),
            "device".to_string(),
        ])?;

        Ok(wifi_attached(&stdout, params))
    }
}

impl NetworkLink for HostManagedLink {
    fn begin(&mut self, _params: &NetworkParams) -> Result<(), AttachError> {
        Ok(())
    }

    fn is_attached(&mut self, _params: &NetworkParams) -> Result<bool, AttachError> {
        Ok(true)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create the link described by the parameters.
pub fn link_from_params(params: &NetworkParams) -> Box<dyn NetworkLink> {
    if params.manage_link {
        Box::new(NmcliLink)
    } else {
        Box::new(HostManagedLink)
    }
}

/// Associate the link, retrying forever with the configured delay until it is up.
///
/// `sleep` is called between attempts. Returns the number of attempts made.
pub fn attach_with_retry<L, S>(link: &mut L, params: &NetworkParams, mut sleep: S) -> u64
where
    L: NetworkLink + ?Sized,
    S: FnMut(Duration),
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        // The link may already be up, for instance if the host auto-connects on boot
        match link.is_attached(params) {
            Ok(true) => return attempts,
            Ok(false) => (),
            Err(e) => warn!("Could not get the network status: {}", e),
        }

        if let Err(e) = link.begin(params) {
            debug!("Association attempt {} failed: {}", attempts, e);
        }

        match link.is_attached(params) {
            Ok(true) => return attempts,
            Ok(false) => (),
            Err(e) => warn!("Could not get the network status: {}", e),
        }

        info!("Connecting to network \"{}\"...", params.ssid);
        sleep(params.attach_retry());
    }
}

/// The local address used to reach the given endpoint.
///
/// No packet is sent, the address is the one the OS picks for the route to the endpoint.
pub fn local_addr_towards(endpoint: &Endpoint) -> Option<IpAddr> {
    let remote = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .ok()?
        .next()?;

    let bind_addr = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).ok()?;
    socket.connect(remote).ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run nmcli with the given arguments, returning its stdout.
fn run_nmcli(args: &[String]) -> Result<String, AttachError> {
    let output = Command::new("nmcli")
        .args(args)
        .output()
        .map_err(AttachError::CommandError)?;

    if !output.status.success() {
        return Err(AttachError::CommandFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| AttachError::NonUtf8Output)
}

/// Check `nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device` output for a connected wifi device,
/// matching the configured interface if there is one.
fn wifi_attached(nmcli_stdout: &str, params: &NetworkParams) -> bool {
    nmcli_stdout.lines().any(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 3 {
            return false;
        }

        let iface_ok = match params.interface {
            Some(ref i) => fields[0] == i.as_str(),
            None => true,
        };

        iface_ok && fields[1] == "wifi" && fields[2] == "connected"
    })
}
