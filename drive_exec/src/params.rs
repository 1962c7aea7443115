//! # Drive Executable Parameters
//!
//! This module provide parameters for the drive executable. Every parameter has a compiled-in
//! default, a `params/drive_exec.toml` file may override any of them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bridge_if::net::{Endpoint, SessionOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{motion_ctrl, net_attach::NetworkParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveExecParams {
    /// Local network to attach to before connecting to the bridge
    pub network: NetworkParams,

    /// Socket.IO endpoint of the delivery bridge
    pub bridge_endpoint: Endpoint,

    /// Connection management options for the bridge session
    pub session: SessionOptions,

    /// Motion cycle parameters
    pub motion: motion_ctrl::Params,

    /// Interval between two `cmd_vel` emissions.
    ///
    /// Units: milliseconds
    pub emit_interval_ms: u64,

    /// Idle delay at the end of each main loop cycle.
    ///
    /// Units: milliseconds
    pub loop_period_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Parameter {0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("Invalid motion parameters: {0}")]
    InvalidMotion(motion_ctrl::MotionCtrlError),

    #[error("Invalid bridge endpoint: {0}")]
    InvalidEndpoint(bridge_if::net::SessionError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveExecParams {
    /// The emission interval as a `Duration`.
    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    /// The loop period as a `Duration`.
    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    /// Check that the parameters are usable.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.emit_interval_ms == 0 {
            return Err(ParamsError::NotPositive("emit_interval_ms"));
        }
        if self.loop_period_ms == 0 {
            return Err(ParamsError::NotPositive("loop_period_ms"));
        }
        if self.network.attach_retry_ms == 0 {
            return Err(ParamsError::NotPositive("network.attach_retry_ms"));
        }
        self.motion.validate().map_err(ParamsError::InvalidMotion)?;
        self.bridge_endpoint
            .validate()
            .map_err(ParamsError::InvalidEndpoint)?;

        Ok(())
    }
}

impl Default for DriveExecParams {
    fn default() -> Self {
        Self {
            network: NetworkParams::default(),
            bridge_endpoint: Endpoint::new("192.168.0.103", 9009),
            session: SessionOptions::default(),
            motion: motion_ctrl::Params::default(),
            emit_interval_ms: 100,
            loop_period_ms: 10,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = DriveExecParams::default();

        assert!(p.validate().is_ok());
        assert_eq!(p.emit_interval(), Duration::from_millis(100));
        assert_eq!(p.motion.state_duration(), Duration::from_millis(3000));
        assert_eq!(p.motion.linear_speed_ms, 0.3);
        assert_eq!(p.motion.angular_speed_rads, 0.5);
        assert_eq!(
            p.bridge_endpoint.url(),
            "ws://192.168.0.103:9009/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_partial_file() {
        let p: DriveExecParams = util::params::from_str(
            r#"
            emit_interval_ms = 50

            [bridge_endpoint]
            host = "10.0.0.2"
            port = 9010

            [motion]
            angular_speed_rads = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(p.emit_interval_ms, 50);
        assert_eq!(p.loop_period_ms, 10);
        assert_eq!(p.bridge_endpoint.host, "10.0.0.2");
        assert_eq!(p.bridge_endpoint.path, bridge_if::net::DEFAULT_PATH);
        assert_eq!(p.motion.angular_speed_rads, 0.8);
        assert_eq!(p.motion.linear_speed_ms, 0.3);
    }

    #[test]
    fn test_validate() {
        let p = DriveExecParams {
            emit_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NotPositive("emit_interval_ms"))
        ));

        let mut p = DriveExecParams::default();
        p.bridge_endpoint.port = 0;
        assert!(matches!(
            p.validate(),
            Err(ParamsError::InvalidEndpoint(_))
        ));
    }
}
