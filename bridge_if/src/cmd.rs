//! # Bridge commands
//!
//! Commands sent to the delivery bridge are Socket.IO events, i.e. a JSON array whose first
//! element is the event name and whose second element is the payload object.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Name of the velocity command event expected by the bridge.
pub const CMD_VEL_EVENT: &str = "cmd_vel";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A velocity command for the robot base.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdVel {
    /// Linear velocity along the robot's X+ (forwards) axis.
    ///
    /// Units: meters/second
    pub linear_x: f64,

    /// Angular velocity about the robot's Z+ (upwards) axis.
    ///
    /// Follows the right hand rule, so that a positive rate turns the robot to the left and a
    /// negative rate turns it to the right.
    ///
    /// Units: radians/second
    pub angular_z: f64,
}

/// An event which has been encoded into its wire text, ready to be emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent(String);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Event names cannot be empty")]
    EmptyEventName,

    #[error("Could not serialize the event payload: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdVel {
    /// Create a new velocity command.
    pub fn new(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear_x,
            angular_z,
        }
    }

    /// Encode this command as a `cmd_vel` event.
    pub fn encode(&self) -> Result<EncodedEvent, EncodeError> {
        encode_event(CMD_VEL_EVENT, self)
    }
}

impl EncodedEvent {
    /// The encoded `["name",{...}]` text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncodedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode a named event and its payload as `["<event_name>",<payload>]`.
pub fn encode_event<T>(event_name: &str, payload: &T) -> Result<EncodedEvent, EncodeError>
where
    T: Serialize,
{
    if event_name.is_empty() {
        return Err(EncodeError::EmptyEventName);
    }

    serde_json::to_string(&(event_name, payload))
        .map(EncodedEvent)
        .map_err(EncodeError::SerializationError)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_cmd_vel() {
        assert_eq!(
            CmdVel::new(0.0, -0.5).encode().unwrap().as_str(),
            r#"["cmd_vel",{"linear_x":0.0,"angular_z":-0.5}]"#
        );
        assert_eq!(
            CmdVel::new(0.3, 0.0).encode().unwrap().as_str(),
            r#"["cmd_vel",{"linear_x":0.3,"angular_z":0.0}]"#
        );
    }

    #[test]
    fn test_encode_generic_event() {
        let event = encode_event("status", &serde_json::json!({"ok": true})).unwrap();
        assert_eq!(event.to_string(), r#"["status",{"ok":true}]"#);

        assert!(matches!(
            encode_event("", &CmdVel::default()),
            Err(EncodeError::EmptyEventName)
        ));
    }
}
