//! # Engine.IO and Socket.IO packets
//!
//! Socket.IO (protocol 5) packets are carried inside Engine.IO (protocol 4) message packets, each
//! of which is sent as a single WebSocket text frame. Only the subset needed by a text-only client
//! is supported, binary packets are recognised but not decoded.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The default (root) namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO pong packet, sent in reply to the server's pings.
pub const ENGINE_PONG: &str = "3";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Contents of the Engine.IO open packet sent by the server at the start of every connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session ID
    pub sid: String,

    /// Interval at which the server sends pings.
    ///
    /// Units: milliseconds
    pub ping_interval: u64,

    /// Time the server waits for a pong before closing the connection.
    ///
    /// Units: milliseconds
    pub ping_timeout: u64,

    /// Maximum number of bytes per chunk accepted by the server.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket<'a> {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    /// A message, whose contents are a Socket.IO packet.
    Message(&'a str),
    Upgrade,
    Noop,
}

/// A Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// The server accepted a namespace connection.
    Connect {
        namespace: String,
        sid: Option<String>,
    },

    /// The server closed a namespace connection.
    Disconnect { namespace: String },

    /// An event, `payload` is the raw JSON array.
    Event {
        namespace: String,
        ack_id: Option<u64>,
        payload: String,
    },

    /// Acknowledgement of an event previously sent with an ack ID.
    Ack {
        namespace: String,
        ack_id: Option<u64>,
        payload: String,
    },

    /// The server refused a namespace connection.
    ConnectError { namespace: String, payload: String },

    /// Binary event or ack, not decoded.
    Binary { namespace: String },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PacketError {
    #[error("Empty packet")]
    Empty,

    #[error("Unknown Engine.IO packet type '{0}'")]
    UnknownEngineType(char),

    #[error("Unknown Socket.IO packet type '{0}'")]
    UnknownSocketType(char),

    #[error("Invalid Engine.IO open handshake: {0}")]
    InvalidHandshake(String),

    #[error("Malformed Socket.IO packet: {0}")]
    Malformed(String),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse the text of a WebSocket frame as an Engine.IO packet.
pub fn parse_engine_packet(text: &str) -> Result<EnginePacket<'_>, PacketError> {
    let mut chars = text.chars();
    let packet_type = chars.next().ok_or(PacketError::Empty)?;
    let data = chars.as_str();

    match packet_type {
        '0' => serde_json::from_str(data)
            .map(EnginePacket::Open)
            .map_err(|e| PacketError::InvalidHandshake(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => Ok(EnginePacket::Message(data)),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        t => Err(PacketError::UnknownEngineType(t)),
    }
}

/// Parse the contents of an Engine.IO message as a Socket.IO packet.
///
/// Format: `<type>[<attachments>-][<namespace>,][<ack id>][<json>]`
pub fn parse_socket_packet(text: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = text.chars();
    let packet_type = chars.next().ok_or(PacketError::Empty)?;
    let mut rest = chars.as_str();

    // Binary packets carry an attachment count first, which we only need to skip
    if packet_type == '5' || packet_type == '6' {
        match rest.find('-') {
            Some(i) => rest = &rest[i + 1..],
            None => return Err(PacketError::Malformed(text.to_string())),
        }
    }

    // Namespaces other than the root are written before a comma
    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(i) => {
                let ns = &rest[..i];
                rest = &rest[i + 1..];
                ns.to_string()
            }
            None => {
                let ns = rest.to_string();
                rest = "";
                ns
            }
        }
    } else {
        String::from(DEFAULT_NAMESPACE)
    };

    // Optional ack ID
    let num_digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = match num_digits {
        0 => None,
        n => Some(
            rest[..n]
                .parse::<u64>()
                .map_err(|_| PacketError::Malformed(text.to_string()))?,
        ),
    };
    let payload = rest[num_digits..].to_string();

    match packet_type {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            sid: parse_connect_sid(&payload),
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => Ok(SocketPacket::Event {
            namespace,
            ack_id,
            payload,
        }),
        '3' => Ok(SocketPacket::Ack {
            namespace,
            ack_id,
            payload,
        }),
        '4' => Ok(SocketPacket::ConnectError { namespace, payload }),
        '5' | '6' => Ok(SocketPacket::Binary { namespace }),
        t => Err(PacketError::UnknownSocketType(t)),
    }
}

/// Build the Engine.IO message requesting a connection to the given namespace.
pub fn connect_frame(namespace: &str) -> String {
    if namespace.is_empty() || namespace == DEFAULT_NAMESPACE {
        String::from("40")
    } else {
        format!("40{},", namespace)
    }
}

/// Build the Engine.IO message carrying an event on the default namespace.
///
/// `event` must already be the encoded `["name",payload]` array.
pub fn event_frame(event: &str) -> String {
    format!("42{}", event)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Get the session ID from the payload of a connect packet, if there is one.
fn parse_connect_sid(payload: &str) -> Option<String> {
    if payload.is_empty() {
        return None;
    }

    serde_json::from_str::<serde_json::Value>(payload)
        .ok()?
        .get("sid")?
        .as_str()
        .map(String::from)
}
