//! # Network Module
//!
//! This module provides the Socket.IO session used to talk to the delivery bridge. The session
//! runs over a non-blocking WebSocket so that it can be serviced from the executable's cyclic
//! loop without a background thread.
//!
//! The session is entirely poll driven:
//! - `poll()` must be called every cycle. It reads any pending frames, answers keep-alive pings,
//!   detects lost connections and reconnects once the reconnect interval has elapsed.
//! - Lifecycle changes and received messages are returned from `poll()` as [`SessionEvent`]s.
//! - `emit()` sends an event immediately if the session is connected, otherwise it returns
//!   [`SessionError::NotConnected`] and the event is dropped.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod packet;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    io::ErrorKind,
    net::{TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};
use tungstenite::{
    handshake::{client::ClientHandshake, HandshakeError, MidHandshake},
    Message, WebSocket,
};

use crate::cmd::EncodedEvent;
use packet::{EnginePacket, OpenHandshake, SocketPacket};

// Export tungstenite
pub use tungstenite;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default Socket.IO path, requesting Engine.IO protocol revision 4.
pub const DEFAULT_PATH: &str = "/socket.io/?EIO=4";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A message-oriented session to the bridge.
///
/// Implemented by [`SocketIoClient`], and by test doubles in the executable's tests.
pub trait Transport {
    /// Service the connection, returning the lifecycle events which occured since the last poll.
    fn poll(&mut self) -> Vec<SessionEvent>;

    /// Emit an already encoded event on the default namespace.
    fn emit(&mut self, event: &EncodedEvent) -> Result<(), SessionError>;

    /// Request to join the given namespace.
    fn join_namespace(&mut self, namespace: &str) -> Result<(), SessionError>;

    /// Return if the session is currently connected.
    fn is_connected(&self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Location of the Socket.IO server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address of the server
    pub host: String,

    /// TCP port of the server
    pub port: u16,

    /// Request path, including the Engine.IO query string
    #[serde(default = "default_path")]
    pub path: String,
}

/// Options controlling the session's connection management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Time to wait between connection attempts.
    ///
    /// Units: milliseconds
    pub reconnect_interval_ms: u64,

    /// Time allowed for the WebSocket handshake and the server's Engine.IO open packet once the
    /// TCP connection is established. The handshake is driven across polls, it never blocks.
    ///
    /// Units: milliseconds
    pub connect_timeout_ms: u64,

    /// Maximum time `poll()` blocks establishing the TCP connection.
    ///
    /// Units: milliseconds
    pub tcp_connect_timeout_ms: u64,

    /// Maximum number of frames read in a single call to `poll()`.
    pub max_frames_per_poll: usize,
}

/// Socket.IO client session.
pub struct SocketIoClient {
    endpoint: Endpoint,

    options: SessionOptions,

    link: Link,

    events: VecDeque<SessionEvent>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lifecycle and message events raised by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The Engine.IO session has been opened.
    Connected { url: String },

    /// A previously opened session has been lost.
    Disconnected { reason: DisconnectReason },

    /// The server accepted our request to join a namespace.
    Joined {
        namespace: String,
        sid: Option<String>,
    },

    /// An event was received from the server, `payload` is the raw JSON array.
    MessageReceived { payload: String },

    /// An acknowledgement was received from the server.
    Ack { payload: String },

    /// The server refused a request or sent something which could not be understood.
    ProtocolError { payload: String },
}

/// Why a session was lost.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// The server closed the Engine.IO session or the WebSocket.
    ServerClosed,

    /// The server closed our namespace connection.
    NamespaceClosed,

    /// No ping was received from the server in time.
    PingTimeout,

    /// The WebSocket handshake or the Engine.IO open packet did not complete in time.
    OpenTimeout,

    /// Reading from or writing to the socket failed.
    TransportError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Could not connect to the server: {0}")]
    CouldNotConnect(std::io::Error),

    #[error("WebSocket handshake with the server failed: {0}")]
    HandshakeError(String),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, std::io::Error),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send to the server: {0}")]
    SendError(tungstenite::Error),
}

/// State of the underlying connection.
enum Link {
    /// No socket, waiting until `retry_at` to attempt a connection.
    Down { retry_at: Instant },

    /// TCP connected, WebSocket handshake in progress.
    Handshaking {
        handshake: MidHandshake<ClientHandshake<TcpStream>>,
        deadline: Instant,
    },

    /// WebSocket open, waiting for the Engine.IO open packet.
    Opening {
        socket: WebSocket<TcpStream>,
        deadline: Instant,
    },

    /// Engine.IO session open.
    Open {
        socket: WebSocket<TcpStream>,
        handshake: OpenHandshake,
        ping_deadline: Instant,
    },
}

/// Outcome of handling a single frame.
enum FrameAction {
    None,
    Opened(OpenHandshake),
    PingReceived,
    Lost(DisconnectReason),
    Event(SessionEvent),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Endpoint {
    /// Create a new endpoint using the default Socket.IO path.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: String::from(host),
            port,
            path: String::from(DEFAULT_PATH),
        }
    }

    /// The WebSocket URL of the endpoint.
    pub fn url(&self) -> String {
        let sep = if self.path.contains('?') { '&' } else { '?' };
        format!(
            "ws://{}:{}{}{}transport=websocket",
            self.host, self.port, self.path, sep
        )
    }

    /// Check that the endpoint can be used.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.host.is_empty() {
            return Err(SessionError::InvalidEndpoint(String::from("empty host")));
        }
        if self.port == 0 {
            return Err(SessionError::InvalidEndpoint(String::from("port is zero")));
        }
        if !self.path.starts_with('/') {
            return Err(SessionError::InvalidEndpoint(format!(
                "path \"{}\" must start with '/'",
                self.path
            )));
        }
        Ok(())
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 500,
            connect_timeout_ms: 1000,
            tcp_connect_timeout_ms: 20,
            max_frames_per_poll: 32,
        }
    }
}

impl SocketIoClient {
    /// Create a new session to the given endpoint.
    ///
    /// This function does not block until the server is reached, the first connection attempt
    /// is made on the first call to `poll()` and retried every reconnect interval after that.
    pub fn connect(endpoint: Endpoint, options: SessionOptions) -> Result<Self, SessionError> {
        endpoint.validate()?;

        Ok(Self {
            endpoint,
            options,
            link: Link::Down {
                retry_at: Instant::now(),
            },
            events: VecDeque::new(),
        })
    }

    /// The endpoint this session connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send a text frame, treating a full socket buffer as success since tungstenite keeps the
    /// frame queued until the next write.
    fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        let socket = match &mut self.link {
            Link::Open { socket, .. } => socket,
            _ => return Err(SessionError::NotConnected),
        };

        match socket.send(Message::Text(text)) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                let reason = DisconnectReason::TransportError(e.to_string());
                self.lose_link(reason);
                Err(SessionError::SendError(e))
            }
        }
    }

    /// Connect to the server and start the WebSocket handshake.
    ///
    /// Only the TCP connection blocks, for at most the TCP connect timeout. The socket is
    /// non-blocking from then on, so the handshake is usually still in progress on return.
    fn start_handshake(&self) -> Result<Link, SessionError> {
        let addr = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(SessionError::CouldNotConnect)?
            .next()
            .ok_or_else(|| {
                SessionError::InvalidEndpoint(format!("{} did not resolve", self.endpoint.host))
            })?;

        let stream = TcpStream::connect_timeout(
            &addr,
            Duration::from_millis(self.options.tcp_connect_timeout_ms),
        )
        .map_err(SessionError::CouldNotConnect)?;

        stream
            .set_nodelay(true)
            .map_err(|e| SessionError::SocketOptionError("nodelay".into(), e))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| SessionError::SocketOptionError("nonblocking".into(), e))?;

        let deadline = Instant::now() + Duration::from_millis(self.options.connect_timeout_ms);

        match tungstenite::client(self.endpoint.url().as_str(), stream) {
            Ok((socket, _response)) => Ok(Link::Opening { socket, deadline }),
            Err(HandshakeError::Interrupted(handshake)) => {
                Ok(Link::Handshaking { handshake, deadline })
            }
            Err(HandshakeError::Failure(e)) => Err(SessionError::HandshakeError(e.to_string())),
        }
    }

    /// Drop the current socket and schedule a reconnection attempt.
    ///
    /// A `Disconnected` event is only raised if the Engine.IO session had been opened.
    fn lose_link(&mut self, reason: DisconnectReason) {
        let retry_at = Instant::now() + Duration::from_millis(self.options.reconnect_interval_ms);
        let previous = std::mem::replace(&mut self.link, Link::Down { retry_at });

        match previous {
            Link::Open { mut socket, .. } => {
                socket.close(None).ok();
                socket.flush().ok();
                self.events.push_back(SessionEvent::Disconnected { reason });
            }
            Link::Opening { mut socket, .. } => {
                socket.close(None).ok();
                debug!("Session to {} not opened: {:?}", self.endpoint.url(), reason);
            }
            Link::Handshaking { .. } => {
                debug!("WebSocket handshake with {} failed: {:?}", self.endpoint.url(), reason);
            }
            Link::Down { .. } => (),
        }
    }

    /// Attempt a connection if one is due, or continue the handshake in progress.
    fn service_connect(&mut self, now: Instant) {
        let previous = std::mem::replace(&mut self.link, Link::Down { retry_at: now });

        self.link = match previous {
            Link::Down { retry_at } if now < retry_at => Link::Down { retry_at },
            Link::Down { .. } => match self.start_handshake() {
                Ok(link) => link,
                Err(e) => {
                    debug!("Connection attempt failed: {}", e);
                    self.retry_link()
                }
            },
            Link::Handshaking {
                handshake,
                deadline,
            } => match handshake.handshake() {
                Ok((socket, _response)) => {
                    debug!("WebSocket to {} open", self.endpoint.url());
                    Link::Opening { socket, deadline }
                }
                Err(HandshakeError::Interrupted(handshake)) => Link::Handshaking {
                    handshake,
                    deadline,
                },
                Err(HandshakeError::Failure(e)) => {
                    debug!("WebSocket handshake with {} failed: {}", self.endpoint.url(), e);
                    self.retry_link()
                }
            },
            other => other,
        };
    }

    /// A down link which retries one reconnect interval from now.
    fn retry_link(&self) -> Link {
        Link::Down {
            retry_at: Instant::now() + Duration::from_millis(self.options.reconnect_interval_ms),
        }
    }

    /// Read all pending frames from the socket.
    fn service_socket(&mut self) {
        for _ in 0..self.options.max_frames_per_poll {
            let socket = match &mut self.link {
                Link::Opening { socket, .. } | Link::Open { socket, .. } => socket,
                Link::Down { .. } | Link::Handshaking { .. } => return,
            };

            let action = match socket.read() {
                Ok(Message::Text(text)) => handle_text(&text),
                Ok(Message::Close(_)) => FrameAction::Lost(DisconnectReason::ServerClosed),
                // Pings are answered by tungstenite on the next write, binary is not used
                Ok(_) => FrameAction::None,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                    // Push out anything still queued, such as automatic pongs
                    socket.flush().ok();
                    return;
                }
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => {
                    FrameAction::Lost(DisconnectReason::ServerClosed)
                }
                Err(e) => FrameAction::Lost(DisconnectReason::TransportError(e.to_string())),
            };

            self.apply(action);
        }
    }

    /// Apply the result of handling a frame to the session.
    fn apply(&mut self, action: FrameAction) {
        match action {
            FrameAction::None => (),
            FrameAction::Opened(handshake) => {
                let previous = std::mem::replace(
                    &mut self.link,
                    Link::Down {
                        retry_at: Instant::now(),
                    },
                );

                match previous {
                    Link::Opening { socket, .. } => {
                        debug!("Engine.IO session {} open", handshake.sid);
                        let ping_deadline = Instant::now() + ping_window(&handshake);
                        self.link = Link::Open {
                            socket,
                            handshake,
                            ping_deadline,
                        };
                        self.events.push_back(SessionEvent::Connected {
                            url: self.endpoint.url(),
                        });
                    }
                    // A second open packet is a protocol violation, keep the existing session
                    other => {
                        self.link = other;
                        self.events.push_back(SessionEvent::ProtocolError {
                            payload: String::from("unexpected Engine.IO open packet"),
                        });
                    }
                }
            }
            FrameAction::PingReceived => {
                if let Link::Open {
                    handshake,
                    ping_deadline,
                    ..
                } = &mut self.link
                {
                    *ping_deadline = Instant::now() + ping_window(handshake);
                }

                trace!("Ping received");
                if let Err(e) = self.send_text(String::from(packet::ENGINE_PONG)) {
                    warn!("Could not send pong: {}", e);
                }
            }
            FrameAction::Lost(reason) => self.lose_link(reason),
            FrameAction::Event(event) => self.events.push_back(event),
        }
    }

    /// The reason the link has expired at `now`, if it has.
    fn expired(&self, now: Instant) -> Option<DisconnectReason> {
        match &self.link {
            Link::Handshaking { deadline, .. } | Link::Opening { deadline, .. }
                if now > *deadline =>
            {
                Some(DisconnectReason::OpenTimeout)
            }
            Link::Open { ping_deadline, .. } if now > *ping_deadline => {
                Some(DisconnectReason::PingTimeout)
            }
            _ => None,
        }
    }

    /// Check the open and ping deadlines.
    fn check_deadlines(&mut self) {
        if let Some(r) = self.expired(Instant::now()) {
            self.lose_link(r);
        }
    }
}

impl Transport for SocketIoClient {
    fn poll(&mut self) -> Vec<SessionEvent> {
        self.service_connect(Instant::now());
        self.service_socket();
        self.check_deadlines();

        self.events.drain(..).collect()
    }

    fn emit(&mut self, event: &EncodedEvent) -> Result<(), SessionError> {
        self.send_text(packet::event_frame(event.as_str()))
    }

    fn join_namespace(&mut self, namespace: &str) -> Result<(), SessionError> {
        self.send_text(packet::connect_frame(namespace))
    }

    fn is_connected(&self) -> bool {
        matches!(self.link, Link::Open { .. })
    }
}

impl Drop for SocketIoClient {
    fn drop(&mut self) {
        if let Link::Open { socket, .. } | Link::Opening { socket, .. } = &mut self.link {
            socket.close(None).ok();
            socket.flush().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_path() -> String {
    String::from(DEFAULT_PATH)
}

/// Time allowed between two pings from the server before the session is considered lost.
fn ping_window(handshake: &OpenHandshake) -> Duration {
    Duration::from_millis(handshake.ping_interval + handshake.ping_timeout)
}

/// Handle a text frame received from the server.
fn handle_text(text: &str) -> FrameAction {
    let engine_packet = match packet::parse_engine_packet(text) {
        Ok(p) => p,
        Err(e) => {
            return FrameAction::Event(SessionEvent::ProtocolError {
                payload: format!("{}: {}", e, text),
            })
        }
    };

    match engine_packet {
        EnginePacket::Open(handshake) => FrameAction::Opened(handshake),
        EnginePacket::Close => FrameAction::Lost(DisconnectReason::ServerClosed),
        EnginePacket::Ping => FrameAction::PingReceived,
        EnginePacket::Pong | EnginePacket::Upgrade | EnginePacket::Noop => FrameAction::None,
        EnginePacket::Message(msg) => match packet::parse_socket_packet(msg) {
            Ok(p) => handle_socket_packet(p),
            Err(e) => FrameAction::Event(SessionEvent::ProtocolError {
                payload: format!("{}: {}", e, msg),
            }),
        },
    }
}

/// Map a Socket.IO packet onto the session's reaction to it.
fn handle_socket_packet(packet: SocketPacket) -> FrameAction {
    match packet {
        SocketPacket::Connect { namespace, sid } => {
            FrameAction::Event(SessionEvent::Joined { namespace, sid })
        }
        // Rejoining requires a new session, so the whole connection is dropped and reopened
        SocketPacket::Disconnect { .. } => FrameAction::Lost(DisconnectReason::NamespaceClosed),
        SocketPacket::Event { payload, .. } => {
            FrameAction::Event(SessionEvent::MessageReceived { payload })
        }
        SocketPacket::Ack { payload, .. } => FrameAction::Event(SessionEvent::Ack { payload }),
        SocketPacket::ConnectError { payload, .. } => {
            FrameAction::Event(SessionEvent::ProtocolError { payload })
        }
        SocketPacket::Binary { namespace } => {
            trace!("Ignoring binary packet on {}", namespace);
            FrameAction::None
        }
    }
}
