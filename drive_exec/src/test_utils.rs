//! Test helpers shared by the drive library's unit tests.

use bridge_if::{
    cmd::EncodedEvent,
    net::{packet, tungstenite, SessionError, SessionEvent, Transport},
};

/// An in-memory session which records everything sent through it.
///
/// Events queued with [`MockTransport::queue`] are returned by the next poll, and
/// `Connected`/`Disconnected` events change the connection state as a real session would.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub connected: bool,

    /// If set, sends fail as if the socket had been closed under the session
    pub fail_sends: bool,

    /// Events to return from the next poll
    pub pending: Vec<SessionEvent>,

    /// Encoded events emitted, without the packet type prefix
    pub emitted: Vec<String>,

    /// Namespaces joined
    pub joined: Vec<String>,

    /// Every frame sent, in order
    pub frames: Vec<String>,
}

impl MockTransport {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn queue(&mut self, event: SessionEvent) {
        self.pending.push(event);
    }
}

impl Transport for MockTransport {
    fn poll(&mut self) -> Vec<SessionEvent> {
        let events: Vec<SessionEvent> = self.pending.drain(..).collect();

        for e in events.iter() {
            match e {
                SessionEvent::Connected { .. } => self.connected = true,
                SessionEvent::Disconnected { .. } => self.connected = false,
                _ => (),
            }
        }

        events
    }

    fn emit(&mut self, event: &EncodedEvent) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_sends {
            return Err(SessionError::SendError(tungstenite::Error::AlreadyClosed));
        }

        self.frames.push(packet::event_frame(event.as_str()));
        self.emitted.push(event.as_str().to_string());
        Ok(())
    }

    fn join_namespace(&mut self, namespace: &str) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }

        self.frames.push(packet::connect_frame(namespace));
        self.joined.push(namespace.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
