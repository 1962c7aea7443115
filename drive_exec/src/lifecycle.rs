//! # Session lifecycle handler
//!
//! Reacts to the events raised by the bridge session. The only event which causes any action is
//! `Connected`, upon which the default namespace is joined. Everything else is observed and
//! logged, in particular a disconnection leaves the motion cycle running untouched and
//! reconnecting is left to the session itself.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bridge_if::net::{packet::DEFAULT_NAMESPACE, SessionEvent, Transport};
use log::{info, warn};

use crate::data_store::DataStore;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Handle a single session event.
pub fn handle_event<T: Transport>(event: &SessionEvent, transport: &mut T, ds: &mut DataStore) {
    match event {
        SessionEvent::Connected { url } => {
            ds.num_connections += 1;
            info!("[IOc] Connected to url: {}", url);

            // Socket.IO does not join the default namespace automatically
            if let Err(e) = transport.join_namespace(DEFAULT_NAMESPACE) {
                warn!("Could not join the default namespace: {}", e);
            }
        }
        SessionEvent::Disconnected { reason } => {
            ds.num_disconnections += 1;
            info!("[IOc] Disconnected! ({:?})", reason);
        }
        SessionEvent::Joined { namespace, sid } => match sid {
            Some(s) => info!("[IOc] Joined namespace {} (sid {})", namespace, s),
            None => info!("[IOc] Joined namespace {}", namespace),
        },
        SessionEvent::MessageReceived { payload } => info!("[IOc] get event: {}", payload),
        SessionEvent::Ack { payload } => info!("[IOc] get ack: {}", payload.len()),
        SessionEvent::ProtocolError { payload } => warn!("[IOc] get error: {}", payload),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{params::DriveExecParams, test_utils::MockTransport};
    use bridge_if::net::DisconnectReason;

    #[test]
    fn test_connected_joins_default_namespace() {
        let params = DriveExecParams::default();
        let mut ds = DataStore::new(&params).unwrap();
        let mut transport = MockTransport::connected();

        handle_event(
            &SessionEvent::Connected {
                url: String::from("ws://localhost:9009/socket.io/?EIO=4&transport=websocket"),
            },
            &mut transport,
            &mut ds,
        );

        assert_eq!(transport.joined, vec![String::from("/")]);
        assert!(transport.emitted.is_empty());
        assert_eq!(ds.num_connections, 1);
    }

    #[test]
    fn test_other_events_are_observed_only() {
        let params = DriveExecParams::default();
        let mut ds = DataStore::new(&params).unwrap();
        let mut transport = MockTransport::connected();

        let events = vec![
            SessionEvent::Disconnected {
                reason: DisconnectReason::PingTimeout,
            },
            SessionEvent::Joined {
                namespace: String::from("/"),
                sid: Some(String::from("abc")),
            },
            SessionEvent::MessageReceived {
                payload: String::from(r#"["status","ok"]"#),
            },
            SessionEvent::Ack {
                payload: String::from("[]"),
            },
            SessionEvent::ProtocolError {
                payload: String::from("bad"),
            },
        ];

        for e in events.iter() {
            handle_event(e, &mut transport, &mut ds);
        }

        assert!(transport.joined.is_empty());
        assert!(transport.emitted.is_empty());
        assert_eq!(ds.num_disconnections, 1);
        assert_eq!(ds.num_connections, 0);
    }

    #[test]
    fn test_disconnect_leaves_motion_untouched() {
        let params = DriveExecParams::default();
        let mut ds = DataStore::new(&params).unwrap();
        let mut transport = MockTransport::connected();

        // Run the cycle into its second state
        for t in (0..=3500).step_by(10) {
            crate::cycle::tick(&mut ds, &mut transport, std::time::Duration::from_millis(t));
        }

        let state = ds.motion_ctrl.current();
        let last_transition = ds.motion_ctrl.last_transition();
        let last_emit = ds.cmd_emitter.last_emit();

        handle_event(
            &SessionEvent::Disconnected {
                reason: DisconnectReason::ServerClosed,
            },
            &mut transport,
            &mut ds,
        );

        assert_eq!(ds.motion_ctrl.current(), state);
        assert_eq!(ds.motion_ctrl.last_transition(), last_transition);
        assert_eq!(ds.cmd_emitter.last_emit(), last_emit);
    }
}
