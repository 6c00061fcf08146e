//! Inbound frame routing.

use kickhub_core::{ClientEvent, Envelope};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::dispatch::Scope;
use crate::hub::Hub;

pub const FRAMES_REJECTED: &str = "kickhub_frames_rejected_total";

/// Parse one text frame and act on it. Malformed frames are logged and dropped.
pub fn handle_frame(hub: &Hub, conn: &Connection, frame: &str) {
    match ClientEvent::parse(frame) {
        Ok(event) => handle_client_event(hub, conn, event),
        Err(e) => {
            warn!(connection_id = %conn.id, error = %e, "dropping malformed frame");
            hub.metrics()
                .increment_counter(FRAMES_REJECTED, &[("reason", e.error_kind())], 1);
        }
    }
}

pub fn handle_client_event(hub: &Hub, conn: &Connection, event: ClientEvent) {
    debug!(connection_id = %conn.id, event = event.name(), "client event");
    let session = &conn.session_id;
    match event {
        ClientEvent::Subscribe { channel } => hub.subscribe(conn, &channel),
        ClientEvent::Unsubscribe { channel } => {
            hub.unsubscribe(conn, &channel);
        }
        ClientEvent::Ping => {
            hub.deliver(conn, &Envelope::pong());
        }
        ClientEvent::SetMessageRate { rate } => {
            if let Err(e) = hub.set_rate(session, rate) {
                warn!(connection_id = %conn.id, session_id = %session, error = %e, "rate rejected");
            }
        }
        ClientEvent::TriggerEvent { kind } => {
            hub.trigger(&kind, &Scope::Session(session.clone()));
        }
        ClientEvent::ToggleChatInterval => {
            hub.toggle_chat_emitter(session);
        }
        ClientEvent::ToggleAllEventsInterval => {
            hub.toggle_all_events_emitter(session);
        }
        ClientEvent::Unknown { event } => {
            debug!(connection_id = %conn.id, event, "ignoring unknown event");
        }
    }
}
