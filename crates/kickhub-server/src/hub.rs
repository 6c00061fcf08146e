//! Connection registry.
//!
//! All registry state (connection set, session index, emitters, rates) sits
//! behind one mutex. Every mutation takes it for its whole duration and
//! nothing awaits while holding it; mailbox pushes are `try_send` only.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use kickhub_core::{ConnectionId, Envelope, SessionId};
use kickhub_telemetry::MetricsRecorder;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Delivery};
use crate::session::{EmissionRate, SessionState};

pub const ENVELOPES_DELIVERED: &str = "kickhub_envelopes_delivered_total";
pub const CONNECTIONS_SHED: &str = "kickhub_connections_shed_total";
pub const CONNECTIONS_ACTIVE: &str = "kickhub_connections_active";
pub const SESSIONS_ACTIVE: &str = "kickhub_sessions_active";

#[derive(Default)]
pub(crate) struct HubState {
    pub(crate) connections: HashMap<ConnectionId, Arc<Connection>>,
    pub(crate) sessions: HashMap<SessionId, SessionState>,
}

/// Owner of every live connection and the session index.
pub struct Hub {
    pub(crate) state: Mutex<HubState>,
    pub(crate) default_rate: EmissionRate,
    pub(crate) metrics: Arc<MetricsRecorder>,
    pub(crate) self_ref: Weak<Hub>,
    mailbox_capacity: usize,
}

impl Hub {
    pub fn new(
        mailbox_capacity: usize,
        default_rate: EmissionRate,
        metrics: Arc<MetricsRecorder>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            state: Mutex::new(HubState::default()),
            default_rate,
            metrics,
            self_ref: self_ref.clone(),
            mailbox_capacity,
        })
    }

    /// Create a connection for `session_id` and register it.
    pub fn connect(&self, session_id: SessionId) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let (conn, rx) = Connection::new(ConnectionId::new(), session_id, self.mailbox_capacity);
        let conn = Arc::new(conn);
        self.register(Arc::clone(&conn));
        (conn, rx)
    }

    /// Add to the global set and append to the session's member list.
    pub fn register(&self, conn: Arc<Connection>) {
        let (connections, sessions) = {
            let mut state = self.state.lock();
            let default_rate = self.default_rate;
            state
                .sessions
                .entry(conn.session_id.clone())
                .or_insert_with(|| SessionState::new(default_rate))
                .members
                .push(conn.id.clone());
            state.connections.insert(conn.id.clone(), Arc::clone(&conn));
            (state.connections.len(), state.sessions.len())
        };
        self.record_population(connections, sessions);
        info!(connection_id = %conn.id, session_id = %conn.session_id, "client registered");
    }

    /// Remove a connection and close its mailbox. No-op if already gone.
    ///
    /// When the last member of a session leaves, the session and both of its
    /// emitters go with it.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let (conn, session_closed, connections, sessions) = {
            let mut state = self.state.lock();
            let Some(conn) = state.connections.remove(id) else {
                return false;
            };
            let mut session_closed = false;
            if let Some(session) = state.sessions.get_mut(&conn.session_id) {
                session.members.retain(|m| m != id);
                if session.members.is_empty() {
                    // Dropping the state cancels its emitters.
                    state.sessions.remove(&conn.session_id);
                    session_closed = true;
                }
            }
            (conn, session_closed, state.connections.len(), state.sessions.len())
        };

        conn.close_mailbox();
        self.record_population(connections, sessions);
        debug!(connection_id = %id, session_id = %conn.session_id, session_closed, "client unregistered");
        if session_closed {
            info!(session_id = %conn.session_id, "session ended");
        }
        true
    }

    /// Unregister every connection. Used at shutdown; each writer flushes and
    /// sends a Close frame. Returns how many were closed.
    pub fn disconnect_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.state.lock().connections.keys().cloned().collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }

    /// Push one envelope to one connection without blocking.
    ///
    /// A full mailbox sheds the connection. Returns `true` if queued.
    pub fn deliver(&self, conn: &Connection, envelope: &Envelope) -> bool {
        match conn.try_deliver(envelope.to_frame()) {
            Delivery::Delivered => {
                self.metrics.increment_counter(ENVELOPES_DELIVERED, &[], 1);
                true
            }
            Delivery::Full => {
                warn!(
                    connection_id = %conn.id,
                    session_id = %conn.session_id,
                    event = %envelope.event,
                    "mailbox full, disconnecting slow client"
                );
                if self.unregister(&conn.id) {
                    self.metrics.increment_counter(CONNECTIONS_SHED, &[], 1);
                }
                false
            }
            Delivery::Closed => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &ConnectionId) -> bool {
        self.state.lock().connections.contains_key(id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Members of a session in join order. Empty if the session is absent.
    pub fn session_members(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.state
            .lock()
            .sessions
            .get(session_id)
            .map(|s| s.members.clone())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    fn record_population(&self, connections: usize, sessions: usize) {
        self.metrics
            .set_gauge(CONNECTIONS_ACTIVE, &[], connections as i64);
        self.metrics.set_gauge(SESSIONS_ACTIVE, &[], sessions as i64);
    }
}
