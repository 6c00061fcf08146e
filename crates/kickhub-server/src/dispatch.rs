//! Prefix-matched fan-out of generated events.

use std::sync::Arc;

use kickhub_core::{EventKind, Generator, SessionId};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::hub::Hub;

/// Which connections a dispatch may reach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Session(SessionId),
}

impl Hub {
    /// Fire a one-shot event by its `trigger_event` token.
    ///
    /// Unknown tokens are logged and deliver nothing.
    pub fn trigger(&self, token: &str, scope: &Scope) -> usize {
        let kind: EventKind = match token.parse() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(token, error = %e, "ignoring trigger");
                return 0;
            }
        };
        let delivered = self.dispatch(kind.channel_prefix(), kind.generator(), scope);
        debug!(event_type = %kind, ?scope, delivered, "event triggered");
        delivered
    }

    /// Generate one envelope per subscribed channel starting with `prefix`
    /// and deliver it to the subscriber. Returns the number queued.
    ///
    /// Targets are snapshotted under the registry lock; generation and
    /// delivery happen after it is released.
    pub fn dispatch(&self, prefix: &str, generator: Generator, scope: &Scope) -> usize {
        let mut delivered = 0;
        for conn in self.connections_in(scope) {
            for channel in conn.matching_channels(prefix) {
                if !self.deliver(&conn, &generator(&channel)) {
                    // Shed or closed; nothing more reaches it.
                    break;
                }
                delivered += 1;
            }
        }
        delivered
    }

    /// Connections in scope, ordered by id.
    fn connections_in(&self, scope: &Scope) -> Vec<Arc<Connection>> {
        let state = self.state.lock();
        let mut targets: Vec<Arc<Connection>> = match scope {
            Scope::All => state.connections.values().cloned().collect(),
            Scope::Session(id) => state
                .sessions
                .get(id)
                .map(|s| {
                    s.members
                        .iter()
                        .filter_map(|m| state.connections.get(m).cloned())
                        .collect()
                })
                .unwrap_or_default(),
        };
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        targets
    }
}
