//! Per-session controller: subscriptions, emission rate and emitter toggles.

use std::time::Duration;

use kickhub_core::{ConnectionId, Envelope, SessionId};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::emitter::{Emitter, EmitterKind};
use crate::errors::HubError;
use crate::hub::Hub;

pub const MIN_RATE: f64 = 1.0;
pub const MAX_RATE: f64 = 1000.0;

/// Events per second for a session's emitters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmissionRate(f64);

impl EmissionRate {
    /// Rates below one per second (and non-finite values) are rejected, not clamped.
    pub fn new(per_second: f64) -> Result<Self, HubError> {
        if per_second.is_finite() && (MIN_RATE..=MAX_RATE).contains(&per_second) {
            Ok(Self(per_second))
        } else {
            Err(HubError::InvalidRate(per_second))
        }
    }

    pub fn per_second(self) -> f64 {
        self.0
    }

    /// Tick period, `1 / rate` seconds.
    pub fn period(self) -> Duration {
        Duration::from_secs_f64(1.0 / self.0)
    }
}

impl Default for EmissionRate {
    fn default() -> Self {
        Self(MIN_RATE)
    }
}

/// Everything the hub tracks for one active session.
pub(crate) struct SessionState {
    pub(crate) members: Vec<ConnectionId>,
    pub(crate) rate: EmissionRate,
    pub(crate) chat: Option<Emitter>,
    pub(crate) all_events: Option<Emitter>,
}

impl SessionState {
    pub(crate) fn new(rate: EmissionRate) -> Self {
        Self {
            members: Vec::new(),
            rate,
            chat: None,
            all_events: None,
        }
    }

    fn slot(&mut self, kind: EmitterKind) -> &mut Option<Emitter> {
        match kind {
            EmitterKind::Chat => &mut self.chat,
            EmitterKind::AllEvents => &mut self.all_events,
        }
    }

    fn is_running(&self, kind: EmitterKind) -> bool {
        match kind {
            EmitterKind::Chat => self.chat.is_some(),
            EmitterKind::AllEvents => self.all_events.is_some(),
        }
    }
}

impl Hub {
    /// Record the subscription and acknowledge it on the connection's own mailbox.
    pub fn subscribe(&self, conn: &Connection, channel: &str) {
        let added = conn.subscribe(channel);
        debug!(connection_id = %conn.id, channel, added, "subscribe");
        self.deliver(conn, &Envelope::subscription_succeeded(channel));
    }

    pub fn unsubscribe(&self, conn: &Connection, channel: &str) -> bool {
        let removed = conn.unsubscribe(channel);
        debug!(connection_id = %conn.id, channel, removed, "unsubscribe");
        removed
    }

    /// Change a session's rate and restart its running emitters at the new period.
    ///
    /// Running emitters keep running; their phase restarts from now.
    pub fn set_rate(&self, session_id: &SessionId, per_second: f64) -> Result<EmissionRate, HubError> {
        let rate = EmissionRate::new(per_second)?;
        let mut state = self.state.lock();
        let Some(session) = state.sessions.get_mut(session_id) else {
            warn!(session_id = %session_id, "rate change for unknown session");
            return Ok(rate);
        };
        session.rate = rate;
        for kind in EmitterKind::ALL {
            let slot = session.slot(kind);
            if slot.is_some() {
                // Assigning drops, and so cancels, the old emitter.
                *slot = Some(Emitter::spawn(
                    self.self_ref.clone(),
                    session_id.clone(),
                    kind,
                    rate.period(),
                ));
            }
        }
        info!(session_id = %session_id, rate = rate.per_second(), "message rate set");
        Ok(rate)
    }

    /// Start the chat emitter if absent, stop it if present. Returns whether it now runs.
    pub fn toggle_chat_emitter(&self, session_id: &SessionId) -> bool {
        self.toggle_emitter(session_id, EmitterKind::Chat)
    }

    /// Start the all-events emitter if absent, stop it if present. Returns whether it now runs.
    pub fn toggle_all_events_emitter(&self, session_id: &SessionId) -> bool {
        self.toggle_emitter(session_id, EmitterKind::AllEvents)
    }

    fn toggle_emitter(&self, session_id: &SessionId, kind: EmitterKind) -> bool {
        let mut state = self.state.lock();
        let Some(session) = state.sessions.get_mut(session_id) else {
            warn!(session_id = %session_id, emitter = %kind, "toggle for unknown session");
            return false;
        };
        let period = session.rate.period();
        let slot = session.slot(kind);
        let running = match slot.take() {
            Some(emitter) => {
                drop(emitter);
                false
            }
            None => {
                *slot = Some(Emitter::spawn(
                    self.self_ref.clone(),
                    session_id.clone(),
                    kind,
                    period,
                ));
                true
            }
        };
        info!(session_id = %session_id, emitter = %kind, running, "emitter toggled");
        running
    }

    pub fn emitter_running(&self, session_id: &SessionId, kind: EmitterKind) -> bool {
        self.state
            .lock()
            .sessions
            .get(session_id)
            .is_some_and(|s| s.is_running(kind))
    }

    /// 0, 1 or 2.
    pub fn active_emitters(&self, session_id: &SessionId) -> usize {
        EmitterKind::ALL
            .into_iter()
            .filter(|k| self.emitter_running(session_id, *k))
            .count()
    }

    pub fn session_rate(&self, session_id: &SessionId) -> Option<EmissionRate> {
        self.state.lock().sessions.get(session_id).map(|s| s.rate)
    }
}
