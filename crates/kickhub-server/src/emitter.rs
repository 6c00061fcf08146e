//! Periodic synthetic-event tasks, at most one of each kind per session.

use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use kickhub_core::generators::{self, CHANNEL_PREFIX, CHATROOM_PREFIX};
use kickhub_core::SessionId;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::dispatch::Scope;
use crate::hub::Hub;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmitterKind {
    /// One chat message per tick to `chatroom` subscriptions.
    Chat,
    /// One random event per tick to `chatroom` and `channel` subscriptions.
    AllEvents,
}

impl EmitterKind {
    pub const ALL: [EmitterKind; 2] = [Self::Chat, Self::AllEvents];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::AllEvents => "all_events",
        }
    }
}

impl fmt::Display for EmitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running emitter task. Dropping it cancels the task.
pub(crate) struct Emitter {
    cancel: CancellationToken,
    /// Detached on drop; the token stops the loop.
    _task: JoinHandle<()>,
}

impl Emitter {
    /// Start ticking every `period`, first tick one period from now.
    pub(crate) fn spawn(
        hub: Weak<Hub>,
        session_id: SessionId,
        kind: EmitterKind,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(hub, session_id, kind, period, cancel.clone()));
        Self {
            cancel,
            _task: task,
        }
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    hub: Weak<Hub>,
    session_id: SessionId,
    kind: EmitterKind,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(session_id = %session_id, emitter = %kind, ?period, "emitter started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        let Some(hub) = hub.upgrade() else {
            break;
        };
        let delivered = fire(&hub, &session_id, kind);
        trace!(session_id = %session_id, emitter = %kind, delivered, "tick");
    }

    debug!(session_id = %session_id, emitter = %kind, "emitter stopped");
}

fn fire(hub: &Hub, session_id: &SessionId, kind: EmitterKind) -> usize {
    let scope = Scope::Session(session_id.clone());
    match kind {
        EmitterKind::Chat => hub.dispatch(CHATROOM_PREFIX, generators::chat_message, &scope),
        EmitterKind::AllEvents => {
            hub.dispatch(CHATROOM_PREFIX, generators::random_event, &scope)
                + hub.dispatch(CHANNEL_PREFIX, generators::random_event, &scope)
        }
    }
}
