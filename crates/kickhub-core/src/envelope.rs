//! Outbound wire envelope.
//!
//! `data` is itself a JSON document serialized to a string. Pusher clients
//! decode it a second time, so the double encoding is part of the wire format.

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, SessionId};

pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const PONG: &str = "pusher:pong";

const EMPTY_DATA: &str = "{}";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: String,
    pub channel: String,
}

#[derive(Serialize)]
struct ConnectionEstablished<'a> {
    socket_id: &'a str,
    activity_timeout: u64,
    session_id: &'a str,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            channel: channel.into(),
        }
    }

    /// Build an envelope whose `data` is the JSON encoding of `payload`.
    pub fn with_payload<T: Serialize>(event: &str, channel: &str, payload: &T) -> Self {
        let data = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(event, channel, error = %e, "failed to encode payload");
                EMPTY_DATA.to_string()
            }
        };
        Self::new(event, data, channel)
    }

    pub fn connection_established(
        socket_id: &ConnectionId,
        activity_timeout: u64,
        session_id: &SessionId,
    ) -> Self {
        let payload = ConnectionEstablished {
            socket_id: socket_id.as_str(),
            activity_timeout,
            session_id: session_id.as_str(),
        };
        Self::with_payload(CONNECTION_ESTABLISHED, "", &payload)
    }

    pub fn subscription_succeeded(channel: &str) -> Self {
        Self::new(SUBSCRIPTION_SUCCEEDED, EMPTY_DATA, channel)
    }

    pub fn pong() -> Self {
        Self::new(PONG, EMPTY_DATA, "")
    }

    /// Serialize to the text frame written on the transport.
    pub fn to_frame(&self) -> String {
        // A struct of three strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}
