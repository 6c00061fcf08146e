//! Inbound client frames: `{event: string, data: object}`.

use serde_json::{Map, Value};

use crate::errors::ProtocolError;

/// A parsed inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
    SetMessageRate { rate: f64 },
    TriggerEvent { kind: String },
    ToggleChatInterval,
    ToggleAllEventsInterval,
    /// Well-formed frame with an event name this server does not handle.
    Unknown { event: String },
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(frame)?;
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let event = obj
            .get("event")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingEvent)?;
        let data = obj.get("data");

        let parsed = match event {
            "pusher:subscribe" | "subscribe" => Self::Subscribe {
                channel: require_str(event, data, "channel")?.to_string(),
            },
            "pusher:unsubscribe" | "unsubscribe" => Self::Unsubscribe {
                channel: require_str(event, data, "channel")?.to_string(),
            },
            "pusher:ping" => Self::Ping,
            "set_message_rate" => Self::SetMessageRate {
                rate: require_f64(event, data, "rate")?,
            },
            "trigger_event" => Self::TriggerEvent {
                kind: require_str(event, data, "type")?.to_string(),
            },
            "toggle_chat_interval" => Self::ToggleChatInterval,
            "toggle_all_events_interval" => Self::ToggleAllEventsInterval,
            other => Self::Unknown {
                event: other.to_string(),
            },
        };
        Ok(parsed)
    }

    /// Event name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Subscribe { .. } => "pusher:subscribe",
            Self::Unsubscribe { .. } => "pusher:unsubscribe",
            Self::Ping => "pusher:ping",
            Self::SetMessageRate { .. } => "set_message_rate",
            Self::TriggerEvent { .. } => "trigger_event",
            Self::ToggleChatInterval => "toggle_chat_interval",
            Self::ToggleAllEventsInterval => "toggle_all_events_interval",
            Self::Unknown { event } => event,
        }
    }
}

fn data_object<'a>(
    event: &str,
    data: Option<&'a Value>,
) -> Result<&'a Map<String, Value>, ProtocolError> {
    data.and_then(Value::as_object)
        .ok_or_else(|| ProtocolError::DataNotAnObject {
            event: event.to_string(),
        })
}

fn require_str<'a>(
    event: &str,
    data: Option<&'a Value>,
    field: &'static str,
) -> Result<&'a str, ProtocolError> {
    data_object(event, data)?
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MissingField {
            event: event.to_string(),
            field,
            expected: "string",
        })
}

fn require_f64(event: &str, data: Option<&Value>, field: &'static str) -> Result<f64, ProtocolError> {
    data_object(event, data)?
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ProtocolError::MissingField {
            event: event.to_string(),
            field,
            expected: "number",
        })
}
