/// Why an inbound frame was rejected. The frame is dropped; the connection stays up.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("`event` is missing or not a string")]
    MissingEvent,

    #[error("`{event}` requires `data` to be an object")]
    DataNotAnObject { event: String },

    #[error("`{event}` requires `data.{field}` ({expected})")]
    MissingField {
        event: String,
        field: &'static str,
        expected: &'static str,
    },
}

impl ProtocolError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingEvent => "missing_event",
            Self::DataNotAnObject { .. } => "data_not_an_object",
            Self::MissingField { .. } => "missing_field",
        }
    }
}
