pub mod envelope;
pub mod errors;
pub mod fake_data;
pub mod generators;
pub mod ids;
pub mod protocol;

pub use envelope::Envelope;
pub use errors::ProtocolError;
pub use generators::{EventKind, Generator};
pub use ids::{ConnectionId, SessionId};
pub use protocol::ClientEvent;
