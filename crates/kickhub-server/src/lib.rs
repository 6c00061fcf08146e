//! Session-aware Pusher-style event hub.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `hub` | Connection registry and session index, non-blocking delivery |
//! | `session` | Per-session emission rate and emitter toggles |
//! | `emitter` | Periodic background tasks that fire synthetic events |
//! | `dispatch` | Prefix matching and fan-out to one session or everyone |
//! | `connection` | Per-connection mailbox plus socket reader/writer loops |
//! | `handler` | Inbound frame routing |
//! | `server` | Axum router, `/ws` upgrade, health and metrics endpoints |

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod emitter;
pub mod errors;
pub mod handler;
pub mod hub;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use dispatch::Scope;
pub use emitter::EmitterKind;
pub use errors::{HubError, ServerError};
pub use hub::Hub;
pub use server::{build_router, start, AppState, ServerHandle};
pub use session::EmissionRate;
