//! roomctl Server
//!
//! HTTP API over the device service, plus a realtime WebSocket channel that
//! pushes a full snapshot on connect and every change after it.
//!
//! The server owns no device logic. Routes translate requests into
//! [`DeviceService`](roomctl_state::DeviceService) calls, and the
//! [`Broadcaster`] turns the service's events into realtime messages.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod ws;

pub use broadcaster::{spawn_event_bridge, Broadcaster, DEFAULT_SUBSCRIBER_BUFFER};
pub use config::ServerConfig;
pub use error::{handle_rejection, ApiError, ServerError};
pub use routes::{routes, AppState};
pub use server::RoomServer;
