//! roomctl Client
//!
//! Keeps a local copy of a roomctl server's device list.
//!
//! - [`ClientCache`]: id to device map with a `watch` channel of changes
//! - [`RealtimeClient`]: push path, a WebSocket subscriber that reconnects
//!   every 3 seconds until shut down
//! - [`fetch_devices`] / [`sync_cache`]: pull path over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roomctl_client::{ClientCache, RealtimeClient};
//!
//! let cache = Arc::new(ClientCache::new());
//! let client = RealtimeClient::connect("ws://127.0.0.1:5050/ws", cache.clone());
//! // ...
//! client.shutdown().await;
//! ```

pub mod cache;
pub mod error;
pub mod fetch;
pub mod realtime;

pub use cache::ClientCache;
pub use error::{ClientError, Result};
pub use fetch::{fetch_devices, sync_cache};
pub use realtime::{RealtimeClient, RECONNECT_DELAY};
