//! MDC (Multiple Display Control) protocol support.
//!
//! This crate knows how to frame commands for commercial displays and how to
//! carry them over a short-lived TCP session. It has no notion of devices,
//! registries or categories; those live in the driver layer.
//!
//! # Example
//!
//! ```no_run
//! use mdc::{MdcClient, PowerState};
//!
//! # async fn run() -> mdc::Result<()> {
//! let display = MdcClient::new("192.168.1.40").with_display_id(0);
//! display.power_on().await?;
//! if display.query_power().await? == PowerState::On {
//!     println!("display is on");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod frame;

pub use client::{MdcClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{MdcError, ProtocolError, Result};
pub use frame::{checksum, encode, Frame, PowerState, Reply};
