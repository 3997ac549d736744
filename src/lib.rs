//! # ssp-protocol
//!
//! Host-side engine for the secure serial protocol (SSP) spoken by banknote
//! validators and payout units.
//!
//! ## Layers
//! - [`core`]: CRC16, frame layout, byte-stuffing, reassembly and the
//!   encrypted envelope
//! - [`protocol`]: commands, generic status codes, key negotiation and the
//!   poll event parser
//! - [`transport`]: the serial boundary, the background reader and the
//!   one-exchange-at-a-time [`SspConnection`]
//! - [`service`]: the payout unit as a typed API and the `start`/`halt`/`tick`
//!   controller a host drives
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use ssp_protocol::config::SspConfig;
//! use ssp_protocol::service::{Controller, TracingSink};
//! use ssp_protocol::transport::{self, SerialTransport};
//!
//! # async fn run<P: SerialTransport + 'static>(port: P) -> ssp_protocol::Result<()> {
//! let config = SspConfig::from_file("ssp.toml")?;
//! let mut controller = Controller::new(
//!     transport::shared(port),
//!     config,
//!     Arc::new(TracingSink),
//!     Arc::new(TracingSink),
//! );
//! controller.start().await?;
//! controller.spawn_poll_loop()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::SspConfig;
pub use error::{Result, SspError};
pub use protocol::command::{Command, Currency, ResponseFrame, ResponseStatus};
pub use protocol::events::PollEvent;
pub use service::{Controller, LogSink, PayoutDevice, SerialNumberSink};
pub use transport::{SerialSettings, SerialTransport, SspConnection};
