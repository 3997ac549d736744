//! # Service Layer
//!
//! Device-level workflow on top of the exchange engine.
//!
//! - [`device`]: the payout unit as a typed API (setup, channel records,
//!   payout commands, poll dispatch)
//! - [`controller`]: the surface a host application drives: `start()`,
//!   `halt()`, `tick()`, plus the reconnect loop
//!
//! Host-visible text and the serial number leave the engine through the
//! sink traits below. The engine never looks up its host.

pub mod controller;
pub mod device;

use tracing::info;

pub use controller::Controller;
pub use device::PayoutDevice;

/// Receiver for human-readable log lines
pub trait LogSink: Send + Sync {
    fn log(&self, text: &str);
}

/// Receiver for the serial number read during connect
pub trait SerialNumberSink: Send + Sync {
    fn set_serial_number(&self, serial: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, text: &str) {
        self(text)
    }
}

/// Sink that forwards everything to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, text: &str) {
        info!(target: "ssp_protocol::host", "{text}");
    }
}

impl SerialNumberSink for TracingSink {
    fn set_serial_number(&self, serial: &str) {
        info!(target: "ssp_protocol::host", serial, "Serial number");
    }
}
