//! Timing constants shared by the reader, the exchange engine and the
//! controller.

use std::time::Duration;

/// How long the framer waits for a reply to one transmission
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Interval at which the background reader drains the transport
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Period of the device poll loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause between connection attempts
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for joining the reader task on close
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
