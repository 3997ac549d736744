//! # Error Types
//!
//! Error handling for the SSP host engine.
//!
//! Every failure the engine can report is a variant of [`SspError`], from a
//! port that refuses to open up to a device that answers with a non-OK
//! generic response.
//!
//! ## Error Categories
//! - **Transport**: port open/read/write failures, fatal to the session
//! - **Framing**: reply timeouts and CRC mismatches on plain frames
//! - **Encryption**: inner CRC or packet-counter faults on encrypted frames
//! - **Device**: non-OK status bytes, unsupported protocol versions or unit types
//! - **Configuration**: invalid or unreadable settings
//!
//! ## Example Usage
//! ```rust
//! use ssp_protocol::error::{Result, SspError};
//! use tracing::{error, info};
//!
//! fn check_address(address: u8) -> Result<u8> {
//!     if address > 0x7F {
//!         return Err(SspError::ConfigError(format!("address {address:#04x} out of range")));
//!     }
//!     Ok(address)
//! }
//!
//! match check_address(0x10) {
//!     Ok(addr) => info!(addr, "Address accepted"),
//!     Err(e) => error!(error = %e, "Bad address"),
//! }
//! ```

use crate::protocol::command::ResponseStatus;
use crate::service::device::UnitType;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Transport errors
    pub const ERR_PORT_NOT_OPEN: &str = "Serial port is not open";
    pub const ERR_READER_STOPPED: &str = "Background reader stopped";

    /// Handshake errors
    pub const ERR_SYNC_FAILED: &str = "Sync command was not accepted";
    pub const ERR_GENERATOR_REJECTED: &str = "Device rejected the generator";
    pub const ERR_MODULUS_REJECTED: &str = "Device rejected the modulus";
    pub const ERR_KEY_EXCHANGE_REJECTED: &str = "Device rejected the key exchange";
    pub const ERR_SHORT_KEY_EXCHANGE: &str = "Key exchange reply is shorter than 9 bytes";
    pub const ERR_ZERO_PRIME: &str = "Generator or modulus is zero";

    /// Encrypted frame errors
    pub const ERR_CIPHERTEXT_ALIGNMENT: &str = "Ciphertext length is not a multiple of 16";
    pub const ERR_ENVELOPE_LENGTH: &str = "Encrypted envelope declares more data than it holds";

    /// Response decoding errors
    pub const ERR_EMPTY_RESPONSE: &str = "Response carries no status byte";
    pub const ERR_SHORT_SETUP: &str = "Setup request reply is truncated";
}

/// Reason an encrypted frame was rejected after the outer CRC passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedFault {
    /// The CRC inside the decrypted block did not match
    CrcMismatch,
    /// The packet counter inside the block differs from the host's expectation
    CounterMismatch { expected: u32, actual: u32 },
    /// The block could not be unwrapped at all
    Malformed(String),
}

impl std::fmt::Display for EncryptedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CrcMismatch => write!(f, "inner CRC mismatch"),
            Self::CounterMismatch { expected, actual } => {
                write!(f, "packet counter mismatch (expected {expected}, got {actual})")
            }
            Self::Malformed(reason) => write!(f, "malformed envelope: {reason}"),
        }
    }
}

/// SspError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum SspError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serial port is not open")]
    PortClosed,

    #[error("No reply after {attempts} attempt(s)")]
    Timeout { attempts: u8 },

    #[error("Frame CRC mismatch (expected {expected:#06x}, got {actual:#06x})")]
    FrameError { expected: u16, actual: u16 },

    #[error("Encrypted frame rejected: {0}")]
    EncryptedFrame(EncryptedFault),

    #[error("Device responded {0}")]
    DeviceStatus(ResponseStatus),

    #[error("Unsupported protocol version: {0} (minimum 6)")]
    UnsupportedProtocolVersion(u8),

    #[error("Unsupported unit type: {0}")]
    UnsupportedUnitType(UnitType),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Encryption requested before a key was negotiated")]
    KeyNotNegotiated,

    #[error("Command too long: {0} bytes")]
    CommandTooLong(usize),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Device is not running")]
    NotRunning,
}

impl SspError {
    /// Whether the session must be torn down and renegotiated after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Transport(_)
                | Self::PortClosed
                | Self::HandshakeFailed(_)
                | Self::UnsupportedProtocolVersion(_)
                | Self::UnsupportedUnitType(_)
                | Self::LockPoisoned
        )
    }

    /// Whether the framer's local retry policy applies to this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::EncryptedFrame(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for SspError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SspError::LockPoisoned
    }
}

/// Type alias for Results using SspError
pub type Result<T> = std::result::Result<T, SspError>;
