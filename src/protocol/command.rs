//! Request builder and generic response interpretation.
//!
//! A [`Command`] owns its opcode and parameter block; nothing is shared
//! between exchanges. Session settings (address, sequence bit, timeout,
//! retry budget) live on the connection, not here.

use std::fmt;

use crate::error::{constants, Result, SspError};
use crate::protocol::codes::{command as op, response};

/// Largest plain command the frame length byte can describe
pub const MAX_COMMAND_LEN: usize = 255;

/// One SSP request: opcode followed by a parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: u8,
    params: Vec<u8>,
}

impl Command {
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            params: Vec::new(),
        }
    }

    pub fn sync() -> Self {
        Self::new(op::SYNC)
    }

    pub fn poll() -> Self {
        Self::new(op::POLL)
    }

    /// Append a single byte
    pub fn with_u8(mut self, value: u8) -> Self {
        self.params.push(value);
        self
    }

    /// Append a 16-bit value, little-endian
    pub fn with_u16(mut self, value: u16) -> Self {
        self.params.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a 32-bit value, little-endian
    pub fn with_u32(mut self, value: u32) -> Self {
        self.params.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a 64-bit value, little-endian
    pub fn with_u64(mut self, value: u64) -> Self {
        self.params.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn with_bytes(mut self, bytes: &[u8]) -> Self {
        self.params.extend_from_slice(bytes);
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.params.extend_from_slice(&currency.0);
        self
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    #[inline]
    pub fn parameters(&self) -> &[u8] {
        &self.params
    }

    /// Opcode plus parameters
    #[inline]
    pub fn len(&self) -> usize {
        1 + self.params.len()
    }

    /// Always false; a command carries at least its opcode
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn is_sync(&self) -> bool {
        self.opcode == op::SYNC
    }

    /// Data block as it goes into a frame (before any encryption)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.len() > MAX_COMMAND_LEN {
            return Err(SspError::CommandTooLong(self.len()));
        }
        let mut out = Vec::with_capacity(self.len());
        out.push(self.opcode);
        out.extend_from_slice(&self.params);
        Ok(out)
    }
}

/// Three-letter ISO currency code as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Currency(pub [u8; 3]);

impl Currency {
    pub fn new(code: &str) -> Result<Self> {
        match code.as_bytes() {
            &[a, b, c] if code.is_ascii() => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(SspError::ConfigError(format!(
                "currency code {code:?} is not three ASCII letters"
            ))),
        }
    }

    /// Read a code from the first three bytes of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b, c, ..] => Some(Self([*a, *b, *c])),
            _ => None,
        }
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Generic status carried in the first byte of every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    CommandNotKnown,
    WrongParameterCount,
    ParameterOutOfRange,
    /// Sub-reason byte when the device supplied one
    CannotProcess { reason: Option<u8> },
    SoftwareError,
    Fail,
    KeyNotSet,
    Unknown(u8),
}

impl ResponseStatus {
    /// Interpret a reply's data block (status byte plus optional sub-reason)
    pub fn from_response(data: &[u8]) -> Option<Self> {
        let (&code, rest) = data.split_first()?;
        Some(match code {
            response::OK => Self::Ok,
            response::COMMAND_NOT_KNOWN => Self::CommandNotKnown,
            response::WRONG_NO_PARAMETERS => Self::WrongParameterCount,
            response::PARAMETER_OUT_OF_RANGE => Self::ParameterOutOfRange,
            response::COMMAND_CANNOT_BE_PROCESSED => Self::CannotProcess {
                reason: rest.first().copied(),
            },
            response::SOFTWARE_ERROR => Self::SoftwareError,
            response::FAIL => Self::Fail,
            response::KEY_NOT_SET => Self::KeyNotSet,
            other => Self::Unknown(other),
        })
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => response::OK,
            Self::CommandNotKnown => response::COMMAND_NOT_KNOWN,
            Self::WrongParameterCount => response::WRONG_NO_PARAMETERS,
            Self::ParameterOutOfRange => response::PARAMETER_OUT_OF_RANGE,
            Self::CannotProcess { .. } => response::COMMAND_CANNOT_BE_PROCESSED,
            Self::SoftwareError => response::SOFTWARE_ERROR,
            Self::Fail => response::FAIL,
            Self::KeyNotSet => response::KEY_NOT_SET,
            Self::Unknown(code) => *code,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::CannotProcess {
                reason: Some(response::BUSY)
            }
        )
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::CommandNotKnown => f.write_str("command not known"),
            Self::WrongParameterCount => f.write_str("wrong number of parameters"),
            Self::ParameterOutOfRange => f.write_str("parameter out of range"),
            Self::CannotProcess { reason: Some(response::BUSY) } => {
                f.write_str("command cannot be processed (busy)")
            }
            Self::CannotProcess { reason: Some(r) } => {
                write!(f, "command cannot be processed (reason {r:#04x})")
            }
            Self::CannotProcess { reason: None } => f.write_str("command cannot be processed"),
            Self::SoftwareError => f.write_str("software error"),
            Self::Fail => f.write_str("fail"),
            Self::KeyNotSet => f.write_str("key not set"),
            Self::Unknown(code) => write!(f, "unrecognised status {code:#04x}"),
        }
    }
}

/// Reply to one exchange, decrypted and unwrapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    status: ResponseStatus,
    data: Vec<u8>,
}

impl ResponseFrame {
    /// Wrap a reply data block; the first byte is the status
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        let status = ResponseStatus::from_response(&data)
            .ok_or_else(|| SspError::MalformedResponse(constants::ERR_EMPTY_RESPONSE.to_string()))?;
        Ok(Self { status, data })
    }

    #[inline]
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    #[inline]
    pub fn status_code(&self) -> u8 {
        self.data[0]
    }

    /// Bytes after the status byte
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[1..]
    }

    /// Full data block, status included
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length byte as it appeared in the (unwrapped) frame
    #[inline]
    pub fn raw_length(&self) -> u8 {
        self.data.len() as u8
    }

    /// Fail with [`SspError::DeviceStatus`] unless the status is OK
    pub fn check(self) -> Result<Self> {
        if self.status.is_ok() {
            Ok(self)
        } else {
            Err(SspError::DeviceStatus(self.status))
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
