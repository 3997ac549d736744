//! # Transport Layer
//!
//! The serial boundary and the framer built on top of it.
//!
//! ## Components
//! - [`SerialTransport`]: abstract byte-stream port supplied by the host
//!   (open, close, bytes available, read a byte, write)
//! - [`reader`]: background task draining the port into the frame reassembler
//! - [`connection`]: one-command-at-a-time exchange engine with sequence bit,
//!   retries and optional encryption
//!
//! The engine never enumerates or guesses ports; whoever owns the hardware
//! hands in a transport and the settings to open it with.

pub mod connection;
pub mod reader;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use connection::SspConnection;

/// Port settings SSP devices expect: 9600 baud, 8 data bits, no parity, 2 stop bits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Platform port name (e.g. `/dev/ttyUSB0`, `COM3`)
    pub name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::Two,
        }
    }
}

impl SerialSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("unsupported data bits: {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("unsupported stop bits: {other}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} {} {}{}{}",
            self.name,
            self.baud_rate,
            u8::from(self.data_bits),
            parity,
            u8::from(self.stop_bits)
        )
    }
}

/// Byte-stream port consumed by the engine.
///
/// Implementations wrap a real serial port (or a simulator). Calls are
/// short and non-blocking: `read_byte` is only invoked after
/// `bytes_available` reported data.
pub trait SerialTransport: Send {
    fn open(&mut self, settings: &SerialSettings) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> Result<usize>;

    fn read_byte(&mut self) -> Result<u8>;

    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drain everything currently available into `buf`
    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let available = self.bytes_available()?;
        buf.reserve(available);
        for _ in 0..available {
            buf.push(self.read_byte()?);
        }
        Ok(available)
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn open(&mut self, settings: &SerialSettings) -> Result<()> {
        (**self).open(settings)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        (**self).read_available(buf)
    }
}

/// Transport shared between the reader task and the command path
pub type SharedTransport = Arc<Mutex<dyn SerialTransport>>;

/// Wrap a transport for use by [`SspConnection`]
pub fn shared<T: SerialTransport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}
