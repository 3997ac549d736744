//! SSP frame layout and byte-stuffing.
//!
//! ```text
//! [STX 0x7F] [address | seq] [length] [data ...] [crc lo] [crc hi]
//! ```
//!
//! The CRC covers every byte after STX. On the wire any 0x7F after the first
//! byte is doubled; the receiver collapses the pair back into one byte.

use crate::core::crc::crc16;
use crate::error::{Result, SspError};

/// Frame start marker
pub const STX: u8 = 0x7F;

/// First data byte of an encrypted frame
pub const STEX: u8 = 0x7E;

/// Sequence flag in the address byte
pub const SEQ_FLAG: u8 = 0x80;

/// Mask extracting the device address from the address byte
pub const ADDRESS_MASK: u8 = 0x7F;

/// Largest data block a frame can carry (length is a single byte)
pub const MAX_DATA_LEN: usize = 255;

/// STX + address + length + CRC
pub const FRAME_OVERHEAD: usize = 5;

/// A validated, unstuffed SSP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Address byte including the sequence flag
    pub address_byte: u8,
    /// Data block (what the length byte counts)
    pub data: Vec<u8>,
}

impl Frame {
    /// Build a frame for `address` with the given sequence flag
    pub fn new(address: u8, seq: u8, data: Vec<u8>) -> Self {
        Self {
            address_byte: (address & ADDRESS_MASK) | (seq & SEQ_FLAG),
            data,
        }
    }

    /// Device address without the sequence flag
    #[inline]
    pub fn address(&self) -> u8 {
        self.address_byte & ADDRESS_MASK
    }

    /// Sequence flag (0x00 or 0x80)
    #[inline]
    pub fn sequence(&self) -> u8 {
        self.address_byte & SEQ_FLAG
    }

    /// Whether the data block is an encrypted envelope
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.data.first() == Some(&STEX)
    }

    /// Serialize to the raw (unstuffed) wire layout with CRC
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(SspError::CommandTooLong(self.data.len()));
        }

        let mut out = Vec::with_capacity(self.data.len() + FRAME_OVERHEAD);
        out.push(STX);
        out.push(self.address_byte);
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        let crc = crc16(&out[1..]);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }

    /// Serialize and byte-stuff, ready for the transport
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        Ok(stuff(&self.to_bytes()?))
    }

    /// Parse a raw (already unstuffed) frame, checking length and CRC
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < FRAME_OVERHEAD || raw[0] != STX {
            return Err(SspError::MalformedResponse(format!(
                "frame of {} bytes has no valid header",
                raw.len()
            )));
        }

        let length = raw[2] as usize;
        if raw.len() != length + FRAME_OVERHEAD {
            return Err(SspError::MalformedResponse(format!(
                "length byte says {length}, frame carries {}",
                raw.len() - FRAME_OVERHEAD
            )));
        }

        let body_end = 3 + length;
        let expected = crc16(&raw[1..body_end]);
        let actual = u16::from_le_bytes([raw[body_end], raw[body_end + 1]]);
        if expected != actual {
            return Err(SspError::FrameError { expected, actual });
        }

        Ok(Self {
            address_byte: raw[1],
            data: raw[3..body_end].to_vec(),
        })
    }
}

/// Double every STX after the first byte
pub fn stuff(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 4);
    let mut bytes = raw.iter();
    if let Some(&first) = bytes.next() {
        out.push(first);
    }
    for &b in bytes {
        out.push(b);
        if b == STX {
            out.push(STX);
        }
    }
    out
}

/// Collapse doubled STX bytes after the first byte
pub fn unstuff(wire: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire.len());
    let mut bytes = wire.iter().peekable();
    if let Some(&first) = bytes.next() {
        out.push(first);
    }
    while let Some(&b) = bytes.next() {
        out.push(b);
        if b == STX && bytes.peek() == Some(&&STX) {
            bytes.next();
        }
    }
    out
}
