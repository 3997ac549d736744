//! Byte-stream reassembly of SSP frames.
//!
//! The serial line delivers bytes one at a time with no framing beyond STX
//! and the length byte. [`SspCodec`] feeds them through a small state machine
//! that collapses stuffed STX pairs, restarts on an unpaired STX, and checks
//! the address and CRC once the declared length has arrived.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::crc::crc16;
use crate::core::packet::{Frame, ADDRESS_MASK, FRAME_OVERHEAD, MAX_DATA_LEN, STX};
use crate::error::{Result, SspError};

/// What the reassembler produced from a completed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Address matched and CRC valid
    Frame(Frame),
    /// Address matched but the CRC did not
    CrcMismatch { expected: u16, actual: u16 },
}

/// Reassembler state for a single device address
#[derive(Debug, Clone)]
pub struct SspCodec {
    address: u8,
    buf: Vec<u8>,
    expected_len: Option<usize>,
    pending_stx: bool,
}

impl SspCodec {
    pub fn new(address: u8) -> Self {
        Self {
            address: address & ADDRESS_MASK,
            buf: Vec::with_capacity(MAX_DATA_LEN + FRAME_OVERHEAD),
            expected_len: None,
            pending_stx: false,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected_len = None;
        self.pending_stx = false;
    }

    /// Feed one byte; returns an event when a frame for our address completes
    pub fn push(&mut self, byte: u8) -> Option<Inbound> {
        if self.buf.is_empty() {
            // Idle: wait for a frame start, discard line noise
            if byte == STX {
                self.buf.push(STX);
            }
            return None;
        }

        if self.pending_stx {
            self.pending_stx = false;
            if byte == STX {
                self.append(STX);
            } else {
                // Unpaired STX: a new frame started mid-stream
                trace!("Resynchronising on unstuffed STX");
                self.buf.clear();
                self.expected_len = None;
                self.buf.push(STX);
                self.append(byte);
            }
        } else if byte == STX {
            self.pending_stx = true;
            return None;
        } else {
            self.append(byte);
        }

        if Some(self.buf.len()) == self.expected_len {
            let event = self.complete();
            self.reset();
            return event;
        }
        None
    }

    fn append(&mut self, byte: u8) {
        self.buf.push(byte);
        if self.buf.len() == 3 {
            self.expected_len = Some(usize::from(byte) + FRAME_OVERHEAD);
        }
    }

    fn complete(&self) -> Option<Inbound> {
        let raw = &self.buf;
        if raw[1] & ADDRESS_MASK != self.address {
            trace!(address = raw[1] & ADDRESS_MASK, "Ignoring frame for another address");
            return None;
        }

        let body_end = raw.len() - 2;
        let expected = crc16(&raw[1..body_end]);
        let actual = u16::from_le_bytes([raw[body_end], raw[body_end + 1]]);
        if expected != actual {
            return Some(Inbound::CrcMismatch { expected, actual });
        }

        Some(Inbound::Frame(Frame {
            address_byte: raw[1],
            data: raw[3..body_end].to_vec(),
        }))
    }
}

impl Decoder for SspCodec {
    type Item = Inbound;
    type Error = SspError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(event) = self.push(byte) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

impl Encoder<Frame> for SspCodec {
    type Error = SspError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let wire = frame.to_wire()?;
        dst.reserve(wire.len());
        dst.put_slice(&wire);
        Ok(())
    }
}
