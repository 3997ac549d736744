//! # Core Protocol Components
//!
//! Low-level frame handling for the SSP wire format.
//!
//! ## Components
//! - **CRC**: CRC16 (poly 0x8005, seed 0xFFFF) over everything after STX
//! - **Packet**: frame layout, byte-stuffing and validation
//! - **Codec**: byte-by-byte reassembler usable as a tokio-util codec
//! - **Envelope**: AES-wrapped payload with packet counter and inner CRC
//!
//! ## Wire Format
//! ```text
//! [STX 0x7F] [Address|Seq(1)] [Length(1)] [Data(N)] [CRC lo] [CRC hi]
//! ```
//!
//! Encrypted frames carry `STEX(0x7E) | ciphertext` as their data block.

pub mod codec;
pub mod crc;
pub mod envelope;
pub mod packet;
