//! Encrypted envelope carried inside an SSP frame.
//!
//! ```text
//! STEX | AES-ECB( len(1) | counter(4, LE) | data(len) | random padding | crc(2) )
//! ```
//!
//! The encrypted block is always a whole number of AES blocks. Padding fills
//! the gap between the 7 bytes of fixed overhead plus the data and the next
//! multiple of 16.

use rand::Rng;

use crate::core::crc::crc16;
use crate::core::packet::{MAX_DATA_LEN, STEX};
use crate::error::{constants, EncryptedFault, Result, SspError};
use crate::utils::crypto::{Crypto, BLOCK_SIZE};

/// Length byte, counter and CRC
pub const ENVELOPE_OVERHEAD: usize = 7;

/// Largest plaintext that still fits a single frame once wrapped
pub const MAX_SEALED_PAYLOAD: usize =
    (MAX_DATA_LEN - 1) / BLOCK_SIZE * BLOCK_SIZE - ENVELOPE_OVERHEAD;

/// Decrypted contents of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub counter: u32,
    pub data: Vec<u8>,
}

/// Size of the encrypted block for `len` bytes of plaintext
#[inline]
pub fn sealed_block_len(len: usize) -> usize {
    (len + ENVELOPE_OVERHEAD).div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Wrap and encrypt `data` under `counter`, returning `STEX | ciphertext`
pub fn seal(crypto: &Crypto, counter: u32, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_SEALED_PAYLOAD {
        return Err(SspError::CommandTooLong(data.len()));
    }

    let block_len = sealed_block_len(data.len());
    let mut block = Vec::with_capacity(block_len);
    block.push(data.len() as u8);
    block.extend_from_slice(&counter.to_le_bytes());
    block.extend_from_slice(data);

    let mut padding = vec![0u8; block_len - ENVELOPE_OVERHEAD - data.len()];
    rand::rng().fill(padding.as_mut_slice());
    block.extend_from_slice(&padding);

    let crc = crc16(&block);
    block.extend_from_slice(&crc.to_le_bytes());
    crypto.encrypt_in_place(&mut block)?;

    let mut out = Vec::with_capacity(block_len + 1);
    out.push(STEX);
    out.extend_from_slice(&block);
    Ok(out)
}

/// Decrypt and unwrap an envelope (`STEX | ciphertext`)
pub fn open(crypto: &Crypto, envelope: &[u8]) -> Result<Opened> {
    let ciphertext = match envelope.split_first() {
        Some((&STEX, rest)) => rest,
        _ => return Err(malformed("missing STEX marker")),
    };
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(malformed(constants::ERR_CIPHERTEXT_ALIGNMENT));
    }

    let block = crypto.decrypt(ciphertext)?;
    let (body, crc_bytes) = block.split_at(block.len() - 2);
    if crc16(body).to_le_bytes() != [crc_bytes[0], crc_bytes[1]] {
        return Err(SspError::EncryptedFrame(EncryptedFault::CrcMismatch));
    }

    let len = usize::from(block[0]);
    if len + ENVELOPE_OVERHEAD > block.len() {
        return Err(malformed(constants::ERR_ENVELOPE_LENGTH));
    }

    let counter = u32::from_le_bytes([block[1], block[2], block[3], block[4]]);
    Ok(Opened {
        counter,
        data: block[5..5 + len].to_vec(),
    })
}

fn malformed(reason: &str) -> SspError {
    SspError::EncryptedFrame(EncryptedFault::Malformed(reason.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypto() -> Crypto {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&0x0123_4567_0123_4567u64.to_le_bytes());
        key[8..].copy_from_slice(&0x1122_3344u64.to_le_bytes());
        Crypto::new(&key)
    }

    #[test]
    fn test_block_lengths() {
        assert_eq!(sealed_block_len(1), 16);
        assert_eq!(sealed_block_len(9), 16);
        assert_eq!(sealed_block_len(10), 32);
        assert_eq!(MAX_SEALED_PAYLOAD, 233);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let c = crypto();
        let sealed = seal(&c, 42, &[0x07]).unwrap();
        assert_eq!(sealed[0], STEX);
        assert_eq!(sealed.len(), 17);

        let opened = open(&c, &sealed).unwrap();
        assert_eq!(opened.counter, 42);
        assert_eq!(opened.data, vec![0x07]);
    }

    #[test]
    fn test_wrong_key_fails_inner_crc() {
        let sealed = seal(&crypto(), 1, &[0x11, 0x22]).unwrap();
        let other = Crypto::new(&[0xAB; 16]);
        assert!(matches!(
            open(&other, &sealed),
            Err(SspError::EncryptedFrame(EncryptedFault::CrcMismatch))
        ));
    }

    #[test]
    fn test_unaligned_envelope_is_malformed() {
        assert!(matches!(
            open(&crypto(), &[STEX, 1, 2, 3]),
            Err(SspError::EncryptedFrame(EncryptedFault::Malformed(_)))
        ));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        assert!(matches!(
            seal(&crypto(), 0, &[0u8; MAX_SEALED_PAYLOAD + 1]),
            Err(SspError::CommandTooLong(_))
        ));
    }
}
