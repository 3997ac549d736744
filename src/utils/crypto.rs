//! AES-128 in ECB mode without padding.
//!
//! This is the block transform SSP slaves implement. Callers pad to a
//! multiple of [`BLOCK_SIZE`] before encrypting; unaligned input is an error,
//! never silently padded.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::{constants, Result, SspError};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// AES-128-ECB cipher keyed with a negotiated session key
#[derive(Clone)]
pub struct Crypto {
    cipher: Aes128,
}

impl Crypto {
    /// Create a cipher from a raw 128-bit key
    pub fn new(key: &[u8; 16]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypt `data` in place, one block at a time
    pub fn encrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        check_alignment(data.len())?;
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    /// Decrypt `data` in place, one block at a time
    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        check_alignment(data.len())?;
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    /// Encrypt a copy of `plaintext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut out = plaintext.to_vec();
        self.encrypt_in_place(&mut out)?;
        Ok(out)
    }

    /// Decrypt a copy of `ciphertext`
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut out = ciphertext.to_vec();
        self.decrypt_in_place(&mut out)?;
        Ok(out)
    }
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Crypto { .. }")
    }
}

fn check_alignment(len: usize) -> Result<()> {
    if len % BLOCK_SIZE != 0 {
        return Err(SspError::Cipher(format!(
            "{} ({len} bytes)",
            constants::ERR_CIPHERTEXT_ALIGNMENT
        )));
    }
    Ok(())
}
