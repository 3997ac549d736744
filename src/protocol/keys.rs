//! Diffie–Hellman style key material for SSP encryption.
//!
//! Host and slave each pick a random exponent below 2^31, exchange
//! `generator^random mod modulus`, and raise the peer's value to their own
//! exponent. The agreed value becomes the variable half of the AES key; the
//! fixed half is a constant shared by every device.

use zeroize::Zeroize;

use crate::error::{constants, Result, SspError};
use crate::utils::crypto::Crypto;
use crate::utils::prime::{generate_prime, pow_mod, random_below_limit};

/// Fixed half of every SSP session key
pub const FIXED_KEY: u64 = 0x0123_4567_0123_4567;

/// Values produced during one negotiation attempt
#[derive(Clone, Default, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct KeyMaterial {
    pub generator: u64,
    pub modulus: u64,
    pub host_random: u64,
    pub host_intermediate: u64,
    pub slave_intermediate: u64,
    pub slave_random: u64,
    pub derived_host_key: u64,
    pub derived_slave_key: u64,
}

impl KeyMaterial {
    /// Fresh generator/modulus pair plus the host's intermediate value.
    ///
    /// Generator and modulus are swapped when needed so that
    /// `generator >= modulus`.
    pub fn generate() -> Self {
        let mut generator = generate_prime();
        let mut modulus = generate_prime();
        if generator < modulus {
            std::mem::swap(&mut generator, &mut modulus);
        }

        let host_random = random_below_limit();
        Self {
            generator,
            modulus,
            host_random,
            host_intermediate: pow_mod(generator, host_random, modulus),
            slave_intermediate: 0,
            slave_random: 0,
            derived_host_key: 0,
            derived_slave_key: 0,
        }
    }

    /// Host-side key from the slave's intermediate value
    pub fn derive_host_key(&mut self, slave_intermediate: u64) -> Result<u64> {
        self.check_primes()?;
        self.slave_intermediate = slave_intermediate;
        self.derived_host_key = pow_mod(slave_intermediate, self.host_random, self.modulus);
        Ok(self.derived_host_key)
    }

    /// Slave half of the exchange, for tests and device simulation
    pub fn create_slave_intermediate(&mut self) -> Result<u64> {
        self.check_primes()?;
        self.slave_random = random_below_limit();
        self.slave_intermediate = pow_mod(self.generator, self.slave_random, self.modulus);
        Ok(self.slave_intermediate)
    }

    /// Slave-side key from the host's intermediate value
    pub fn derive_slave_key(&mut self) -> u64 {
        self.derived_slave_key = pow_mod(self.host_intermediate, self.slave_random, self.modulus);
        self.derived_slave_key
    }

    /// Session key built from the host-derived value
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.derived_host_key)
    }

    fn check_primes(&self) -> Result<()> {
        if self.generator == 0 || self.modulus == 0 {
            return Err(SspError::HandshakeFailed(constants::ERR_ZERO_PRIME.into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("generator", &self.generator)
            .field("modulus", &self.modulus)
            .finish_non_exhaustive()
    }
}

/// 128-bit AES key: fixed half followed by the negotiated half
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SessionKey {
    pub fixed: u64,
    pub variable: u64,
}

impl SessionKey {
    pub fn new(variable: u64) -> Self {
        Self {
            fixed: FIXED_KEY,
            variable,
        }
    }

    /// Key bytes as loaded into AES: both halves little-endian
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&self.fixed.to_le_bytes());
        key[8..].copy_from_slice(&self.variable.to_le_bytes());
        key
    }

    pub fn cipher(&self) -> Crypto {
        let mut bytes = self.to_bytes();
        let crypto = Crypto::new(&bytes);
        bytes.zeroize();
        crypto
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey { .. }")
    }
}
