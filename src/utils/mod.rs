//! # Utility Modules
//!
//! Supporting pieces used throughout the engine.
//!
//! ## Components
//! - **Crypto**: AES-128 block transform (ECB, no padding)
//! - **Prime**: secure random integers, Miller-Rabin, modular exponentiation
//! - **Logging**: tracing subscriber setup
//! - **Metrics**: per-connection counters
//! - **Timeout**: timing constants
//!
//! ## Security
//! - Random values come from the operating system's CSPRNG
//! - Key material is zeroed on drop (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod prime;
pub mod timeout;
