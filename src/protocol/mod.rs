//! # Protocol Layer
//!
//! Everything above raw frames: what a command looks like, what a reply
//! means, how the session key is agreed, and how poll replies decode.
//!
//! ## Components
//! - [`codes`]: opcode, status and event byte values
//! - [`command`]: request builder and generic status check
//! - [`keys`]: Diffie-Hellman key material and the AES session key
//! - [`handshake`]: the negotiation sequence run over a connection
//! - [`events`]: poll reply parser and the follow-up work it implies
//! - [`lookup`]: display names for codes and reject reasons

pub mod codes;
pub mod command;
pub mod events;
pub mod handshake;
pub mod keys;
pub mod lookup;
