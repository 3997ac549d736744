//! Key negotiation over an open connection.
//!
//! Single pass, in this order: SYNC, SET_GENERATOR, SET_MODULUS,
//! REQUEST_KEY_EXCHANGE. Every value travels as 8 little-endian bytes; the
//! slave's intermediate comes back in bytes 1..9 of the key-exchange reply.
//! Any failure aborts the attempt; the next attempt starts again from SYNC
//! with freshly generated material.

use tracing::{debug, info, instrument};

use crate::error::{constants, Result, SspError};
use crate::protocol::codes::command as op;
use crate::protocol::command::{Command, ResponseFrame};
use crate::protocol::keys::{KeyMaterial, SessionKey};
use crate::transport::SspConnection;
use crate::utils::metrics::Timer;

/// Negotiate a session key and install it on `conn`.
///
/// Encryption is switched off for the duration; the caller re-enables it
/// once this returns.
///
/// # Errors
/// Every failure is reported as [`SspError::HandshakeFailed`].
#[instrument(skip(conn), fields(address = conn.address()))]
pub async fn negotiate(conn: &mut SspConnection) -> Result<SessionKey> {
    let _timer = Timer::start("key_negotiation");
    let metrics = conn.metrics();
    metrics.negotiation_attempt();
    conn.disable_encryption();

    step(conn, Command::sync(), constants::ERR_SYNC_FAILED).await?;

    let mut keys = KeyMaterial::generate();
    debug!(generator = keys.generator, modulus = keys.modulus, "Key material generated");

    step(
        conn,
        Command::new(op::SET_GENERATOR).with_u64(keys.generator),
        constants::ERR_GENERATOR_REJECTED,
    )
    .await?;
    step(
        conn,
        Command::new(op::SET_MODULUS).with_u64(keys.modulus),
        constants::ERR_MODULUS_REJECTED,
    )
    .await?;
    let reply = step(
        conn,
        Command::new(op::REQUEST_KEY_EXCHANGE).with_u64(keys.host_intermediate),
        constants::ERR_KEY_EXCHANGE_REJECTED,
    )
    .await?;

    let slave_intermediate = slave_intermediate(reply.data())?;
    keys.derive_host_key(slave_intermediate)?;

    let key = keys.session_key();
    conn.set_key(&key);
    metrics.negotiation_success();
    info!("Session key negotiated");
    Ok(key)
}

/// Read the slave intermediate from a key-exchange reply (status byte first)
pub fn slave_intermediate(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(1..9)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| SspError::HandshakeFailed(constants::ERR_SHORT_KEY_EXCHANGE.into()))?;
    Ok(u64::from_le_bytes(bytes))
}

async fn step(conn: &mut SspConnection, command: Command, reason: &str) -> Result<ResponseFrame> {
    conn.exchange(&command)
        .await
        .and_then(ResponseFrame::check)
        .map_err(|e| SspError::HandshakeFailed(format!("{reason}: {e}")))
}
