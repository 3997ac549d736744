//! Integration tests for the exchange engine against a simulated slave:
//! sequence bit, retries, key negotiation and the encrypted counter.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::{Duration, Instant};

use common::{test_config, SimulatedValidator};
use ssp_protocol::core::packet::SEQ_FLAG;
use ssp_protocol::error::{EncryptedFault, SspError};
use ssp_protocol::protocol::codes::command as op;
use ssp_protocol::protocol::command::{Command, ResponseStatus};
use ssp_protocol::protocol::handshake;
use ssp_protocol::transport::{self, SspConnection};

fn connection(sim: &SimulatedValidator) -> SspConnection {
    let config = test_config();
    SspConnection::new(transport::shared(sim.clone()), config.port, &config.session)
}

async fn encrypted_connection(sim: &SimulatedValidator) -> SspConnection {
    let mut conn = connection(sim);
    conn.open().await.unwrap();
    handshake::negotiate(&mut conn).await.unwrap();
    conn.enable_encryption().unwrap();
    conn
}

#[tokio::test]
async fn test_exchange_requires_open_port() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    let result = conn.exchange(&Command::sync()).await;
    assert!(matches!(result, Err(SspError::PortClosed)));
}

#[tokio::test]
async fn test_sequence_bit_toggles_per_exchange() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    conn.exchange(&Command::sync()).await.unwrap();
    for n in 1..=5u8 {
        conn.exchange(&Command::poll()).await.unwrap();
        let expected = if (n + 1) % 2 == 0 { SEQ_FLAG } else { 0x00 };
        assert_eq!(conn.sequence(), expected, "after {} exchanges", n + 1);
    }

    let seqs: Vec<u8> = sim.state().frames.iter().map(|f| f.sequence()).collect();
    assert_eq!(seqs, vec![0x80, 0x00, 0x80, 0x00, 0x80, 0x00]);

    // SYNC forces the flag back regardless of where it was
    conn.exchange(&Command::poll()).await.unwrap();
    assert_eq!(conn.sequence(), 0x00);
    conn.exchange(&Command::sync()).await.unwrap();
    assert_eq!(sim.state().frames.last().unwrap().sequence(), SEQ_FLAG);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_device_status_is_not_a_framing_error() {
    let sim = SimulatedValidator::new();
    sim.state().status_override.push((op::ENABLE, 0xF8));
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    let reply = conn.exchange(&Command::new(op::ENABLE)).await.unwrap();
    assert_eq!(reply.status(), ResponseStatus::Fail);
    assert!(matches!(
        reply.check(),
        Err(SspError::DeviceStatus(ResponseStatus::Fail))
    ));
    assert!(conn.is_open());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_timeout_retransmits_same_frame() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    sim.state().drop_replies = 1;
    conn.exchange(&Command::poll()).await.unwrap();

    let state = sim.state();
    assert_eq!(state.writes.len(), 2);
    assert_eq!(state.writes[0], state.writes[1]);
    drop(state);
    assert_eq!(conn.metrics().snapshot().retransmissions, 1);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_timeout_after_retry_budget() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    conn.set_response_timeout(Duration::from_millis(40));
    sim.state().drop_replies = usize::MAX;
    let started = Instant::now();
    let result = conn.exchange(&Command::poll()).await;

    assert!(matches!(result, Err(SspError::Timeout { attempts: 3 })));
    assert!(started.elapsed() >= Duration::from_millis(120));
    assert_eq!(sim.state().writes.len(), 3);
    assert_eq!(conn.sequence(), SEQ_FLAG, "failed exchange must not toggle");

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_plain_crc_mismatch_is_not_retried() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    sim.state().corrupt_crc = 1;
    let result = conn.exchange(&Command::poll()).await;

    assert!(matches!(result, Err(SspError::FrameError { .. })));
    assert_eq!(sim.state().writes.len(), 1);
    assert_eq!(conn.metrics().snapshot().frame_errors, 1);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_negotiation_command_order() {
    let sim = SimulatedValidator::new();
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    let key = handshake::negotiate(&mut conn).await.unwrap();
    assert_eq!(key.fixed, 0x0123_4567_0123_4567);
    assert!(conn.has_key());
    assert!(!conn.is_encrypting());
    assert_eq!(
        sim.state().opcodes(),
        vec![
            op::SYNC,
            op::SET_GENERATOR,
            op::SET_MODULUS,
            op::REQUEST_KEY_EXCHANGE
        ]
    );

    // Generator and modulus travel as 8 little-endian bytes
    let state = sim.state();
    assert_eq!(state.commands[1].len(), 9);
    let generator = u64::from_le_bytes(state.commands[1][1..9].try_into().unwrap());
    let modulus = u64::from_le_bytes(state.commands[2][1..9].try_into().unwrap());
    assert!(generator >= modulus);
    assert!(generator < 1 << 31);
    drop(state);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_negotiation_fails_on_rejected_modulus() {
    let sim = SimulatedValidator::new();
    sim.state().status_override.push((op::SET_MODULUS, 0xF4));
    let mut conn = connection(&sim);
    conn.open().await.unwrap();

    let result = handshake::negotiate(&mut conn).await;
    assert!(matches!(result, Err(SspError::HandshakeFailed(_))));
    assert!(!conn.has_key());
    assert_eq!(sim.state().count(op::REQUEST_KEY_EXCHANGE), 0);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_encrypted_counter_advances_on_acceptance() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;
    assert_eq!(conn.counter(), 0);

    conn.exchange(&Command::poll()).await.unwrap();
    conn.exchange(&Command::poll()).await.unwrap();
    conn.exchange(&Command::new(op::ENABLE)).await.unwrap().check().unwrap();

    assert_eq!(sim.state().counters, vec![0, 1, 2]);
    assert_eq!(conn.counter(), 3);

    // Every frame after negotiation is encrypted
    assert!(sim.state().frames[4..].iter().all(|f| f.is_encrypted()));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_counter_mismatch_retried_once_with_same_counter() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;

    sim.state().corrupt_counter = 1;
    conn.exchange(&Command::poll()).await.unwrap();

    assert_eq!(sim.state().counters, vec![0, 0]);
    assert_eq!(conn.counter(), 1);
    assert_eq!(conn.metrics().snapshot().encrypted_retries, 1);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_counter_mismatch_twice_fails() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;

    sim.state().corrupt_counter = 2;
    let result = conn.exchange(&Command::poll()).await;

    match result {
        Err(SspError::EncryptedFrame(EncryptedFault::CounterMismatch { expected, actual })) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 6);
        }
        other => panic!("expected counter mismatch, got {other:?}"),
    }
    assert_eq!(sim.state().counters, vec![0, 0]);
    assert_eq!(conn.counter(), 0);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_exchanges_do_not_use_up_later_resends() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;

    // Each failing exchange sends twice: the original and its one re-send
    sim.state().corrupt_counter = 6;
    for _ in 0..3 {
        assert!(matches!(
            conn.exchange(&Command::poll()).await,
            Err(SspError::EncryptedFrame(EncryptedFault::CounterMismatch { .. }))
        ));
    }
    assert_eq!(sim.state().counters, vec![0; 6]);
    assert_eq!(conn.counter(), 0);

    // The next exchange still gets its re-send
    sim.state().corrupt_counter = 1;
    conn.exchange(&Command::poll()).await.unwrap();
    assert_eq!(sim.state().counters, vec![0; 8]);
    assert_eq!(conn.counter(), 1);
    assert_eq!(conn.metrics().snapshot().encrypted_retries, 4);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_inner_crc_mismatch_retried_once_with_same_counter() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;

    sim.state().corrupt_inner_crc = 1;
    conn.exchange(&Command::poll()).await.unwrap();

    assert_eq!(sim.state().counters, vec![0, 0]);
    assert_eq!(conn.counter(), 1);
    assert_eq!(conn.metrics().snapshot().encrypted_retries, 1);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_inner_crc_mismatch_twice_fails() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;

    sim.state().corrupt_inner_crc = 2;
    let result = conn.exchange(&Command::poll()).await;

    assert!(matches!(
        result,
        Err(SspError::EncryptedFrame(EncryptedFault::CrcMismatch))
    ));
    assert_eq!(sim.state().counters, vec![0, 0]);
    assert_eq!(conn.counter(), 0);

    // The link is still usable and the counter never moved
    conn.exchange(&Command::poll()).await.unwrap();
    assert_eq!(sim.state().counters, vec![0, 0, 0]);
    assert_eq!(conn.counter(), 1);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_close_forgets_key() {
    let sim = SimulatedValidator::new();
    let mut conn = encrypted_connection(&sim).await;
    conn.exchange(&Command::poll()).await.unwrap();

    conn.close().await.unwrap();
    assert!(!conn.has_key());
    assert!(!conn.is_encrypting());
    assert!(!conn.is_open());
    assert!(!sim.state().open);
    assert!(matches!(
        conn.enable_encryption(),
        Err(SspError::KeyNotNegotiated)
    ));
}
