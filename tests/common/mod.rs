//! Simulated SSP slave for integration tests.
//!
//! [`SimulatedValidator`] implements `SerialTransport`. Every write is
//! reassembled with the crate's own codec, answered like a SMART Payout
//! would, and the reply is queued for the reader task. A cloned handle lets
//! the test script faults and inspect what the host sent.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ssp_protocol::config::SspConfig;
use ssp_protocol::core::codec::{Inbound, SspCodec};
use ssp_protocol::core::envelope;
use ssp_protocol::core::packet::{Frame, SEQ_FLAG};
use ssp_protocol::error::{Result, SspError};
use ssp_protocol::protocol::codes::{command as op, response};
use ssp_protocol::protocol::keys::{KeyMaterial, SessionKey};
use ssp_protocol::service::{LogSink, SerialNumberSink};
use ssp_protocol::transport::{SerialSettings, SerialTransport};
use ssp_protocol::utils::crypto::Crypto;

pub const ADDRESS: u8 = 0x00;

/// One note channel on the simulated unit
#[derive(Debug, Clone)]
pub struct SimChannel {
    /// Value before the multiplier is applied
    pub raw_value: u32,
    pub currency: [u8; 3],
    pub level: u16,
    pub recycling: bool,
}

/// Everything the simulated unit knows and records
#[derive(Debug)]
pub struct SimState {
    pub open: bool,
    pub fail_open: bool,
    codec: SspCodec,
    outbound: VecDeque<u8>,

    keys: KeyMaterial,
    cipher: Option<Crypto>,

    pub unit_type: u8,
    pub max_protocol: u8,
    pub protocol_version: u8,
    pub multiplier: u32,
    pub channels: Vec<SimChannel>,
    pub serial: u32,
    pub reject_code: u8,
    pub inhibits: Option<u16>,
    pub enabled: bool,
    pub payout_enabled: bool,
    pub bezel: Option<[u8; 3]>,
    pub cashbox_data: Vec<u8>,
    pub poll_queue: VecDeque<Vec<u8>>,
    /// Opcode -> status byte returned instead of OK
    pub status_override: Vec<(u8, u8)>,

    /// Swallow the next N commands without replying
    pub drop_replies: usize,
    /// Reply to the next N encrypted commands with a wrong counter
    pub corrupt_counter: usize,
    /// Flip a ciphertext byte of the next N encrypted replies
    pub corrupt_inner_crc: usize,
    /// Flip the outer CRC of the next N replies
    pub corrupt_crc: usize,

    /// Raw bytes of every write, stuffed as sent
    pub writes: Vec<Vec<u8>>,
    /// Decoded frames received, in order
    pub frames: Vec<Frame>,
    /// Plain command bytes received (decrypted where needed)
    pub commands: Vec<Vec<u8>>,
    /// Counters carried by encrypted commands
    pub counters: Vec<u32>,
}

impl SimState {
    fn new() -> Self {
        Self {
            open: false,
            fail_open: false,
            codec: SspCodec::new(ADDRESS),
            outbound: VecDeque::new(),
            keys: KeyMaterial::default(),
            cipher: None,
            unit_type: 0x06,
            max_protocol: 7,
            protocol_version: 0,
            multiplier: 100,
            channels: vec![
                SimChannel {
                    raw_value: 20,
                    currency: *b"EUR",
                    level: 2,
                    recycling: false,
                },
                SimChannel {
                    raw_value: 5,
                    currency: *b"EUR",
                    level: 7,
                    recycling: true,
                },
                SimChannel {
                    raw_value: 10,
                    currency: *b"EUR",
                    level: 4,
                    recycling: true,
                },
            ],
            serial: 0x0012_D687,
            reject_code: 0x06,
            inhibits: None,
            enabled: false,
            payout_enabled: false,
            bezel: None,
            cashbox_data: vec![0, 0, 0, 0, 0],
            poll_queue: VecDeque::new(),
            status_override: Vec::new(),
            drop_replies: 0,
            corrupt_counter: 0,
            corrupt_inner_crc: 0,
            corrupt_crc: 0,
            writes: Vec::new(),
            frames: Vec::new(),
            commands: Vec::new(),
            counters: Vec::new(),
        }
    }

    /// Opcodes received, in order
    pub fn opcodes(&self) -> Vec<u8> {
        self.commands.iter().filter_map(|c| c.first().copied()).collect()
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.opcodes().iter().filter(|&&o| o == opcode).count()
    }

    fn receive(&mut self, frame: Frame) {
        self.frames.push(frame.clone());

        let (plain, counter) = if frame.is_encrypted() {
            let Some(cipher) = self.cipher.as_ref() else {
                return;
            };
            let Ok(opened) = envelope::open(cipher, &frame.data) else {
                return;
            };
            self.counters.push(opened.counter);
            (opened.data, Some(opened.counter))
        } else {
            (frame.data.clone(), None)
        };
        self.commands.push(plain.clone());

        if self.drop_replies > 0 {
            self.drop_replies -= 1;
            return;
        }

        let reply = self.answer(&plain);
        let data = match counter {
            Some(counter) => {
                let mut next = counter.wrapping_add(1);
                if self.corrupt_counter > 0 {
                    self.corrupt_counter -= 1;
                    next = next.wrapping_add(5);
                }
                let cipher = self.cipher.as_ref().expect("cipher set above");
                let mut sealed = envelope::seal(cipher, next, &reply).unwrap();
                if self.corrupt_inner_crc > 0 {
                    self.corrupt_inner_crc -= 1;
                    // The outer CRC is computed afterwards, so only the inner check sees this
                    sealed[1] ^= 0x01;
                }
                sealed
            }
            None => reply,
        };

        let mut raw = Frame::new(ADDRESS, frame.sequence(), data).to_bytes().unwrap();
        if self.corrupt_crc > 0 {
            self.corrupt_crc -= 1;
            let last = raw.len() - 1;
            raw[last] ^= 0x5A;
        }
        self.outbound.extend(ssp_protocol::core::packet::stuff(&raw));
    }

    fn answer(&mut self, plain: &[u8]) -> Vec<u8> {
        let Some((&opcode, params)) = plain.split_first() else {
            return vec![response::WRONG_NO_PARAMETERS];
        };
        if let Some(&(_, status)) = self.status_override.iter().find(|(o, _)| *o == opcode) {
            return vec![status];
        }

        let ok = response::OK;
        match opcode {
            op::SYNC | op::RESET | op::HOLD | op::REJECT_BANKNOTE => vec![ok],
            op::SET_GENERATOR => {
                self.keys.generator = le_u64(params);
                vec![ok]
            }
            op::SET_MODULUS => {
                self.keys.modulus = le_u64(params);
                vec![ok]
            }
            op::REQUEST_KEY_EXCHANGE => {
                self.keys.host_intermediate = le_u64(params);
                let Ok(intermediate) = self.keys.create_slave_intermediate() else {
                    return vec![response::FAIL];
                };
                let key = SessionKey::new(self.keys.derive_slave_key());
                self.cipher = Some(key.cipher());
                let mut out = vec![ok];
                out.extend_from_slice(&intermediate.to_le_bytes());
                out
            }
            op::HOST_PROTOCOL_VERSION => match params.first() {
                Some(&v) if v <= self.max_protocol => {
                    self.protocol_version = v;
                    vec![ok]
                }
                _ => vec![response::FAIL],
            },
            op::SETUP_REQUEST => self.setup_reply(),
            op::SET_CHANNEL_INHIBITS => {
                self.inhibits = Some(u16::from_le_bytes([params[0], params[1]]));
                vec![ok]
            }
            op::ENABLE => {
                self.enabled = true;
                vec![ok]
            }
            op::DISABLE => {
                self.enabled = false;
                vec![ok]
            }
            op::ENABLE_PAYOUT_DEVICE => {
                self.payout_enabled = true;
                vec![ok]
            }
            op::DISABLE_PAYOUT_DEVICE => {
                self.payout_enabled = false;
                vec![ok]
            }
            op::GET_SERIAL_NUMBER => {
                let mut out = vec![ok];
                out.extend_from_slice(&self.serial.to_be_bytes());
                out
            }
            op::GET_DENOMINATION_LEVEL => match self.find_channel(params) {
                Some(ch) => {
                    let mut out = vec![ok];
                    out.extend_from_slice(&ch.level.to_le_bytes());
                    out
                }
                None => vec![response::PARAMETER_OUT_OF_RANGE],
            },
            op::GET_DENOMINATION_ROUTE => match self.find_channel(params) {
                Some(ch) => vec![ok, if ch.recycling { 0x00 } else { 0x01 }],
                None => vec![response::PARAMETER_OUT_OF_RANGE],
            },
            op::SET_DENOMINATION_ROUTE => {
                let recycle = params[0] == 0x00;
                let value = u32::from_le_bytes([params[1], params[2], params[3], params[4]]);
                let multiplier = self.multiplier;
                match self
                    .channels
                    .iter_mut()
                    .find(|c| c.raw_value * multiplier == value)
                {
                    Some(ch) => {
                        ch.recycling = recycle;
                        vec![ok]
                    }
                    None => vec![response::PARAMETER_OUT_OF_RANGE],
                }
            }
            op::LAST_REJECT_CODE => vec![ok, self.reject_code],
            op::POLL => {
                let mut out = vec![ok];
                out.extend(self.poll_queue.pop_front().unwrap_or_default());
                out
            }
            op::CASHBOX_PAYOUT_OPERATION_DATA => {
                let mut out = vec![ok];
                out.extend_from_slice(&self.cashbox_data);
                out
            }
            op::GET_ALL_LEVELS => {
                let mut out = vec![ok, self.channels.len() as u8];
                for ch in &self.channels {
                    out.extend_from_slice(&ch.level.to_le_bytes());
                    out.extend_from_slice(&(ch.raw_value * self.multiplier).to_le_bytes());
                    out.extend_from_slice(&ch.currency);
                }
                out
            }
            op::CONFIGURE_BEZEL => {
                self.bezel = Some([params[0], params[1], params[2]]);
                vec![ok]
            }
            op::PAYOUT_AMOUNT
            | op::PAYOUT_BY_DENOMINATION
            | op::FLOAT_AMOUNT
            | op::EMPTY_ALL
            | op::SMART_EMPTY => vec![ok],
            _ => vec![response::COMMAND_NOT_KNOWN],
        }
    }

    fn find_channel(&self, params: &[u8]) -> Option<&SimChannel> {
        let value = u32::from_le_bytes([params[0], params[1], params[2], params[3]]);
        self.channels
            .iter()
            .find(|c| c.raw_value * self.multiplier == value && c.currency == params[4..7])
    }

    fn setup_reply(&self) -> Vec<u8> {
        let n = self.channels.len();
        let mut out = vec![response::OK, self.unit_type];
        out.extend_from_slice(b"0420");
        out.extend_from_slice(b"EUR");
        out.extend_from_slice(&[0, 0, 1]);
        out.push(n as u8);
        out.extend(std::iter::repeat(0u8).take(2 * n));
        out.extend_from_slice(&self.multiplier.to_be_bytes()[1..]);
        out.push(self.protocol_version);
        for ch in &self.channels {
            out.extend_from_slice(&ch.currency);
        }
        for ch in &self.channels {
            out.extend_from_slice(&ch.raw_value.to_le_bytes());
        }
        out
    }
}

fn le_u64(params: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&params[..8]);
    u64::from_le_bytes(bytes)
}

/// Cloneable handle to the simulated unit
#[derive(Debug, Clone)]
pub struct SimulatedValidator {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedValidator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn queue_poll(&self, events: &[u8]) {
        self.state().poll_queue.push_back(events.to_vec());
    }
}

impl Default for SimulatedValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport for SimulatedValidator {
    fn open(&mut self, _settings: &SerialSettings) -> Result<()> {
        let mut state = self.state();
        if state.fail_open {
            return Err(SspError::Transport("simulated port refused to open".into()));
        }
        state.open = true;
        state.codec.reset();
        state.outbound.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().map(|s| s.open).unwrap_or(false)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.state().outbound.len())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.state()
            .outbound
            .pop_front()
            .ok_or_else(|| SspError::Transport("read past available bytes".into()))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(SspError::PortClosed);
        }
        state.writes.push(bytes.to_vec());
        for &b in bytes {
            if let Some(Inbound::Frame(frame)) = state.codec.push(b) {
                state.receive(frame);
            }
        }
        Ok(())
    }
}

/// Collects everything the engine reports to the host
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
    serial: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn serial(&self) -> Option<String> {
        self.serial.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}

impl SerialNumberSink for RecordingSink {
    fn set_serial_number(&self, serial: &str) {
        *self.serial.lock().unwrap() = Some(serial.to_string());
    }
}

/// Short timeouts so failure paths finish quickly
pub fn test_config() -> SspConfig {
    SspConfig::default_with_overrides(|c| {
        c.port.name = "sim0".to_string();
        c.session.address = ADDRESS;
        c.session.response_timeout = Duration::from_millis(150);
        c.device.reconnect_attempts = 2;
        c.device.reconnect_interval = Duration::from_millis(10);
        c.device.poll_interval = Duration::from_millis(50);
    })
}

pub fn initial_sequence() -> u8 {
    SEQ_FLAG
}
