//! SSP exchange engine.
//!
//! [`SspConnection`] owns everything that persists between commands on one
//! port: address, sequence bit, session key, encrypted packet counter and
//! retry state. Each call to [`SspConnection::exchange`] sends one command
//! and returns its reply; the `&mut self` receiver keeps exactly one
//! exchange in flight.
//!
//! ## Sequence bit
//! Starts at 0x80, toggles after every accepted reply, and is forced back
//! to 0x80 whenever a SYNC is sent.
//!
//! ## Encrypted counter
//! A command is sealed with the current counter. The reply must carry the
//! counter plus one; only then does the host adopt that value. A rejected
//! reply leaves the counter alone, so a re-send reuses it.
//!
//! ## Retries
//! - Timeouts: the same frame is written up to `retry_budget` times in total.
//! - Encrypted faults (inner CRC, counter, malformed envelope): at most
//!   [`MAX_ENCRYPTED_RESENDS`] re-send per exchange. Nothing carries over to
//!   the next exchange, whether this one succeeded or not.
//! - Plain CRC mismatches and device status codes are never retried here.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SessionConfig;
use crate::core::codec::{Inbound, SspCodec};
use crate::core::envelope;
use crate::core::packet::{Frame, SEQ_FLAG};
use crate::error::{constants, EncryptedFault, Result, SspError};
use crate::protocol::command::{Command, ResponseFrame};
use crate::protocol::keys::SessionKey;
use crate::protocol::lookup;
use crate::transport::reader::{ReaderHandle, ReaderItem};
use crate::transport::{SerialSettings, SharedTransport};
use crate::utils::crypto::Crypto;
use crate::utils::metrics::Metrics;

/// Encrypted-fault re-sends allowed within one exchange
pub const MAX_ENCRYPTED_RESENDS: u8 = 1;

/// One SSP link over a serial transport
pub struct SspConnection {
    transport: SharedTransport,
    settings: SerialSettings,
    address: u8,
    response_timeout: Duration,
    retry_budget: u8,
    crc_retry: bool,
    sequence: u8,
    cipher: Option<Crypto>,
    encrypting: bool,
    counter: u32,
    codec: Arc<Mutex<SspCodec>>,
    frames: Option<mpsc::Receiver<ReaderItem>>,
    reader: Option<ReaderHandle>,
    metrics: Arc<Metrics>,
}

impl SspConnection {
    pub fn new(transport: SharedTransport, settings: SerialSettings, session: &SessionConfig) -> Self {
        let address = session.address & 0x7F;
        Self {
            transport,
            settings,
            address,
            response_timeout: session.response_timeout,
            retry_budget: session.retry_budget.max(1),
            crc_retry: session.crc_retry,
            sequence: SEQ_FLAG,
            cipher: None,
            encrypting: false,
            counter: 0,
            codec: Arc::new(Mutex::new(SspCodec::new(address))),
            frames: None,
            reader: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Open the port and start the background reader
    #[instrument(skip(self), fields(port = %self.settings))]
    pub async fn open(&mut self) -> Result<()> {
        if self.reader.is_some() {
            self.close().await?;
        }

        self.transport.lock()?.open(&self.settings)?;
        self.codec.lock()?.reset();
        let (reader, frames) =
            ReaderHandle::spawn(self.transport.clone(), self.codec.clone(), self.metrics.clone());
        self.reader = Some(reader);
        self.frames = Some(frames);
        self.sequence = SEQ_FLAG;
        info!("Port opened");
        Ok(())
    }

    /// Stop the reader, close the port and forget the session key
    #[instrument(skip(self), fields(port = %self.settings.name))]
    pub async fn close(&mut self) -> Result<()> {
        self.frames = None;
        let stopped = match self.reader.take() {
            Some(reader) => reader.stop().await,
            None => Ok(()),
        };

        {
            let mut port = self.transport.lock()?;
            if port.is_open() {
                port.close()?;
            }
        }

        self.clear_key();
        debug!("Port closed");
        stopped
    }

    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
            && self.transport.lock().map(|p| p.is_open()).unwrap_or(false)
    }

    /// Install a negotiated key and restart the packet counter
    pub fn set_key(&mut self, key: &SessionKey) {
        self.cipher = Some(key.cipher());
        self.counter = 0;
    }

    /// Drop the key; later commands go out in plain text
    pub fn clear_key(&mut self) {
        self.cipher = None;
        self.encrypting = false;
        self.counter = 0;
    }

    /// Seal every following command with the session key
    pub fn enable_encryption(&mut self) -> Result<()> {
        if self.cipher.is_none() {
            return Err(SspError::KeyNotNegotiated);
        }
        self.encrypting = true;
        Ok(())
    }

    pub fn disable_encryption(&mut self) {
        self.encrypting = false;
    }

    pub fn is_encrypting(&self) -> bool {
        self.encrypting
    }

    pub fn has_key(&self) -> bool {
        self.cipher.is_some()
    }

    /// Sequence flag the next command will carry (0x80 or 0x00)
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Encrypted packet counter the next sealed command will carry
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Send `command` and wait for its reply.
    ///
    /// The reply's status byte is not interpreted here; see
    /// [`ResponseFrame::check`].
    #[instrument(skip(self, command), fields(opcode = %lookup::command_name(command.opcode())))]
    pub async fn exchange(&mut self, command: &Command) -> Result<ResponseFrame> {
        if self.frames.is_none() {
            return Err(SspError::PortClosed);
        }
        if command.is_sync() {
            self.sequence = SEQ_FLAG;
        }

        let plain = command.to_bytes()?;
        self.metrics.exchange_started();
        let response = self.exchange_with_resend(&plain).await?;
        self.sequence ^= SEQ_FLAG;
        self.metrics.exchange_ok();
        trace!(status = %response.status(), len = response.raw_length(), "Reply accepted");
        Ok(response)
    }

    /// Transmit, re-sending once with the same counter after an encrypted fault
    async fn exchange_with_resend(&mut self, plain: &[u8]) -> Result<ResponseFrame> {
        let mut resends = 0u8;
        loop {
            match self.transmit(plain).await {
                Err(SspError::EncryptedFrame(fault))
                    if self.crc_retry && resends < MAX_ENCRYPTED_RESENDS =>
                {
                    resends += 1;
                    self.metrics.encrypted_retry();
                    warn!(
                        %fault,
                        counter = self.counter,
                        resends,
                        "Re-sending after encrypted fault"
                    );
                }
                other => return other,
            }
        }
    }

    /// Frame, write and wait, re-writing on timeout up to the retry budget
    async fn transmit(&mut self, plain: &[u8]) -> Result<ResponseFrame> {
        let data = match (&self.cipher, self.encrypting) {
            (Some(cipher), true) => envelope::seal(cipher, self.counter, plain)?,
            (None, true) => return Err(SspError::KeyNotNegotiated),
            _ => plain.to_vec(),
        };
        let wire = Frame::new(self.address, self.sequence, data).to_wire()?;

        for attempt in 1..=self.retry_budget {
            let frames = self.frames.as_mut().ok_or(SspError::PortClosed)?;
            // A late reply to an earlier exchange must not answer this one
            while frames.try_recv().is_ok() {}
            self.codec.lock()?.reset();

            self.transport.lock()?.write(&wire)?;
            self.metrics.bytes_written(wire.len() as u64);
            if attempt > 1 {
                self.metrics.retransmission();
            }
            trace!(attempt, seq = self.sequence, len = wire.len(), "Frame written");

            let received = tokio::time::timeout(self.response_timeout, frames.recv()).await;
            match received {
                Ok(Some(Ok(Inbound::Frame(frame)))) => return self.unwrap_reply(frame),
                Ok(Some(Ok(Inbound::CrcMismatch { expected, actual }))) => {
                    self.metrics.frame_error();
                    warn!(expected, actual, "Reply failed CRC check");
                    return Err(SspError::FrameError { expected, actual });
                }
                Ok(Some(Err(e))) => return Err(e),
                Ok(None) => {
                    return Err(SspError::Transport(constants::ERR_READER_STOPPED.to_string()))
                }
                Err(_) => {
                    self.metrics.timeout();
                    debug!(attempt, budget = self.retry_budget, "No reply before timeout");
                }
            }
        }

        Err(SspError::Timeout {
            attempts: self.retry_budget,
        })
    }

    /// Decrypt and verify an encrypted reply; plain replies pass through
    fn unwrap_reply(&mut self, frame: Frame) -> Result<ResponseFrame> {
        if !frame.is_encrypted() {
            return ResponseFrame::from_data(frame.data);
        }

        let cipher = self.cipher.as_ref().ok_or(SspError::KeyNotNegotiated)?;
        let opened = match envelope::open(cipher, &frame.data) {
            Ok(opened) => opened,
            Err(e) => {
                self.metrics.encrypted_fault();
                return Err(e);
            }
        };

        let expected = self.counter.wrapping_add(1);
        if opened.counter != expected {
            self.metrics.encrypted_fault();
            return Err(SspError::EncryptedFrame(EncryptedFault::CounterMismatch {
                expected,
                actual: opened.counter,
            }));
        }

        self.counter = expected;
        ResponseFrame::from_data(opened.data)
    }
}

impl std::fmt::Debug for SspConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SspConnection")
            .field("port", &self.settings.name)
            .field("address", &self.address)
            .field("sequence", &self.sequence)
            .field("encrypting", &self.encrypting)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}
