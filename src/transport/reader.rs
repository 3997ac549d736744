//! Background byte-stream consumer.
//!
//! A tokio task wakes every [`READ_POLL_INTERVAL`], drains whatever the
//! port has buffered, feeds it byte by byte into the shared [`SspCodec`],
//! and hands completed frames to the command path over a bounded channel.
//! It runs until told to stop through its watch channel or until the port
//! fails; it is never aborted.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, trace, warn};

use crate::core::codec::{Inbound, SspCodec};
use crate::error::{constants, Result, SspError};
use crate::transport::SharedTransport;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::{READ_POLL_INTERVAL, SHUTDOWN_TIMEOUT};

/// Frames waiting for the command path; one exchange is in flight at a time
pub const FRAME_QUEUE_DEPTH: usize = 8;

/// What the reader hands over: a reassembled frame or the error that stopped it
pub type ReaderItem = Result<Inbound>;

/// Handle to a running reader task
#[derive(Debug)]
pub struct ReaderHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// Start draining `transport` into `codec`
    pub fn spawn(
        transport: SharedTransport,
        codec: Arc<Mutex<SspCodec>>,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::Receiver<ReaderItem>) {
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(transport, codec, metrics, frames_tx, shutdown_rx));
        (Self { shutdown, task }, frames_rx)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for it to exit
    pub async fn stop(self) -> Result<()> {
        // Err only means the task already exited and dropped its receiver
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SspError::Transport(format!("Reader task failed: {e}"))),
            Err(_) => Err(SspError::Transport(
                "Reader task did not stop in time".to_string(),
            )),
        }
    }
}

#[instrument(skip_all)]
async fn run(
    transport: SharedTransport,
    codec: Arc<Mutex<SspCodec>>,
    metrics: Arc<Metrics>,
    frames: mpsc::Sender<ReaderItem>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(READ_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending = Vec::new();
    debug!("Reader started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match drain(&transport, &codec, &metrics, &mut pending) {
                    Ok(()) => {
                        for inbound in pending.drain(..) {
                            if frames.send(Ok(inbound)).await.is_err() {
                                debug!("Frame receiver dropped, reader exiting");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Serial read failed, reader exiting");
                        let _ = frames.send(Err(e)).await;
                        return;
                    }
                }
            }
        }
    }

    debug!("Reader stopped");
}

/// Move available bytes through the reassembler; no lock is held across an await
fn drain(
    transport: &SharedTransport,
    codec: &Mutex<SspCodec>,
    metrics: &Metrics,
    out: &mut Vec<Inbound>,
) -> Result<()> {
    let mut bytes = Vec::new();
    {
        let mut port = transport.lock()?;
        if !port.is_open() {
            return Err(SspError::Transport(constants::ERR_PORT_NOT_OPEN.to_string()));
        }
        port.read_available(&mut bytes)?;
    }
    if bytes.is_empty() {
        return Ok(());
    }

    trace!(count = bytes.len(), "Drained bytes");
    metrics.bytes_read(bytes.len() as u64);

    let mut codec = codec.lock()?;
    out.extend(bytes.into_iter().filter_map(|b| codec.push(b)));
    Ok(())
}
