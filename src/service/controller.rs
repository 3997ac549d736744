//! Host-facing control surface.
//!
//! A [`Controller`] owns one [`PayoutDevice`] behind a `tokio::sync::Mutex`
//! so that polls and host commands never overlap on the wire. The host
//! either calls [`Controller::tick`] from its own timer (roughly every
//! 250 ms) or lets [`Controller::spawn_poll_loop`] do it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SspConfig;
use crate::error::{Result, SspError};
use crate::protocol::events::PollEvent;
use crate::service::device::PayoutDevice;
use crate::service::{LogSink, SerialNumberSink};
use crate::transport::{SharedTransport, SspConnection};
use crate::utils::timeout::SHUTDOWN_TIMEOUT;

/// Drops a line identical to the one before it
pub struct DedupSink {
    inner: Arc<dyn LogSink>,
    last: StdMutex<Option<String>>,
}

impl DedupSink {
    pub fn new(inner: Arc<dyn LogSink>) -> Self {
        Self {
            inner,
            last: StdMutex::new(None),
        }
    }
}

impl LogSink for DedupSink {
    fn log(&self, text: &str) {
        let Ok(mut last) = self.last.lock() else {
            self.inner.log(text);
            return;
        };
        if last.as_deref() == Some(text) {
            return;
        }
        *last = Some(text.to_string());
        drop(last);
        self.inner.log(text);
    }
}

struct PollLoop {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Run/halt/tick surface for one payout unit
pub struct Controller {
    device: Arc<Mutex<PayoutDevice>>,
    config: SspConfig,
    log: Arc<dyn LogSink>,
    serial: Arc<dyn SerialNumberSink>,
    running: Arc<AtomicBool>,
    poll_loop: Option<PollLoop>,
}

impl Controller {
    pub fn new(
        transport: SharedTransport,
        config: SspConfig,
        log: Arc<dyn LogSink>,
        serial: Arc<dyn SerialNumberSink>,
    ) -> Self {
        let log: Arc<dyn LogSink> = Arc::new(DedupSink::new(log));
        let conn = SspConnection::new(transport, config.port.clone(), &config.session);
        let device = PayoutDevice::new(conn, config.device.clone(), log.clone());
        Self {
            device: Arc::new(Mutex::new(device)),
            config,
            log,
            serial,
            running: Arc::new(AtomicBool::new(false)),
            poll_loop: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Exclusive access to the device for host commands (payout, float, ...)
    pub async fn device(&self) -> MutexGuard<'_, PayoutDevice> {
        self.device.lock().await
    }

    /// Connect and bring the unit into service.
    ///
    /// Opening the port and negotiating keys are retried up to
    /// `reconnect_attempts` times. Once a session is up, an unsupported
    /// protocol version or unit type ends the attempt without retrying.
    #[instrument(skip(self), fields(port = %self.config.port.name))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.log.log("Attempting to connect to validator");
        let device_config = &self.config.device;
        let mut device = self.device.lock().await;

        let mut connected = false;
        let mut last_error = None;
        for attempt in 1..=device_config.reconnect_attempts {
            match device.open_session(self.config.session.encryption).await {
                Ok(()) => {
                    connected = true;
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Connection attempt failed");
                    last_error = Some(e);
                    if attempt < device_config.reconnect_attempts {
                        tokio::time::sleep(device_config.reconnect_interval).await;
                    }
                }
            }
        }
        if !connected {
            self.log.log("Failed to connect to validator");
            return Err(last_error.unwrap_or(SspError::Timeout { attempts: 0 }));
        }

        if let Err(e) = Self::bring_up(&mut device, &self.config, self.serial.as_ref()).await {
            error!(error = %e, "Unit setup failed");
            self.log.log(&format!("Failed to set up validator: {e}"));
            return Err(e);
        }
        drop(device);

        self.running.store(true, Ordering::Release);
        self.log.log("Poll Loop");
        info!("Unit in service");
        Ok(())
    }

    async fn bring_up(
        device: &mut PayoutDevice,
        config: &SspConfig,
        serial: &dyn SerialNumberSink,
    ) -> Result<()> {
        device.initialise().await?;
        let number = device.serial_number(None).await?;
        serial.set_serial_number(&number.to_string());
        device.enable().await?;
        device.enable_payout().await?;
        device.configure_bezel(config.device.bezel).await
    }

    /// Take the unit out of service; the port stays open
    #[instrument(skip(self))]
    pub async fn halt(&mut self) -> Result<()> {
        self.stop_poll_loop().await;
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let mut device = self.device.lock().await;
        device.disable_payout().await?;
        device.disable().await?;
        info!("Unit halted");
        Ok(())
    }

    /// Halt and close the port
    pub async fn shutdown(&mut self) -> Result<()> {
        let halted = self.halt().await;
        let mut device = self.device.lock().await;
        device.connection().metrics().log_metrics();
        let closed = device.connection_mut().close().await;
        halted.and(closed)
    }

    /// One poll period. Fails with [`SspError::NotRunning`] before `start()`
    /// or after `halt()`.
    pub async fn tick(&self) -> Result<Vec<PollEvent>> {
        poll_once(&self.device, &self.running, self.log.as_ref()).await
    }

    /// Tick every `poll_interval` on a background task until `halt()`
    pub fn spawn_poll_loop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(SspError::NotRunning);
        }
        if self.poll_loop.as_ref().is_some_and(|p| !p.task.is_finished()) {
            return Ok(());
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let device = self.device.clone();
        let running = self.running.clone();
        let log = self.log.clone();
        let period = self.config.device.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = poll_once(&device, &running, log.as_ref()).await {
                            if !running.load(Ordering::Acquire) {
                                break;
                            }
                            debug!(error = %e, "Poll failed");
                        }
                    }
                }
            }
            debug!("Poll loop stopped");
        });

        self.poll_loop = Some(PollLoop { shutdown, task });
        Ok(())
    }

    async fn stop_poll_loop(&mut self) {
        let Some(poll_loop) = self.poll_loop.take() else {
            return;
        };
        let _ = poll_loop.shutdown.send(true);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, poll_loop.task)
            .await
            .is_err()
        {
            warn!("Poll loop did not stop in time");
        }
    }
}

async fn poll_once(
    device: &Mutex<PayoutDevice>,
    running: &AtomicBool,
    log: &dyn LogSink,
) -> Result<Vec<PollEvent>> {
    if !running.load(Ordering::Acquire) {
        return Err(SspError::NotRunning);
    }
    let mut device = device.lock().await;
    match device.poll().await {
        Ok(events) => Ok(events),
        Err(e) => {
            if !device.connection().is_open() {
                running.store(false, Ordering::Release);
                error!(error = %e, "Connection lost");
                log.log("Connection lost, unit stopped");
            }
            Err(e)
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("port", &self.config.port.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
