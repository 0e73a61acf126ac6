use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::capture::{self, IMAGE_BEGIN, IMAGE_END, ImageFrame};
use crate::error::{ChannelError, LinkError};
use crate::port::Channel;
use crate::scan::{DEFAULT_MAX_FRAME, ScanLimits, scan_until};
use crate::store::TelemetryStore;
use crate::telemetry::{self, TELEMETRY_BEGIN, TELEMETRY_END, TelemetrySample};

/// Operating state requested of the rover via a single command byte.
/// The rover's actual mode is inferred from what we wrote, never
/// observed; there is no confirmation path in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightMode {
    /// Nothing commanded yet.
    #[default]
    Unset,
    Installation,
    TelemetryTransmission,
    Deployment,
    Terminate,
}

impl FlightMode {
    pub fn command_byte(self) -> Option<u8> {
        match self {
            FlightMode::Unset => None,
            FlightMode::Installation => Some(0x00),
            FlightMode::TelemetryTransmission => Some(0x01),
            FlightMode::Deployment => Some(0x02),
            FlightMode::Terminate => Some(0x05),
        }
    }

    /// Mode as the operator numbers them (0/1/2/5).
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(FlightMode::Installation),
            1 => Some(FlightMode::TelemetryTransmission),
            2 => Some(FlightMode::Deployment),
            5 => Some(FlightMode::Terminate),
            _ => None,
        }
    }
}

/// How `request_image` forces the rover into `Deployment` before the
/// blocking read. Field setups disagreed on whether `Installation` must
/// be commanded first, so both sequences are selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployForcing {
    #[default]
    Direct,
    ViaInstallation,
}

impl FromStr for DeployForcing {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(DeployForcing::Direct),
            "via-installation" => Ok(DeployForcing::ViaInstallation),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Cap on bytes buffered while hunting for a delimiter.
    pub max_frame: usize,
    /// Overall deadline for one frame receive. `None` waits forever.
    pub read_deadline: Option<Duration>,
    /// Interval between re-arms while a telemetry request waits for the
    /// link to be in `TelemetryTransmission`.
    pub retry_interval: Duration,
    /// Mode sequence forced ahead of an image capture.
    pub deploy_forcing: DeployForcing,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_frame: DEFAULT_MAX_FRAME,
            read_deadline: None,
            retry_interval: Duration::from_secs(1),
            deploy_forcing: DeployForcing::Direct,
        }
    }
}

// Receive-in-flight guard values. One global guard spans both frame
// kinds: both read the same physical channel, so a telemetry receive and
// an image receive must never overlap.
const RECEIVE_NONE: u8 = 0;
const RECEIVE_TELEMETRY: u8 = 1;
const RECEIVE_IMAGE: u8 = 2;

/// Owns the serial channel, the commanded flight mode and the telemetry
/// log. Exactly one receive operation may be in flight at a time; a mode
/// write and a frame read never interleave because both go through the
/// channel mutex.
///
/// Clones share the same underlying session.
#[derive(Clone)]
pub struct LinkSession {
    inner: Arc<Inner>,
    config: LinkConfig,
}

struct Inner {
    channel: Mutex<Box<dyn Channel>>,
    mode: Mutex<FlightMode>,
    receive_in_flight: AtomicU8,
    store: Mutex<TelemetryStore>,
}

impl LinkSession {
    pub fn new(channel: Box<dyn Channel>, config: LinkConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                channel: Mutex::new(channel),
                mode: Mutex::new(FlightMode::Unset),
                receive_in_flight: AtomicU8::new(RECEIVE_NONE),
                store: Mutex::new(TelemetryStore::new()),
            }),
            config,
        }
    }

    /// Command a new flight mode. Returns `false` without touching the
    /// channel when the mode is already current, or when an image
    /// capture is in flight: the rover runs its deployment sequence
    /// single-threaded, so mode changes are suppressed until the capture
    /// completes.
    pub fn issue_mode(&self, mode: FlightMode) -> Result<bool, LinkError> {
        if self.inner.receive_in_flight.load(Ordering::Acquire) == RECEIVE_IMAGE {
            debug!(?mode, "mode change suppressed during image capture");
            return Ok(false);
        }
        self.write_mode(mode)
    }

    pub fn current_mode(&self) -> FlightMode {
        *self.inner.mode.lock()
    }

    pub fn latest_sample(&self) -> Option<TelemetrySample> {
        self.inner.store.lock().latest().cloned()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.store.lock().len()
    }

    /// Persist every sample received so far. Called on shutdown, normal
    /// or not.
    pub fn flush_log(&self, path: &Path) -> io::Result<()> {
        self.inner.store.lock().flush(path)
    }

    /// Block until the next telemetry frame is decoded, publish it to
    /// the store and return it.
    ///
    /// Defers on `retry_interval` until the link is in
    /// `TelemetryTransmission`. Malformed frames are logged and dropped
    /// by the receive worker, which stays armed for the next frame; only
    /// a channel failure surfaces.
    pub fn request_telemetry(&self) -> Result<TelemetrySample, LinkError> {
        while self.current_mode() != FlightMode::TelemetryTransmission {
            debug!(mode = ?self.current_mode(), "telemetry request deferred until mode matches");
            thread::sleep(self.config.retry_interval);
        }
        self.acquire_receive(RECEIVE_TELEMETRY)?;
        // Publish before releasing the guard so samples land in the
        // store in strict receipt order.
        let result = self.run_receive("telemetry-rx", telemetry_receive).map(|sample| {
            let seq = self.inner.store.lock().push(sample.clone());
            debug!(seq, %sample, "telemetry sample published");
            sample
        });
        self.release_receive();
        Ok(result?)
    }

    /// Block until a full deployment image is received and decoded.
    ///
    /// Forces the rover into `Deployment` first (directly or through
    /// `Installation`, per config), then scans for the JPEG marker pair.
    /// On success the rover is dropped back to `Terminate` to signal the
    /// capture is complete.
    pub fn request_image(&self) -> Result<ImageFrame, LinkError> {
        self.acquire_receive(RECEIVE_IMAGE)?;
        let result = self
            .force_deployment()
            .and_then(|_| self.run_receive("image-rx", image_receive));
        self.release_receive();
        let frame = result?;
        self.issue_mode(FlightMode::Terminate)?;
        Ok(frame)
    }

    fn force_deployment(&self) -> Result<(), LinkError> {
        match self.config.deploy_forcing {
            DeployForcing::Direct => {
                self.write_mode(FlightMode::Deployment)?;
            }
            DeployForcing::ViaInstallation => {
                self.write_mode(FlightMode::Installation)?;
                self.write_mode(FlightMode::Deployment)?;
            }
        }
        Ok(())
    }

    /// Write the command byte, bypassing the image-capture suppression.
    /// Idempotent: an already-current mode is not re-sent.
    fn write_mode(&self, mode: FlightMode) -> Result<bool, LinkError> {
        let byte = mode.command_byte().ok_or(LinkError::NotIssuable(mode))?;
        if self.current_mode() == mode {
            return Ok(false);
        }
        {
            let mut channel = self.inner.channel.lock();
            channel.write_all(&[byte]).map_err(ChannelError::Io)?;
            channel.flush().map_err(ChannelError::Io)?;
        }
        *self.inner.mode.lock() = mode;
        info!(?mode, byte, "flight mode commanded");
        Ok(true)
    }

    fn acquire_receive(&self, kind: u8) -> Result<(), LinkError> {
        self.inner
            .receive_in_flight
            .compare_exchange(RECEIVE_NONE, kind, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LinkError::Busy)?;
        Ok(())
    }

    fn release_receive(&self) {
        self.inner
            .receive_in_flight
            .store(RECEIVE_NONE, Ordering::Release);
    }

    /// Run one receive on a worker thread and block for its result. The
    /// worker signals completion over a channel rather than the caller
    /// polling a flag.
    fn run_receive<T: Send + 'static>(
        &self,
        name: &str,
        receive: fn(&Inner, ScanLimits) -> Result<T, ChannelError>,
    ) -> Result<T, LinkError> {
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let limits = ScanLimits {
            max_frame: self.config.max_frame,
            deadline: self.config.read_deadline,
        };
        thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _ = tx.send(receive(&inner, limits));
            })
            .map_err(ChannelError::Io)?;
        Ok(rx.recv().map_err(|_| ChannelError::Closed)??)
    }
}

fn telemetry_receive(inner: &Inner, limits: ScanLimits) -> Result<TelemetrySample, ChannelError> {
    loop {
        let payload = {
            let mut guard = inner.channel.lock();
            let channel: &mut dyn Channel = &mut **guard;
            let (skipped, _) = scan_until(channel, TELEMETRY_BEGIN, limits)?;
            if !skipped.is_empty() {
                debug!(bytes = skipped.len(), "discarded bytes ahead of telemetry frame");
            }
            let (payload, _) = scan_until(channel, TELEMETRY_END, limits)?;
            payload
        };
        match telemetry::decode(&payload) {
            Ok(sample) => return Ok(sample),
            // Recoverable: drop the frame, stay armed for the next one.
            Err(err) => warn!(%err, "discarding malformed telemetry frame"),
        }
    }
}

fn image_receive(inner: &Inner, limits: ScanLimits) -> Result<ImageFrame, ChannelError> {
    loop {
        let raw = {
            let mut guard = inner.channel.lock();
            let channel: &mut dyn Channel = &mut **guard;
            let (skipped, start) = scan_until(channel, &IMAGE_BEGIN, limits)?;
            if !skipped.is_empty() {
                debug!(bytes = skipped.len(), "discarded bytes ahead of start-of-image");
            }
            let (body, end) = scan_until(channel, &IMAGE_END, limits)?;
            let mut raw = start;
            raw.extend_from_slice(&body);
            raw.extend_from_slice(&end);
            raw
        };
        match capture::assemble(raw) {
            Ok(frame) => return Ok(frame),
            Err(err) => warn!(%err, "discarding undecodable image frame"),
        }
    }
}
