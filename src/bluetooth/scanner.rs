/// Scan control: mirrors adapter power state onto scanning and turns
/// discovered advertisements into sensor notifications.
use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Duration, Instant};

use crate::bluetooth::filter::DeviceFilter;
use crate::bluetooth::parser::{self, SERVICE_DATA_UUID};
use crate::error::{AdapterError, ScanError};
use crate::models::{
    AdapterEvent, DeviceInfo, DiscoveredDevice, Measurement, PowerState, Reading,
};

const DEFAULT_RESTART_DELAY_MS: u64 = 2500; // Wait before resuming after an unexpected stop

/// The radio adapter as seen by the controller.
///
/// Both calls must return promptly; the adapter reports the outcome through
/// its event stream (`ScanStart`, `ScanStop`, `Error`). `stop_scanning` must
/// be safe to call when the adapter is not scanning.
pub trait Central {
    fn start_scanning(&mut self) -> Result<(), AdapterError>;
    fn stop_scanning(&mut self) -> Result<(), AdapterError>;
}

/// Receives decoded readings.
///
/// Reading callbacks default to no-ops so a listener only implements what it
/// consumes. `error` has no default: every listener must handle failures.
pub trait SensorListener {
    fn temperature_change(&mut self, _celsius: f32, _device: &DeviceInfo) {}
    fn humidity_change(&mut self, _percent: f32, _device: &DeviceInfo) {}
    fn battery_change(&mut self, _percent: u8, _device: &DeviceInfo) {}
    fn illuminance_change(&mut self, _lux: u32, _device: &DeviceInfo) {}
    fn moisture_change(&mut self, _percent: u8, _device: &DeviceInfo) {}
    fn fertility_change(&mut self, _micro_siemens_per_cm: u16, _device: &DeviceInfo) {}
    fn error(&mut self, error: ScanError);
}

/// Item type for channel-based listeners.
pub type Notification = Result<Reading, ScanError>;

fn send_reading(
    tx: &mpsc::UnboundedSender<Notification>,
    measurement: Measurement,
    device: &DeviceInfo,
) {
    let _ = tx.send(Ok(Reading {
        measurement,
        device: device.clone(),
    }));
}

impl SensorListener for mpsc::UnboundedSender<Notification> {
    fn temperature_change(&mut self, celsius: f32, device: &DeviceInfo) {
        send_reading(self, Measurement::Temperature(celsius), device);
    }

    fn humidity_change(&mut self, percent: f32, device: &DeviceInfo) {
        send_reading(self, Measurement::Humidity(percent), device);
    }

    fn battery_change(&mut self, percent: u8, device: &DeviceInfo) {
        send_reading(self, Measurement::Battery(percent), device);
    }

    fn illuminance_change(&mut self, lux: u32, device: &DeviceInfo) {
        send_reading(self, Measurement::Illuminance(lux), device);
    }

    fn moisture_change(&mut self, percent: u8, device: &DeviceInfo) {
        send_reading(self, Measurement::Moisture(percent), device);
    }

    fn fertility_change(&mut self, micro_siemens_per_cm: u16, device: &DeviceInfo) {
        send_reading(self, Measurement::Fertility(micro_siemens_per_cm), device);
    }

    fn error(&mut self, error: ScanError) {
        let _ = self.send(Err(error));
    }
}

/// Resilience policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Restart scanning after the adapter stops it on its own
    pub force_discovering: bool,
    /// How long to wait before that restart
    pub restart_delay: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            force_discovering: true,
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
        }
    }
}

/// Controller lifecycle. `Scanning` and `Paused` are the listening sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Paused,
    Stopped,
}

impl ScanState {
    pub fn is_listening(&self) -> bool {
        matches!(self, ScanState::Scanning | ScanState::Paused)
    }
}

/// Owns the adapter's scan toggle for its whole lifetime.
pub struct ScanController<C, L> {
    central: C,
    listener: L,
    filter: DeviceFilter,
    options: ScanOptions,
    state: ScanState,
    power: PowerState,
    restart_at: Option<Instant>,
}

impl<C: Central, L: SensorListener> ScanController<C, L> {
    pub fn new(central: C, listener: L, filter: DeviceFilter, options: ScanOptions) -> Self {
        Self {
            central,
            listener,
            filter,
            options,
            state: ScanState::Idle,
            power: PowerState::Unknown,
            restart_at: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn central(&self) -> &C {
        &self.central
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// When a pending restart after an unexpected stop is due, if any.
    pub fn restart_at(&self) -> Option<Instant> {
        self.restart_at
    }

    /// Begin listening. Scans right away if the radio is already powered on.
    pub fn start(&mut self) {
        if self.state != ScanState::Idle {
            return;
        }
        debug!("Scan controller listening (power state {:?})", self.power);
        self.state = ScanState::Paused;
        if self.power.is_powered_on() {
            self.begin_scanning();
        }
    }

    /// Stop for good. Idempotent; nothing is emitted afterwards.
    pub fn stop(&mut self) {
        let previous = std::mem::replace(&mut self.state, ScanState::Stopped);
        self.restart_at = None;
        if previous == ScanState::Scanning {
            if let Err(e) = self.central.stop_scanning() {
                warn!("Failed to stop scanning on shutdown: {}", e);
            }
        }
        if previous != ScanState::Stopped {
            debug!("Scan controller stopped");
        }
    }

    /// Process one adapter notification to completion.
    pub fn handle_event(&mut self, event: AdapterEvent) {
        if self.state == ScanState::Stopped {
            return;
        }

        match event {
            AdapterEvent::PowerStateChange(power) => self.on_power_state(power),
            AdapterEvent::Discover(device) => {
                if self.state.is_listening() {
                    self.on_discover(&device);
                } else {
                    trace!("Ignoring {} before start", device.address);
                }
            }
            AdapterEvent::ScanStart => debug!("Scan started"),
            AdapterEvent::ScanStop => {
                debug!("Scan stopped");
                self.on_scan_stopped();
            }
            AdapterEvent::Warning(message) => info!("Adapter warning: {}", message),
            AdapterEvent::Error(message) => self.listener.error(AdapterError::new(message).into()),
        }
    }

    /// Retry scanning after an unexpected stop.
    pub fn resume_scanning(&mut self) {
        self.restart_at = None;
        if self.state == ScanState::Paused && self.power.is_powered_on() {
            info!("Resuming scan after unexpected stop");
            self.begin_scanning();
        }
    }

    /// Drive the controller from an adapter event stream until `shutdown`
    /// fires or the stream closes. Returns the stopped controller.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<AdapterEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Self {
        self.start();
        loop {
            let restart_at = self.restart_at;
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Adapter event stream closed");
                        break;
                    }
                },
                () = wait_until(restart_at) => self.resume_scanning(),
            }
        }
        self.stop();
        self
    }

    fn on_power_state(&mut self, power: PowerState) {
        debug!("Adapter power state: {:?}", power);
        self.power = power;
        match (power.is_powered_on(), self.state) {
            (true, ScanState::Paused) => self.begin_scanning(),
            (false, ScanState::Scanning) => self.end_scanning(),
            (false, _) => self.restart_at = None,
            _ => {}
        }
    }

    fn on_scan_stopped(&mut self) {
        if self.state != ScanState::Scanning {
            return;
        }
        // The adapter stopped without us asking. The signal may also be a late
        // answer to an earlier stop, so turn scanning off explicitly to keep
        // the adapter in step with `Paused`.
        self.end_scanning();
        if self.options.force_discovering && self.power.is_powered_on() {
            self.schedule_restart();
        }
    }

    fn on_discover(&mut self, device: &DiscoveredDevice) {
        if !self.filter.matches(&device.address) {
            return;
        }

        let Some(data) = device.service_data_for(SERVICE_DATA_UUID) else {
            return;
        };

        match parser::decode(data) {
            Ok(measurements) => {
                let info = device.info();
                for measurement in measurements {
                    debug!(
                        "[{}] {}: {} {}",
                        info.address,
                        measurement.kind().as_str(),
                        measurement,
                        measurement.kind().unit()
                    );
                    self.emit(measurement, &info);
                }
            }
            Err(source) => self.listener.error(ScanError::Decode {
                address: device.address.clone(),
                source,
            }),
        }
    }

    fn emit(&mut self, measurement: Measurement, device: &DeviceInfo) {
        match measurement {
            Measurement::Temperature(v) => self.listener.temperature_change(v, device),
            Measurement::Humidity(v) => self.listener.humidity_change(v, device),
            Measurement::Battery(v) => self.listener.battery_change(v, device),
            Measurement::Illuminance(v) => self.listener.illuminance_change(v, device),
            Measurement::Moisture(v) => self.listener.moisture_change(v, device),
            Measurement::Fertility(v) => self.listener.fertility_change(v, device),
        }
    }

    fn begin_scanning(&mut self) {
        self.restart_at = None;
        match self.central.start_scanning() {
            Ok(()) => self.state = ScanState::Scanning,
            Err(e) => {
                self.listener.error(e.into());
                if self.options.force_discovering {
                    self.schedule_restart();
                }
            }
        }
    }

    fn end_scanning(&mut self) {
        self.state = ScanState::Paused;
        self.restart_at = None;
        if let Err(e) = self.central.stop_scanning() {
            self.listener.error(e.into());
        }
    }

    fn schedule_restart(&mut self) {
        debug!("Restarting scan in {:?}", self.options.restart_delay);
        self.restart_at = Some(Instant::now() + self.options.restart_delay);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
