/// BlueZ-backed central using bluer
///
/// Translates bluer adapter and discovery streams into [`AdapterEvent`]s on an
/// unbounded channel consumed by the scan controller.
use std::collections::HashMap;

use bluer::{Address, Uuid};
use futures_util::{pin_mut, StreamExt};
use log::{debug, error, warn};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bluetooth::scanner::Central;
use crate::error::AdapterError;
use crate::models::{AdapterEvent, DiscoveredDevice, PowerState, ServiceDataSegment};

// Bluetooth SIG base UUID 0000xxxx-0000-1000-8000-00805f9b34fb with the short id zeroed
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

pub type EventSender = mpsc::UnboundedSender<AdapterEvent>;

/// A [`Central`] driving one local BlueZ adapter.
pub struct BluezCentral {
    adapter: bluer::Adapter,
    events: EventSender,
    discovery: Option<JoinHandle<()>>,
    power_watch: JoinHandle<()>,
}

impl BluezCentral {
    /// Open a Bluetooth session and prepare the named (or default) adapter.
    ///
    /// The returned receiver starts with the adapter's current power state and
    /// then carries every power change and discovery.
    pub async fn new(
        adapter_name: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AdapterEvent>), AdapterError> {
        // Initialize Bluetooth session
        let session = bluer::Session::new().await.map_err(|e| {
            error!("Failed to create Bluetooth session: {}", e);
            adapter_error(e)
        })?;

        let adapter = match adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| {
            error!("Failed to get Bluetooth adapter: {}", e);
            adapter_error(e)
        })?;
        debug!("Using Bluetooth adapter {}", adapter.name());

        // Low Energy only, and keep duplicates: sensors re-advertise new readings
        let filter = bluer::DiscoveryFilter {
            transport: bluer::DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        };
        if let Err(e) = adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let powered = adapter.is_powered().await.map_err(adapter_error)?;
        let _ = tx.send(AdapterEvent::PowerStateChange(power_state(powered)));

        let power_watch = tokio::spawn(watch_power(adapter.clone(), tx.clone()));

        Ok((
            Self {
                adapter,
                events: tx,
                discovery: None,
                power_watch,
            },
            rx,
        ))
    }
}

impl Central for BluezCentral {
    fn start_scanning(&mut self) -> Result<(), AdapterError> {
        if self.discovery.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }
        self.discovery = Some(tokio::spawn(discover(
            self.adapter.clone(),
            self.events.clone(),
        )));
        Ok(())
    }

    fn stop_scanning(&mut self) -> Result<(), AdapterError> {
        // Dropping the discovery stream ends the BlueZ discovery session.
        // Only the discovery task itself reports `ScanStop`.
        if let Some(task) = self.discovery.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for BluezCentral {
    fn drop(&mut self) {
        if let Some(task) = self.discovery.take() {
            task.abort();
        }
        self.power_watch.abort();
    }
}

fn adapter_error(e: bluer::Error) -> AdapterError {
    AdapterError::new(e.to_string())
}

fn power_state(powered: bool) -> PowerState {
    if powered {
        PowerState::PoweredOn
    } else {
        PowerState::PoweredOff
    }
}

/// Forward `Powered` property changes until the receiver goes away.
async fn watch_power(adapter: bluer::Adapter, tx: EventSender) {
    let events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            let _ = tx.send(AdapterEvent::Error(format!(
                "Failed to watch adapter power state: {}",
                e
            )));
            return;
        }
    };
    pin_mut!(events);

    while let Some(event) = events.next().await {
        if let bluer::AdapterEvent::PropertyChanged(bluer::AdapterProperty::Powered(powered)) =
            event
        {
            if tx
                .send(AdapterEvent::PowerStateChange(power_state(powered)))
                .is_err()
            {
                break;
            }
        }
    }
}

/// Run one discovery session, reporting every added or changed device.
async fn discover(adapter: bluer::Adapter, tx: EventSender) {
    let stream = match adapter.discover_devices_with_changes().await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(AdapterEvent::Error(format!(
                "Failed to start device discovery: {}",
                e
            )));
            let _ = tx.send(AdapterEvent::ScanStop);
            return;
        }
    };
    pin_mut!(stream);
    let _ = tx.send(AdapterEvent::ScanStart);

    while let Some(event) = stream.next().await {
        if let bluer::AdapterEvent::DeviceAdded(addr) = event {
            match read_device(&adapter, addr).await {
                Ok(Some(device)) => {
                    if tx.send(AdapterEvent::Discover(device)).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tx.send(AdapterEvent::Warning(format!(
                        "Failed to read advertisement of {}: {}",
                        addr, e
                    )));
                }
            }
        }
    }

    // BlueZ ended discovery on its own
    let _ = tx.send(AdapterEvent::ScanStop);
}

/// Snapshot a device's advertisement. `None` when it carries no service data.
async fn read_device(
    adapter: &bluer::Adapter,
    addr: Address,
) -> bluer::Result<Option<DiscoveredDevice>> {
    let device = adapter.device(addr)?;
    let Some(service_data) = device.service_data().await? else {
        return Ok(None);
    };
    let rssi = device.rssi().await?.unwrap_or_default();

    Ok(Some(DiscoveredDevice {
        id: addr.to_string().replace(':', "").to_lowercase(),
        address: addr.to_string().to_lowercase(),
        rssi,
        service_data: segments(service_data),
        seen_at: OffsetDateTime::now_utc(),
    }))
}

fn segments(service_data: HashMap<Uuid, Vec<u8>>) -> Vec<ServiceDataSegment> {
    service_data
        .into_iter()
        .filter_map(|(uuid, data)| {
            short_uuid(&uuid).map(|service| ServiceDataSegment { service, data })
        })
        .collect()
}

/// Narrow a 128-bit UUID built on the Bluetooth base UUID to its 16-bit id.
fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & ((1u128 << 96) - 1) != BLUETOOTH_BASE_UUID {
        return None;
    }
    u16::try_from(value >> 96).ok()
}
