use log::{error, info};

use mibeacon_scanner::utils::{format_reading, serial_number};
use mibeacon_scanner::{
    BluezCentral, DeviceInfo, Measurement, Reading, ScanController, ScanError, ScannerConfig,
    SensorListener,
};

/// Logs every reading and error as it arrives.
struct LogListener;

impl LogListener {
    fn log(&self, measurement: Measurement, device: &DeviceInfo) {
        let reading = Reading {
            measurement,
            device: device.clone(),
        };
        info!("{}", format_reading(&reading));
    }
}

impl SensorListener for LogListener {
    fn temperature_change(&mut self, celsius: f32, device: &DeviceInfo) {
        self.log(Measurement::Temperature(celsius), device);
    }

    fn humidity_change(&mut self, percent: f32, device: &DeviceInfo) {
        self.log(Measurement::Humidity(percent), device);
    }

    fn battery_change(&mut self, percent: u8, device: &DeviceInfo) {
        self.log(Measurement::Battery(percent), device);
    }

    fn illuminance_change(&mut self, lux: u32, device: &DeviceInfo) {
        self.log(Measurement::Illuminance(lux), device);
    }

    fn moisture_change(&mut self, percent: u8, device: &DeviceInfo) {
        self.log(Measurement::Moisture(percent), device);
    }

    fn fertility_change(&mut self, micro_siemens_per_cm: u16, device: &DeviceInfo) {
        self.log(Measurement::Fertility(micro_siemens_per_cm), device);
    }

    fn error(&mut self, error: ScanError) {
        error!("{}", error);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ScannerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match &config.address {
        Some(address) => info!("Listening for sensor {}", serial_number(address)),
        None => info!("Listening for all MiBeacon sensors"),
    }

    let (central, events) = match BluezCentral::new(config.adapter.as_deref()).await {
        Ok(central) => central,
        Err(e) => {
            error!("Failed to open Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    let controller = ScanController::new(
        central,
        LogListener,
        config.filter(),
        config.scan_options(),
    );

    // Handle Ctrl+C gracefully
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler, run until the adapter goes away
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    let controller = controller.run(events, rx).await;
    info!(
        "Scanner stopped ({:?}). Exiting gracefully.",
        controller.state()
    );

    Ok(())
}
