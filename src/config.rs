use log::debug;
use std::env;
use tokio::time::Duration;

use crate::bluetooth::{DeviceFilter, ScanOptions};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub address: Option<String>,
    pub adapter: Option<String>,
    pub force_discovering: bool,
    pub restart_delay: Duration,
}

impl ScannerConfig {
    /// Load configuration from the environment (and `.env`, if present).
    ///
    /// - `SENSOR_ADDRESS`: only process this device
    /// - `BLUETOOTH_ADAPTER`: adapter name, e.g. `hci1`
    /// - `FORCE_DISCOVERING`: restart scanning after unexpected stops (default true)
    /// - `FORCE_DISCOVERING_DELAY_MS`: delay before that restart (default 2500)
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let address = non_empty("SENSOR_ADDRESS");
        let adapter = non_empty("BLUETOOTH_ADAPTER");

        // Anything but an explicit false keeps discovering
        let force_discovering = match non_empty("FORCE_DISCOVERING") {
            None => true,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        name: "FORCE_DISCOVERING",
                        value,
                    })
                }
            },
        };

        let restart_delay = match non_empty("FORCE_DISCOVERING_DELAY_MS") {
            None => ScanOptions::default().restart_delay,
            Some(value) => match value.parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(source) => {
                    return Err(ConfigError::InvalidDelay {
                        name: "FORCE_DISCOVERING_DELAY_MS",
                        value,
                        source,
                    })
                }
            },
        };

        let config = ScannerConfig {
            address,
            adapter,
            force_discovering,
            restart_delay,
        };
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn filter(&self) -> DeviceFilter {
        DeviceFilter::new(self.address.clone())
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            force_discovering: self.force_discovering,
            restart_delay: self.restart_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ScannerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScannerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.address, None);
        assert_eq!(config.adapter, None);
        assert!(config.force_discovering);
        assert_eq!(config.restart_delay, Duration::from_millis(2500));
        assert_eq!(config.scan_options(), ScanOptions::default());
        assert_eq!(config.filter(), DeviceFilter::any());
    }

    #[test]
    fn test_all_values() {
        let config = load(&[
            ("SENSOR_ADDRESS", " 4C:65:A8:D0:AE:64 "),
            ("BLUETOOTH_ADAPTER", "hci1"),
            ("FORCE_DISCOVERING", "false"),
            ("FORCE_DISCOVERING_DELAY_MS", "500"),
        ])
        .unwrap();
        assert_eq!(config.address.as_deref(), Some("4C:65:A8:D0:AE:64"));
        assert_eq!(config.adapter.as_deref(), Some("hci1"));
        assert!(!config.force_discovering);
        assert_eq!(config.restart_delay, Duration::from_millis(500));
        assert!(config.filter().matches("4c:65:a8:d0:ae:64"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("SENSOR_ADDRESS", ""), ("FORCE_DISCOVERING", " ")]).unwrap();
        assert_eq!(config.address, None);
        assert!(config.force_discovering);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("FORCE_DISCOVERING", "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            load(&[("FORCE_DISCOVERING_DELAY_MS", "-1")]),
            Err(ConfigError::InvalidDelay { .. })
        ));
    }
}
