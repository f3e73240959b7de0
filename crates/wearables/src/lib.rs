//! Wearable readings for the Wellzo backend: per-user storage plus
//! collection from Nordic UART devices over Bluetooth LE.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{info, warn};
use wellzo_config::WearablesConfig;

mod repository;

pub mod ble;
pub mod error;
pub mod models;
pub mod parser;

pub use ble::{default_transport, Advertisement, BleTransport, UnavailableTransport};
#[cfg(feature = "bluetooth")]
pub use ble::BtleplugTransport;
pub use error::{BleError, WearableError};
pub use models::{
    ConnectedDevice, DiscoveredDevice, NewReading, ParsedReading, ReadingUpdate, WearableData,
};
pub use parser::parse_payloads;

const UNKNOWN_DEVICE_NAME: &str = "Unknown";

#[derive(Clone)]
pub struct WearableService {
    pool: SqlitePool,
    transport: Arc<dyn BleTransport>,
    scan_window: Duration,
    read_window: Duration,
    name_filters: Vec<String>,
}

impl WearableService {
    pub fn new(pool: SqlitePool, transport: Arc<dyn BleTransport>, config: &WearablesConfig) -> Self {
        Self {
            pool,
            transport,
            scan_window: Duration::from_secs(config.scan_seconds),
            read_window: Duration::from_secs(config.read_window_seconds),
            name_filters: config.name_filters.clone(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Nearby devices whose advertised name contains one of the configured
    /// filters. With no filters every device is listed.
    pub async fn scan(&self) -> Result<Vec<DiscoveredDevice>, WearableError> {
        let seen = self.transport.scan(self.scan_window).await?;
        let devices: Vec<DiscoveredDevice> = seen
            .into_iter()
            .filter(|device| self.matches_filters(device.name.as_deref()))
            .map(|device| DiscoveredDevice {
                address: device.address,
                name: device
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
                rssi: device.rssi,
            })
            .collect();
        info!(found = devices.len(), "ble scan finished");
        Ok(devices)
    }

    fn matches_filters(&self, name: Option<&str>) -> bool {
        if self.name_filters.is_empty() {
            return true;
        }
        name.is_some_and(|name| self.name_filters.iter().any(|filter| name.contains(filter.as_str())))
    }

    /// Request a reading from the device and store it for `user_id`.
    pub async fn collect(
        &self,
        user_id: i64,
        address: Option<&str>,
    ) -> Result<WearableData, WearableError> {
        let address = require_address(address)?;

        let payloads = self
            .transport
            .exchange(address, ble::READ_DATA_COMMAND, self.read_window)
            .await?;
        let reading = parse_payloads(&payloads);
        if reading.is_empty() {
            warn!(address, payloads = payloads.len(), "device returned no readings");
            return Err(WearableError::NoReadings);
        }

        let stored = self
            .create_reading(
                user_id,
                NewReading {
                    device_id: address.to_string(),
                    heart_rate: reading.heart_rate,
                    steps: reading.steps,
                    temperature: reading.temperature,
                    battery_level: reading.battery_level,
                    timestamp: None,
                },
            )
            .await?;
        info!(user_id, address, reading_id = stored.id, "wearable data collected");
        Ok(stored)
    }

    /// Connect and read the device's TX characteristic once.
    pub async fn connect_device(
        &self,
        address: Option<&str>,
    ) -> Result<ConnectedDevice, WearableError> {
        let address = require_address(address)?;
        let value = self.transport.read_once(address).await?;
        Ok(ConnectedDevice {
            status: "connected".to_string(),
            data: value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        })
    }
}

fn require_address(address: Option<&str>) -> Result<&str, WearableError> {
    address
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .ok_or_else(|| WearableError::validation("Device address required"))
}
