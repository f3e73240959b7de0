//! Bluetooth LE access through the Nordic UART Service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BleError;

pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
/// Written by the host.
pub const NUS_RX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
/// Notified by the device.
pub const NUS_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

pub const READ_DATA_COMMAND: &[u8] = b"READ_DATA\n";

/// A peripheral seen during a scan, before any name filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

#[async_trait]
pub trait BleTransport: Send + Sync {
    async fn scan(&self, window: Duration) -> Result<Vec<Advertisement>, BleError>;

    /// Connect, subscribe to TX, write `command` to RX and gather every
    /// notification received within `window`. The device is released
    /// before returning.
    async fn exchange(
        &self,
        address: &str,
        command: &[u8],
        window: Duration,
    ) -> Result<Vec<Vec<u8>>, BleError>;

    /// Connect and read the TX characteristic once.
    async fn read_once(&self, address: &str) -> Result<Option<Vec<u8>>, BleError>;
}

/// Stand-in used when the host has no Bluetooth support.
#[derive(Debug, Clone, Default)]
pub struct UnavailableTransport {
    reason: String,
}

impl UnavailableTransport {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> BleError {
        if self.reason.is_empty() {
            BleError::Unavailable("bluetooth support is not enabled in this build".to_string())
        } else {
            BleError::Unavailable(self.reason.clone())
        }
    }
}

#[async_trait]
impl BleTransport for UnavailableTransport {
    async fn scan(&self, _window: Duration) -> Result<Vec<Advertisement>, BleError> {
        Err(self.error())
    }

    async fn exchange(
        &self,
        _address: &str,
        _command: &[u8],
        _window: Duration,
    ) -> Result<Vec<Vec<u8>>, BleError> {
        Err(self.error())
    }

    async fn read_once(&self, _address: &str) -> Result<Option<Vec<u8>>, BleError> {
        Err(self.error())
    }
}

#[cfg(feature = "bluetooth")]
pub use native::BtleplugTransport;

#[cfg(feature = "bluetooth")]
mod native {
    use std::time::Duration;

    use async_trait::async_trait;
    use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
    use btleplug::platform::{Adapter, Manager, Peripheral};
    use futures_util::StreamExt;
    use tracing::{debug, warn};

    use super::{Advertisement, BleTransport, NUS_RX_CHAR_UUID, NUS_SERVICE_UUID, NUS_TX_CHAR_UUID};
    use crate::error::BleError;

    const LOOKUP_SCAN: Duration = Duration::from_secs(2);

    /// Transport over the host's first Bluetooth adapter.
    pub struct BtleplugTransport {
        adapter: Adapter,
    }

    impl BtleplugTransport {
        pub async fn new() -> Result<Self, BleError> {
            let manager = Manager::new().await?;
            let adapter = manager
                .adapters()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BleError::Unavailable("no bluetooth adapter found".to_string()))?;
            Ok(Self { adapter })
        }

        async fn find(&self, address: &str) -> Result<Option<Peripheral>, BleError> {
            for peripheral in self.adapter.peripherals().await? {
                let matches = peripheral.address().to_string().eq_ignore_ascii_case(address)
                    || peripheral.id().to_string().eq_ignore_ascii_case(address);
                if matches {
                    return Ok(Some(peripheral));
                }
            }
            Ok(None)
        }

        /// Look the device up among known peripherals, scanning briefly when
        /// it has not been seen yet.
        async fn peripheral(&self, address: &str) -> Result<Peripheral, BleError> {
            if let Some(peripheral) = self.find(address).await? {
                return Ok(peripheral);
            }
            self.adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(LOOKUP_SCAN).await;
            self.adapter.stop_scan().await?;
            self.find(address)
                .await?
                .ok_or_else(|| BleError::DeviceNotFound(address.to_string()))
        }

        async fn connect(&self, address: &str) -> Result<Peripheral, BleError> {
            let peripheral = self.peripheral(address).await?;
            if !peripheral.is_connected().await? {
                peripheral.connect().await?;
            }
            peripheral.discover_services().await?;
            debug!(address, "ble device connected");
            Ok(peripheral)
        }

        async fn release(peripheral: &Peripheral) {
            if let Err(err) = peripheral.disconnect().await {
                warn!(error = %err, "failed to disconnect ble device");
            }
        }
    }

    fn characteristic(
        peripheral: &Peripheral,
        uuid: uuid::Uuid,
        label: &'static str,
    ) -> Result<Characteristic, BleError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid && c.service_uuid == NUS_SERVICE_UUID)
            .ok_or(BleError::MissingCharacteristic(label))
    }

    async fn gather(
        peripheral: &Peripheral,
        command: &[u8],
        window: Duration,
    ) -> Result<Vec<Vec<u8>>, BleError> {
        let tx = characteristic(peripheral, NUS_TX_CHAR_UUID, "TX")?;
        let rx = characteristic(peripheral, NUS_RX_CHAR_UUID, "RX")?;

        peripheral.subscribe(&tx).await?;
        let mut notifications = peripheral.notifications().await?;
        peripheral.write(&rx, command, WriteType::WithResponse).await?;

        let deadline = tokio::time::Instant::now() + window;
        let mut payloads = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, notifications.next()).await {
                Ok(Some(notification)) if notification.uuid == NUS_TX_CHAR_UUID => {
                    payloads.push(notification.value);
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        peripheral.unsubscribe(&tx).await?;
        Ok(payloads)
    }

    #[async_trait]
    impl BleTransport for BtleplugTransport {
        async fn scan(&self, window: Duration) -> Result<Vec<Advertisement>, BleError> {
            self.adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(window).await;
            self.adapter.stop_scan().await?;

            let mut found = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                let properties = peripheral.properties().await?;
                found.push(Advertisement {
                    address: peripheral.address().to_string(),
                    name: properties.as_ref().and_then(|p| p.local_name.clone()),
                    rssi: properties.and_then(|p| p.rssi),
                });
            }
            Ok(found)
        }

        async fn exchange(
            &self,
            address: &str,
            command: &[u8],
            window: Duration,
        ) -> Result<Vec<Vec<u8>>, BleError> {
            let peripheral = self.connect(address).await?;
            let result = gather(&peripheral, command, window).await;
            Self::release(&peripheral).await;
            result
        }

        async fn read_once(&self, address: &str) -> Result<Option<Vec<u8>>, BleError> {
            let peripheral = self.connect(address).await?;
            let result = match characteristic(&peripheral, NUS_TX_CHAR_UUID, "TX") {
                Ok(tx) => peripheral.read(&tx).await.map_err(BleError::from),
                Err(err) => Err(err),
            };
            Self::release(&peripheral).await;
            result.map(|value| (!value.is_empty()).then_some(value))
        }
    }
}

/// The host's Bluetooth stack, or a transport reporting Bluetooth as
/// unavailable when no adapter is present.
#[cfg(feature = "bluetooth")]
pub async fn default_transport() -> Arc<dyn BleTransport> {
    match BtleplugTransport::new().await {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            tracing::warn!(error = %err, "bluetooth adapter unavailable");
            Arc::new(UnavailableTransport::new(err.to_string()))
        }
    }
}

#[cfg(not(feature = "bluetooth"))]
pub async fn default_transport() -> Arc<dyn BleTransport> {
    Arc::new(UnavailableTransport::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nordic_uart_uuids() {
        assert_eq!(
            NUS_SERVICE_UUID.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(
            NUS_TX_CHAR_UUID.to_string(),
            "6e400003-b5a3-f393-e0a9-e50e24dcca9e"
        );
    }

    #[tokio::test]
    async fn unavailable_transport_refuses_everything() {
        let transport = UnavailableTransport::default();
        assert!(matches!(
            transport.scan(Duration::from_millis(1)).await,
            Err(BleError::Unavailable(_))
        ));
        assert!(matches!(
            transport.read_once("AA:BB").await,
            Err(BleError::Unavailable(_))
        ));
    }
}
