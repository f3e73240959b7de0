use thiserror::Error;

/// Failures talking to a device over Bluetooth LE.
#[derive(Debug, Error)]
pub enum BleError {
    #[error("bluetooth is unavailable: {0}")]
    Unavailable(String),
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("device does not expose the {0} characteristic")]
    MissingCharacteristic(&'static str),
    #[error("bluetooth error: {0}")]
    Transport(String),
}

#[cfg(feature = "bluetooth")]
impl From<btleplug::Error> for BleError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::PermissionDenied | btleplug::Error::NotSupported(_) => {
                Self::Unavailable(err.to_string())
            }
            btleplug::Error::DeviceNotFound => Self::DeviceNotFound(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum WearableError {
    #[error("{0}")]
    Validation(String),
    #[error("wearable reading not found")]
    NotFound,
    #[error("device sent no readable data")]
    NoReadings,
    #[error(transparent)]
    Ble(#[from] BleError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WearableError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failure comes from a host without a usable BLE stack.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Ble(BleError::Unavailable(_)))
    }
}
