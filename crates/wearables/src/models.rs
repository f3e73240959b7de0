use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One stored reading from a wearable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WearableData {
    pub id: i64,
    pub user_id: Option<i64>,
    pub device_id: String,
    pub heart_rate: Option<i64>,
    pub steps: Option<i64>,
    pub temperature: Option<f64>,
    pub battery_level: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewReading {
    pub device_id: String,
    #[serde(default)]
    pub heart_rate: Option<i64>,
    #[serde(default)]
    pub steps: Option<i64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<i64>,
    /// Defaults to the time of insertion.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReadingUpdate {
    pub device_id: Option<String>,
    pub heart_rate: Option<i64>,
    pub steps: Option<i64>,
    pub temperature: Option<f64>,
    pub battery_level: Option<i64>,
}

/// Sensor values pulled out of raw device payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedReading {
    pub heart_rate: Option<i64>,
    pub steps: Option<i64>,
    pub temperature: Option<f64>,
    pub battery_level: Option<i64>,
}

impl ParsedReading {
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.steps.is_none()
            && self.temperature.is_none()
            && self.battery_level.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: String,
    pub rssi: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConnectedDevice {
    pub status: String,
    pub data: Option<String>,
}
