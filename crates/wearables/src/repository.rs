use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;
use wellzo_database::format_timestamp;

use crate::error::WearableError;
use crate::models::{NewReading, ReadingUpdate, WearableData};
use crate::WearableService;

const COLUMNS: &str =
    "id, user_id, device_id, heart_rate, steps, temperature, battery_level, timestamp";

fn reading_from_row(row: &SqliteRow) -> Result<WearableData, sqlx::Error> {
    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
    Ok(WearableData {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        device_id: row.try_get("device_id")?,
        heart_rate: row.try_get("heart_rate")?,
        steps: row.try_get("steps")?,
        temperature: row.try_get("temperature")?,
        battery_level: row.try_get("battery_level")?,
        timestamp,
    })
}

fn validate(
    device_id: Option<&str>,
    heart_rate: Option<i64>,
    steps: Option<i64>,
    battery_level: Option<i64>,
) -> Result<(), WearableError> {
    if let Some(device_id) = device_id {
        if device_id.trim().is_empty() {
            return Err(WearableError::validation("device_id is required"));
        }
        if device_id.chars().count() > 100 {
            return Err(WearableError::validation(
                "device_id must be at most 100 characters",
            ));
        }
    }
    if heart_rate.is_some_and(|value| !(0..=300).contains(&value)) {
        return Err(WearableError::validation("heart_rate must be between 0 and 300"));
    }
    if steps.is_some_and(|value| value < 0) {
        return Err(WearableError::validation("steps cannot be negative"));
    }
    if battery_level.is_some_and(|value| !(0..=100).contains(&value)) {
        return Err(WearableError::validation(
            "battery_level must be between 0 and 100",
        ));
    }
    Ok(())
}

impl WearableService {
    /// The user's readings, newest first, with the total count.
    pub async fn list_readings(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<WearableData>), WearableError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wearable_data WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM wearable_data WHERE user_id = ? \
             ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let readings = rows
            .iter()
            .map(reading_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((total, readings))
    }

    pub async fn create_reading(
        &self,
        user_id: i64,
        reading: NewReading,
    ) -> Result<WearableData, WearableError> {
        validate(
            Some(&reading.device_id),
            reading.heart_rate,
            reading.steps,
            reading.battery_level,
        )?;

        let timestamp = reading.timestamp.unwrap_or_else(Utc::now);
        let id = sqlx::query(
            "INSERT INTO wearable_data \
             (user_id, device_id, heart_rate, steps, temperature, battery_level, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(reading.device_id.trim())
        .bind(reading.heart_rate)
        .bind(reading.steps)
        .bind(reading.temperature)
        .bind(reading.battery_level)
        .bind(format_timestamp(timestamp))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(user_id, reading_id = id, "wearable reading stored");
        self.get_reading(user_id, id).await
    }

    pub async fn get_reading(&self, user_id: i64, id: i64) -> Result<WearableData, WearableError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM wearable_data WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WearableError::NotFound)?;

        Ok(reading_from_row(&row)?)
    }

    pub async fn update_reading(
        &self,
        user_id: i64,
        id: i64,
        update: ReadingUpdate,
    ) -> Result<WearableData, WearableError> {
        validate(
            update.device_id.as_deref(),
            update.heart_rate,
            update.steps,
            update.battery_level,
        )?;

        let updated = sqlx::query(
            "UPDATE wearable_data SET \
             device_id = COALESCE(?, device_id), \
             heart_rate = COALESCE(?, heart_rate), \
             steps = COALESCE(?, steps), \
             temperature = COALESCE(?, temperature), \
             battery_level = COALESCE(?, battery_level) \
             WHERE id = ? AND user_id = ?",
        )
        .bind(update.device_id.as_deref().map(str::trim))
        .bind(update.heart_rate)
        .bind(update.steps)
        .bind(update.temperature)
        .bind(update.battery_level)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(WearableError::NotFound);
        }
        self.get_reading(user_id, id).await
    }

    pub async fn delete_reading(&self, user_id: i64, id: i64) -> Result<(), WearableError> {
        let deleted = sqlx::query("DELETE FROM wearable_data WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(WearableError::NotFound);
        }
        debug!(user_id, reading_id = id, "wearable reading deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_values() {
        assert!(validate(Some(""), None, None, None).is_err());
        assert!(validate(None, Some(301), None, None).is_err());
        assert!(validate(None, None, Some(-1), None).is_err());
        assert!(validate(None, None, None, Some(101)).is_err());
        assert!(validate(Some("nrf-1"), Some(72), Some(0), Some(100)).is_ok());
    }
}
