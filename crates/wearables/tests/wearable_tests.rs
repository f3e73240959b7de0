use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use wellzo_config::{DatabaseConfig, WearablesConfig};
use wellzo_database::format_timestamp;
use wellzo_wearables::{
    Advertisement, BleError, BleTransport, NewReading, ReadingUpdate, UnavailableTransport,
    WearableError, WearableService,
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Default)]
struct FakeTransport {
    advertisements: Vec<Advertisement>,
    payloads: Vec<Vec<u8>>,
    tx_value: Option<Vec<u8>>,
    fail_with: Option<String>,
    commands: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl BleTransport for FakeTransport {
    async fn scan(&self, _window: Duration) -> Result<Vec<Advertisement>, BleError> {
        Ok(self.advertisements.clone())
    }

    async fn exchange(
        &self,
        address: &str,
        command: &[u8],
        _window: Duration,
    ) -> Result<Vec<Vec<u8>>, BleError> {
        if let Some(reason) = &self.fail_with {
            return Err(BleError::Transport(reason.clone()));
        }
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((address.to_string(), command.to_vec()));
        }
        Ok(self.payloads.clone())
    }

    async fn read_once(&self, _address: &str) -> Result<Option<Vec<u8>>, BleError> {
        if let Some(reason) = &self.fail_with {
            return Err(BleError::DeviceNotFound(reason.clone()));
        }
        Ok(self.tx_value.clone())
    }
}

struct TestContext {
    pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("wearables.sqlite");
        let pool = wellzo_database::initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 5,
        })
        .await?;
        Ok(Self {
            pool,
            _temp_dir: temp_dir,
        })
    }

    fn service(&self, transport: FakeTransport) -> WearableService {
        WearableService::new(
            self.pool.clone(),
            Arc::new(transport),
            &WearablesConfig::default(),
        )
    }

    async fn user(&self, handle: &str) -> TestResult<i64> {
        let now = format_timestamp(Utc::now());
        Ok(sqlx::query(
            "INSERT INTO users (public_id, email, name, is_active, is_verified, created_at, updated_at) \
             VALUES (?, ?, ?, 1, 1, ?, ?)",
        )
        .bind(format!("pub-{handle}"))
        .bind(format!("{handle}@example.com"))
        .bind(handle)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }
}

fn advertisement(address: &str, name: Option<&str>) -> Advertisement {
    Advertisement {
        address: address.to_string(),
        name: name.map(str::to_string),
        rssi: Some(-60),
    }
}

#[tokio::test]
async fn scan_keeps_nordic_devices_only() -> TestResult {
    let ctx = TestContext::new().await?;
    let service = ctx.service(FakeTransport {
        advertisements: vec![
            advertisement("AA:01", Some("Nordic_UART")),
            advertisement("AA:02", Some("nRF52 Band")),
            advertisement("AA:03", Some("Headphones")),
            advertisement("AA:04", None),
        ],
        ..FakeTransport::default()
    });

    let devices = service.scan().await?;
    let addresses: Vec<_> = devices.iter().map(|d| d.address.as_str()).collect();
    assert_eq!(addresses, vec!["AA:01", "AA:02"]);
    assert_eq!(devices[1].name, "nRF52 Band");
    Ok(())
}

#[tokio::test]
async fn scan_without_filters_names_unknown_devices() -> TestResult {
    let ctx = TestContext::new().await?;
    let service = WearableService::new(
        ctx.pool.clone(),
        Arc::new(FakeTransport {
            advertisements: vec![advertisement("AA:04", None)],
            ..FakeTransport::default()
        }),
        &WearablesConfig {
            name_filters: Vec::new(),
            ..WearablesConfig::default()
        },
    );

    let devices = service.scan().await?;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Unknown");
    Ok(())
}

#[tokio::test]
async fn collect_sends_read_command_and_stores_reading() -> TestResult {
    let ctx = TestContext::new().await?;
    let user = ctx.user("walker").await?;
    let transport = Arc::new(FakeTransport {
        payloads: vec![
            b"{\"heart_rate\": 71, \"steps\": 4200}\n".to_vec(),
            b"noise\n{\"heart_rate\": 75, \"temperature\": 36.4}".to_vec(),
        ],
        ..FakeTransport::default()
    });
    let service = WearableService::new(
        ctx.pool.clone(),
        transport.clone(),
        &WearablesConfig::default(),
    );

    let reading = service.collect(user, Some(" AA:01 ")).await?;
    assert_eq!(reading.device_id, "AA:01");
    assert_eq!(reading.user_id, Some(user));
    assert_eq!(reading.heart_rate, Some(75));
    assert_eq!(reading.steps, Some(4200));
    assert_eq!(reading.temperature, Some(36.4));
    assert_eq!(reading.battery_level, None);

    let commands = transport
        .commands
        .lock()
        .map_err(|_| "command log poisoned")?
        .clone();
    assert_eq!(commands, vec![("AA:01".to_string(), b"READ_DATA\n".to_vec())]);

    let (total, readings) = service.list_readings(user, 20, 0).await?;
    assert_eq!(total, 1);
    assert_eq!(readings[0].id, reading.id);
    Ok(())
}

#[tokio::test]
async fn collect_rejects_missing_address_and_empty_data() -> TestResult {
    let ctx = TestContext::new().await?;
    let user = ctx.user("idle").await?;

    let service = ctx.service(FakeTransport {
        payloads: vec![b"OK\n".to_vec()],
        ..FakeTransport::default()
    });
    assert!(matches!(
        service.collect(user, None).await,
        Err(WearableError::Validation(_))
    ));
    assert!(matches!(
        service.collect(user, Some("  ")).await,
        Err(WearableError::Validation(_))
    ));
    assert!(matches!(
        service.collect(user, Some("AA:01")).await,
        Err(WearableError::NoReadings)
    ));

    let failing = ctx.service(FakeTransport {
        fail_with: Some("connection refused".into()),
        ..FakeTransport::default()
    });
    assert!(matches!(
        failing.collect(user, Some("AA:01")).await,
        Err(WearableError::Ble(BleError::Transport(_)))
    ));

    let (total, _) = service.list_readings(user, 20, 0).await?;
    assert_eq!(total, 0);
    Ok(())
}

#[tokio::test]
async fn connect_device_reads_tx_once() -> TestResult {
    let ctx = TestContext::new().await?;
    let service = ctx.service(FakeTransport {
        tx_value: Some(b"{\"battery_level\": 90}".to_vec()),
        ..FakeTransport::default()
    });

    let connected = service.connect_device(Some("AA:01")).await?;
    assert_eq!(connected.status, "connected");
    assert_eq!(connected.data.as_deref(), Some("{\"battery_level\": 90}"));

    let silent = ctx.service(FakeTransport::default());
    assert_eq!(silent.connect_device(Some("AA:01")).await?.data, None);
    Ok(())
}

#[tokio::test]
async fn unavailable_bluetooth_is_reported() -> TestResult {
    let ctx = TestContext::new().await?;
    let user = ctx.user("nobt").await?;
    let service = WearableService::new(
        ctx.pool.clone(),
        Arc::new(UnavailableTransport::default()),
        &WearablesConfig::default(),
    );

    let err = service
        .collect(user, Some("AA:01"))
        .await
        .err()
        .ok_or("collect should fail")?;
    assert!(err.is_unavailable());
    assert!(service.scan().await.is_err_and(|err| err.is_unavailable()));
    Ok(())
}

#[tokio::test]
async fn readings_are_scoped_to_their_owner() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner").await?;
    let other = ctx.user("other").await?;
    let service = ctx.service(FakeTransport::default());

    let older = service
        .create_reading(
            owner,
            NewReading {
                device_id: "band-1".into(),
                steps: Some(1000),
                timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single().ok_or("date")?),
                ..NewReading::default()
            },
        )
        .await?;
    let newer = service
        .create_reading(
            owner,
            NewReading {
                device_id: "band-1".into(),
                heart_rate: Some(64),
                ..NewReading::default()
            },
        )
        .await?;

    let (total, readings) = service.list_readings(owner, 1, 0).await?;
    assert_eq!(total, 2);
    assert_eq!(readings[0].id, newer.id);
    let (_, second_page) = service.list_readings(owner, 1, 1).await?;
    assert_eq!(second_page[0].id, older.id);

    assert!(matches!(
        service.get_reading(other, older.id).await,
        Err(WearableError::NotFound)
    ));
    assert!(matches!(
        service.delete_reading(other, older.id).await,
        Err(WearableError::NotFound)
    ));
    assert!(matches!(
        service
            .update_reading(other, older.id, ReadingUpdate::default())
            .await,
        Err(WearableError::NotFound)
    ));
    assert_eq!(service.list_readings(other, 20, 0).await?.0, 0);
    Ok(())
}

#[tokio::test]
async fn partial_update_keeps_other_fields() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("patcher").await?;
    let service = ctx.service(FakeTransport::default());

    let reading = service
        .create_reading(
            owner,
            NewReading {
                device_id: "band-2".into(),
                heart_rate: Some(80),
                steps: Some(50),
                ..NewReading::default()
            },
        )
        .await?;

    let updated = service
        .update_reading(
            owner,
            reading.id,
            ReadingUpdate {
                steps: Some(75),
                battery_level: Some(40),
                ..ReadingUpdate::default()
            },
        )
        .await?;
    assert_eq!(updated.heart_rate, Some(80));
    assert_eq!(updated.steps, Some(75));
    assert_eq!(updated.battery_level, Some(40));
    assert_eq!(updated.timestamp, reading.timestamp);

    let invalid = service
        .update_reading(
            owner,
            reading.id,
            ReadingUpdate {
                battery_level: Some(140),
                ..ReadingUpdate::default()
            },
        )
        .await;
    assert!(matches!(invalid, Err(WearableError::Validation(_))));

    service.delete_reading(owner, reading.id).await?;
    assert!(matches!(
        service.get_reading(owner, reading.id).await,
        Err(WearableError::NotFound)
    ));
    Ok(())
}
