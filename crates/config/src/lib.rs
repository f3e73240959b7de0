use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "wellzo.toml",
    "config/wellzo.toml",
    "wellzo.json",
    "crates/config/wellzo.toml",
    "../wellzo.toml",
    "../config/wellzo.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub otp: OtpConfig,
    pub email: EmailConfig,
    pub cache: CacheConfig,
    pub wearables: WearablesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://wellzo.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Session and token settings.
///
/// ```
/// use wellzo_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.session_ttl_seconds, 86_400);
/// assert_eq!(auth.access_token_ttl_seconds, 3_600);
/// assert!(auth.google.client_id.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_seconds: u64,
    pub session_extension_seconds: u64,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub google: GoogleAuthConfig,
}

/// Signing secret used when none is configured. Only fit for development.
pub const DEFAULT_JWT_SECRET: &str = "wellzo-development-secret-change-me";

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 86_400,
            session_extension_seconds: 86_400,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_issuer: "wellzo".to_string(),
            jwt_audience: "wellzo-clients".to_string(),
            access_token_ttl_seconds: 3_600,
            refresh_token_ttl_seconds: 7 * 86_400,
            google: GoogleAuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub tokeninfo_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }
}

/// One-time password lockout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub expiry_seconds: u64,
    pub max_attempts: u32,
    pub block_seconds: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: 600,
            max_attempts: 5,
            block_seconds: 900,
        }
    }
}

/// Outgoing mail. With `enabled = false` messages are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_email: "no-reply@wellzo.app".to_string(),
            from_name: "Wellzo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub community_stats_ttl_seconds: u64,
    pub trending_ttl_seconds: u64,
    pub user_activity_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            community_stats_ttl_seconds: 300,
            trending_ttl_seconds: 600,
            user_activity_ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WearablesConfig {
    pub scan_seconds: u64,
    pub read_window_seconds: u64,
    pub name_filters: Vec<String>,
}

impl Default for WearablesConfig {
    fn default() -> Self {
        Self {
            scan_seconds: 5,
            read_window_seconds: 2,
            name_filters: vec!["Nordic".to_string(), "nRF".to_string()],
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use wellzo_config::load;
///
/// std::env::remove_var("WELLZO_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = config::Config::try_from(&AppConfig::default())
        .context("unable to serialise default configuration")?;

    let mut builder = config::Config::builder().add_source(defaults);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("WELLZO_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via WELLZO_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WELLZO")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("wearables.name_filters")
            .try_parsing(true),
    );

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(
        http = %format!("{}:{}", config.http.address, config.http.port),
        database = %config.database.url,
        email_enabled = config.email.enabled,
        redis = config.cache.redis_url.is_some(),
        "loaded backend configuration"
    );
    Ok(config)
}
