use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    PgOwner,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::PgOwner => "pg_owner",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Self::Student),
            "pg_owner" => Some(Self::PgOwner),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Human readable label shown next to a user's name.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::PgOwner => "PG Owner",
            Self::Admin => "Admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
    pub profile_picture_url: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    #[serde(skip_serializing)]
    pub has_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) const USER_COLUMNS: &str = "id, public_id, email, name, role, is_active, is_verified, \
     is_staff, profile_picture_url, google_id, password_hash IS NOT NULL AS has_password, \
     last_login_at, created_at";

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: UserRole::parse(&role).unwrap_or_default(),
            is_active: row.try_get("is_active")?,
            is_verified: row.try_get("is_verified")?,
            is_staff: row.try_get("is_staff")?,
            profile_picture_url: row.try_get("profile_picture_url")?,
            google_id: row.try_get("google_id")?,
            has_password: row.try_get("has_password")?,
            last_login_at: row.try_get("last_login_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Password,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSession {
    #[serde(rename = "id")]
    pub public_id: String,
    #[serde(skip_serializing)]
    pub row_id: i64,
    #[serde(skip_serializing)]
    pub session_key: String,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub provider: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub is_active: bool,
}

pub(crate) const SESSION_COLUMNS: &str = "id, public_id, session_key, user_id, provider, \
     user_agent, ip_address, device_name, created_at, expires_at, last_accessed_at, is_active";

impl UserSession {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            row_id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            session_key: row.try_get("session_key")?,
            user_id: row.try_get("user_id")?,
            provider: row.try_get("provider")?,
            user_agent: row.try_get("user_agent")?,
            ip_address: row.try_get("ip_address")?,
            device_name: row.try_get("device_name")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            last_accessed_at: row.try_get("last_accessed_at")?,
            is_active: row.try_get("is_active")?,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub preferred_language: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            full_name: row.try_get("full_name")?,
            age: row.try_get("age")?,
            date_of_birth: row.try_get("date_of_birth")?,
            gender: row.try_get("gender")?,
            nationality: row.try_get("nationality")?,
            state: row.try_get("state")?,
            city: row.try_get("city")?,
            preferred_language: row.try_get("preferred_language")?,
            bio: row.try_get("bio")?,
            location: row.try_get("location")?,
            profile_picture: row.try_get("profile_picture")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Partial profile update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub preferred_language: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Registration {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
}

/// Everything a client needs after a successful sign-in.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthOutcome {
    pub user: User,
    pub tokens: TokenPair,
    pub session: UserSession,
    pub profile: UserProfile,
}
