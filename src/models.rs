//! Data models for GPS fixes, device status logs and relay state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Maximum length of a device identifier.
pub const DEVICE_ID_MAX_LEN: usize = 100;

/// Maximum length of a status log `code`.
pub const STATUS_CODE_MAX_LEN: usize = 50;

/// A rejected field in a request body.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Stored GPS fix as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GpsFix {
    // ---
    pub id: i64,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub altitude: f64,
    /// Degrees, `0..360`.
    pub course: f64,
    /// km/h.
    pub speed: f64,
    pub ignition_on: bool,
    pub timestamp: DateTime<Utc>,
}

/// GPS fix as reported by a device. The timestamp is assigned on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct GpsFixInput {
    // ---
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub ignition_on: bool,
}

impl GpsFixInput {
    // ---
    pub fn validate(&self) -> Result<(), ValidationError> {
        // ---
        validate_device_id(&self.device_id)?;

        for (field, value) in [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("altitude", self.altitude),
            ("course", self.course),
            ("speed", self.speed),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::new(field, "must be a finite number"));
            }
        }

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::new("latitude", "must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::new("longitude", "must be between -180 and 180"));
        }
        if !(0.0..360.0).contains(&self.course) {
            return Err(ValidationError::new("course", "must be in [0, 360)"));
        }
        if self.speed < 0.0 {
            return Err(ValidationError::new("speed", "must not be negative"));
        }

        Ok(())
    }
}

fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if device_id.trim().is_empty() {
        return Err(ValidationError::new("device_id", "must not be empty"));
    }
    if device_id.chars().count() > DEVICE_ID_MAX_LEN {
        return Err(ValidationError::new(
            "device_id",
            format!("must be at most {DEVICE_ID_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

/// Hardware module a status log entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceModule {
    Nodemcu,
    Neo6m,
    Sim800l,
    Wifi,
}

impl DeviceModule {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceModule::Nodemcu => "NODEMCU",
            DeviceModule::Neo6m => "NEO6M",
            DeviceModule::Sim800l => "SIM800L",
            DeviceModule::Wifi => "WIFI",
        }
    }
}

/// Severity or condition reported by a device module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    WaitingGps,
    GpsLost,
    LowBattery,
    NetworkIssue,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::WaitingGps => "WAITING_GPS",
            LogStatus::GpsLost => "GPS_LOST",
            LogStatus::LowBattery => "LOW_BATTERY",
            LogStatus::NetworkIssue => "NETWORK_ISSUE",
            LogStatus::Info => "INFO",
            LogStatus::Warning => "WARNING",
            LogStatus::Error => "ERROR",
        }
    }
}

/// Stored device status log entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeviceStatusLog {
    // ---
    pub id: i64,
    pub device_id: String,
    pub module: String,
    pub status: String,
    pub message: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Status log entry as reported by a device
#[derive(Debug, Clone, Deserialize)]
pub struct StatusLogInput {
    // ---
    pub device_id: String,
    pub module: DeviceModule,
    #[serde(default)]
    pub status: LogStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: String,
}

impl StatusLogInput {
    // ---
    pub fn validate(&self) -> Result<(), ValidationError> {
        // ---
        validate_device_id(&self.device_id)?;
        if self.code.chars().count() > STATUS_CODE_MAX_LEN {
            return Err(ValidationError::new(
                "code",
                format!("must be at most {STATUS_CODE_MAX_LEN} characters"),
            ));
        }
        Ok(())
    }
}

/// Relay state of a registered device
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    // ---
    pub device_id: String,
    pub relay_state: bool,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/relay/{device_id}/set`
#[derive(Debug, Deserialize)]
pub struct RelayUpdate {
    pub relay_state: bool,
}
