//! Monitor configuration
//!
//! Layered from an optional TOML file and `DROWSY__SECTION__KEY` environment
//! variables over built-in defaults.

use alerting::{AlertConfig, NotifyConfig, MAX_TIMEOUT_MS};
use camera_capture::{CameraConfig, SourceKind};
use config::{Config, Environment, File, FileFormat};
use dms::{DmsConfig, ScriptSegment};
use frame_relay::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

use crate::MonitorError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Frame relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Frames buffered between capture and processing
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// Processing loop receive timeout; also bounds stop latency
    pub poll_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: frame_relay::DEFAULT_CAPACITY,
            overflow: OverflowPolicy::DropOldest,
            poll_timeout_ms: 100,
        }
    }
}

/// HTTP status server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, MonitorError> {
        self.level
            .parse()
            .map_err(|_| MonitorError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

/// Timeline for the scripted perception backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub segments: Vec<ScriptSegment>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub relay: RelayConfig,
    pub dms: DmsConfig,
    pub alert: AlertConfig,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub scenario: ScenarioConfig,
}

impl MonitorConfig {
    /// Load defaults, then `path` (must exist when given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(toml: &str) -> Result<Self, MonitorError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot start with
    pub fn validate(&self) -> Result<(), MonitorError> {
        let invalid = |msg: String| Err(MonitorError::Invalid(msg));

        if self.camera.fps == 0 {
            return invalid("camera.fps must be greater than zero".into());
        }
        if self.camera.source == SourceKind::Directory && self.camera.replay_dir.is_none() {
            return invalid("camera.replay_dir is required for the directory source".into());
        }

        if self.relay.capacity == 0 {
            return invalid("relay.capacity must be greater than zero".into());
        }
        if self.relay.poll_timeout_ms == 0 {
            return invalid("relay.poll_timeout_ms must be greater than zero".into());
        }

        self.dms
            .validate()
            .map_err(|e| MonitorError::Invalid(e.to_string()))?;

        let alert = &self.alert;
        for (name, value) in [
            ("microsleep_threshold_s", alert.microsleep_threshold_s),
            ("yawn_duration_threshold_s", alert.yawn_duration_threshold_s),
            ("alert_cooldown_s", alert.alert_cooldown_s),
            ("popup_cooldown_s", alert.popup_cooldown_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("alert.{} must be a non-negative number, got {}", name, value));
            }
        }

        let notify = &self.notify;
        if notify.timeout_ms == 0 || notify.timeout_ms > MAX_TIMEOUT_MS {
            return invalid(format!(
                "notify.timeout_ms must be in 1..={}, got {}",
                MAX_TIMEOUT_MS, notify.timeout_ms
            ));
        }
        if !notify.vehicle_speed_kmh.is_finite() || notify.vehicle_speed_kmh < 0.0 {
            return invalid("notify.vehicle_speed_kmh must be non-negative".into());
        }
        if notify.fallback_message.trim().is_empty() {
            return invalid("notify.fallback_message must not be empty".into());
        }

        let mut previous = f64::NEG_INFINITY;
        for segment in &self.scenario.segments {
            if segment.until_s.is_nan() || segment.until_s <= previous {
                return invalid("scenario.segments must have increasing until_s".into());
            }
            previous = segment.until_s;
        }

        self.logging.max_level()?;
        Ok(())
    }
}
