//! TOML-based simulator configuration and preset definitions.

use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

/// Top-level simulator configuration parsed from TOML.
///
/// All fields have defaults matching the `default` preset. Load from TOML
/// with [`SimulatorConfig::from_toml_file`] or use
/// [`SimulatorConfig::default_preset`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Global run parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Per charge point session and telemetry parameters.
    #[serde(default)]
    pub charge_point: ChargePointConfig,
    /// Price feed parameters.
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    /// Persistence target.
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Global run parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Master random seed. Drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

/// Per charge point session and telemetry parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargePointConfig {
    /// Lower bound of the session energy draw (kWh, inclusive).
    pub energy_kwh_min: f64,
    /// Upper bound of the session energy draw (kWh, exclusive).
    pub energy_kwh_max: f64,
    /// Lower bound of the per-device delivery rate (percent, inclusive).
    pub delivery_rate_min: u8,
    /// Upper bound of the per-device delivery rate (percent, inclusive).
    pub delivery_rate_max: u8,
    /// Gap between two sessions (seconds).
    pub idle_seconds: u64,
    /// Number of sessions generated as history at startup.
    pub backfill_sessions: usize,
    /// How far back the history window starts (hours).
    pub backfill_hours: u32,
    /// Lower bound of the single price used for the history window.
    pub backfill_price_min: f64,
    /// Upper bound of the single price used for the history window.
    pub backfill_price_max: f64,
}

impl Default for ChargePointConfig {
    fn default() -> Self {
        Self {
            energy_kwh_min: 20.0,
            energy_kwh_max: 40.0,
            delivery_rate_min: 90,
            delivery_rate_max: 100,
            idle_seconds: 5,
            backfill_sessions: 10,
            backfill_hours: 6,
            backfill_price_min: 0.38,
            backfill_price_max: 0.42,
        }
    }
}

/// Largest accepted session energy (kWh).
pub const MAX_ENERGY_KWH: f64 = 1_000.0;
/// Largest accepted gap between sessions (one day).
pub const MAX_IDLE_SECONDS: u64 = 86_400;
/// Largest accepted history window (one year).
pub const MAX_BACKFILL_HOURS: u32 = 8_760;
/// Largest accepted number of history sessions.
pub const MAX_BACKFILL_SESSIONS: usize = 10_000;

impl ChargePointConfig {
    pub fn delivery_band(&self) -> RangeInclusive<u8> {
        self.delivery_rate_min..=self.delivery_rate_max
    }

    pub fn backfill_window(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.backfill_hours))
    }
}

/// Price feed parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceFeedConfig {
    /// Lower bound of the published price (per kWh, inclusive).
    pub price_min: f64,
    /// Upper bound of the published price (per kWh, inclusive).
    pub price_max: f64,
    /// Decimal places prices are rounded to.
    pub decimals: u32,
    /// Time between two publications (seconds).
    pub interval_seconds: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            price_min: 0.38,
            price_max: 0.42,
            decimals: 3,
            interval_seconds: 15 * 60,
        }
    }
}

impl PriceFeedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Which [`EventSink`](crate::sink::EventSink) to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Sqlite,
    Memory,
}

/// Persistence target.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Database file for the SQLite sink.
    pub path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Sqlite,
            path: PathBuf::from("chargecloud.db"),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"charge_point.energy_kwh_min"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl SimulatorConfig {
    /// Returns the default preset: 20-40 kWh sessions, six hours of history,
    /// a new price every 15 minutes.
    pub fn default_preset() -> Self {
        Self::default()
    }

    /// Returns the quick preset: small sessions and a short history window,
    /// handy for watching the live stream without waiting half an hour.
    pub fn quick() -> Self {
        Self {
            charge_point: ChargePointConfig {
                energy_kwh_min: 1.0,
                energy_kwh_max: 2.0,
                backfill_sessions: 3,
                backfill_hours: 1,
                ..ChargePointConfig::default()
            },
            price_feed: PriceFeedConfig {
                interval_seconds: 60,
                ..PriceFeedConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "quick"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default_preset()),
            "quick" => Ok(Self::quick()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut fail = |field: &str, message: &str| {
            errors.push(ConfigError {
                field: field.into(),
                message: message.into(),
            });
        };

        let cp = &self.charge_point;
        if !(cp.energy_kwh_min.is_finite() && cp.energy_kwh_min > 0.0) {
            fail("charge_point.energy_kwh_min", "must be > 0");
        }
        if !(cp.energy_kwh_max.is_finite() && cp.energy_kwh_max >= cp.energy_kwh_min) {
            fail(
                "charge_point.energy_kwh_max",
                "must be >= charge_point.energy_kwh_min",
            );
        }
        if cp.energy_kwh_max > MAX_ENERGY_KWH {
            fail(
                "charge_point.energy_kwh_max",
                &format!("must be <= {MAX_ENERGY_KWH}"),
            );
        }
        if cp.idle_seconds > MAX_IDLE_SECONDS {
            fail(
                "charge_point.idle_seconds",
                &format!("must be <= {MAX_IDLE_SECONDS}"),
            );
        }
        if cp.backfill_hours > MAX_BACKFILL_HOURS {
            fail(
                "charge_point.backfill_hours",
                &format!("must be <= {MAX_BACKFILL_HOURS}"),
            );
        }
        if cp.backfill_sessions > MAX_BACKFILL_SESSIONS {
            fail(
                "charge_point.backfill_sessions",
                &format!("must be <= {MAX_BACKFILL_SESSIONS}"),
            );
        }
        if cp.delivery_rate_max > 100 {
            fail("charge_point.delivery_rate_max", "must be <= 100");
        }
        if cp.delivery_rate_min > cp.delivery_rate_max {
            fail(
                "charge_point.delivery_rate_min",
                "must be <= charge_point.delivery_rate_max",
            );
        }
        check_price_band(
            &mut fail,
            "charge_point.backfill_price",
            cp.backfill_price_min,
            cp.backfill_price_max,
        );

        let feed = &self.price_feed;
        check_price_band(&mut fail, "price_feed.price", feed.price_min, feed.price_max);
        if feed.decimals > 9 {
            fail("price_feed.decimals", "must be <= 9");
        }
        if feed.interval_seconds == 0 {
            fail("price_feed.interval_seconds", "must be > 0");
        }

        if self.sink.kind == SinkKind::Sqlite && self.sink.path.as_os_str().is_empty() {
            fail("sink.path", "must not be empty for the sqlite sink");
        }

        errors
    }
}

fn check_price_band(fail: &mut impl FnMut(&str, &str), prefix: &str, min: f64, max: f64) {
    if !(min.is_finite() && min > 0.0) {
        fail(&format!("{prefix}_min"), "must be > 0");
    }
    if !(max.is_finite() && max >= min) {
        fail(&format!("{prefix}_max"), &format!("must be >= {prefix}_min"));
    }
}
