//! Configuration loading traits and types.
//!
//! Every RS5 binary loads one TOML file into [`DeviceConfig`]. Missing
//! sections fall back to the power-on defaults in [`crate::consts`],
//! [`crate::servo`] and [`crate::eyes`], so an empty file is a valid config.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rs5_common::config::{ConfigError, DeviceConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = DeviceConfig::load_validated(Path::new("device.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    DEMO_INTERVAL_DEFAULT_MS, DMX_DIP_INTERVAL_DEFAULT_MS, EYE_PROFILE_COUNT, EYE_PROFILE_DEFAULT,
    EYE_UPDATE_INTERVAL_DEFAULT_MS, LICENSED_CHANNELS_DEFAULT, MAX_CHAR_PAYLOAD,
    PACKET_AGE_LIMIT_DEFAULT_MS, RUN_MODE_DIP_INTERVAL_DEFAULT_MS, SERVO_CHANNELS,
    SERVO_SAMPLE_INTERVAL_DEFAULT_MS,
};
use crate::eyes::{ISLAND_EYE_ADDRESSES, island_eye_address};
use crate::servo::{SERVO_DEFAULTS, ServoDefaults, ServoFlags, ServoLimits};
use crate::state::{DebugLevel, RunMode};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Log level for host-side logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields every RS5 binary shares.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "rs5-bench-01"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Device instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "rs5".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(invalid("service_name cannot be empty"));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Device Sections ────────────────────────────────────────────────

/// `[system]`: SystemState initial values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemSection {
    /// Run mode used until the dip switches are read.
    pub run_mode: RunMode,
    pub debug_level: DebugLevel,
    /// Servo channel selected for instrumentation.
    pub debug_servo: u8,
    /// First DMX slot of the servo block.
    pub dmx_address: u16,
    /// Number of channels that may be driven.
    pub licensed_channels: usize,
    pub packet_age_limit_ms: u32,
    pub demo_interval_ms: u32,
    pub dmx_dip_interval_ms: u32,
    pub run_mode_dip_interval_ms: u32,
    pub servo_sample_interval_ms: u32,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            debug_level: DebugLevel::default(),
            debug_servo: 0,
            dmx_address: 1,
            licensed_channels: LICENSED_CHANNELS_DEFAULT,
            packet_age_limit_ms: PACKET_AGE_LIMIT_DEFAULT_MS,
            demo_interval_ms: DEMO_INTERVAL_DEFAULT_MS,
            dmx_dip_interval_ms: DMX_DIP_INTERVAL_DEFAULT_MS,
            run_mode_dip_interval_ms: RUN_MODE_DIP_INTERVAL_DEFAULT_MS,
            servo_sample_interval_ms: SERVO_SAMPLE_INTERVAL_DEFAULT_MS,
        }
    }
}

/// `[[servos]]`: one entry per servo channel, in channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoChannelConfig {
    pub name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(flatten)]
    pub limits: ServoLimits,
    pub start_deg: f32,
    pub max_vel: f32,
    pub max_acc: f32,
    pub max_dec: f32,
    pub sleep_ms: u32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    #[serde(default = "yes")]
    pub smooth: bool,
    #[serde(default = "yes")]
    pub analog: bool,
}

fn default_frequency() -> f32 {
    50.0
}

fn yes() -> bool {
    true
}

impl From<&ServoDefaults> for ServoChannelConfig {
    fn from(d: &ServoDefaults) -> Self {
        Self {
            name: d.name.to_string(),
            part_number: String::new(),
            limits: d.limits,
            start_deg: d.start_deg,
            max_vel: d.max_vel,
            max_acc: d.max_acc,
            max_dec: d.max_dec,
            sleep_ms: d.sleep_ms,
            frequency: d.frequency,
            smooth: d.flags.contains(ServoFlags::SMOOTH),
            analog: d.flags.contains(ServoFlags::ANALOG),
        }
    }
}

impl ServoChannelConfig {
    /// Flags for this channel; licensing comes from the channel index.
    pub fn flags(&self, licensed: bool) -> ServoFlags {
        let mut flags = ServoFlags::empty();
        flags.set(ServoFlags::LICENSED, licensed);
        flags.set(ServoFlags::SMOOTH, self.smooth);
        flags.set(ServoFlags::ANALOG, self.analog);
        flags
    }

    fn validate(&self, channel: usize) -> Result<(), ConfigError> {
        let l = &self.limits;
        let ctx = |what: &str| invalid(format!("servo {channel} ({}): {what}", self.name));

        if !ascending(l.min_pwm, l.max_pwm) {
            return Err(ctx("min_pwm must be below max_pwm"));
        }
        if !ascending(l.servo_min_deg, l.servo_max_deg) {
            return Err(ctx("servo_min_deg must be below servo_max_deg"));
        }
        if !ascending(l.min_deg, l.max_deg) {
            return Err(ctx("min_deg must be below max_deg"));
        }
        if l.min_deg < l.servo_min_deg || l.max_deg > l.servo_max_deg {
            return Err(ctx("travel exceeds the servo's mechanical range"));
        }
        if !(l.min_deg..=l.max_deg).contains(&self.start_deg) {
            return Err(ctx("start_deg outside [min_deg, max_deg]"));
        }
        if self.max_vel <= 0.0 || self.max_acc <= 0.0 || self.max_dec <= 0.0 {
            return Err(ctx("velocity and ramps must be positive"));
        }
        if self.frequency <= 0.0 {
            return Err(ctx("frequency must be positive"));
        }
        if self.name.len() > MAX_CHAR_PAYLOAD || self.part_number.len() > MAX_CHAR_PAYLOAD {
            return Err(ctx("name and part_number are limited to 40 bytes"));
        }
        Ok(())
    }
}

fn ascending(lo: f32, hi: f32) -> bool {
    lo < hi
}

fn default_servos() -> Vec<ServoChannelConfig> {
    SERVO_DEFAULTS.iter().map(ServoChannelConfig::from).collect()
}

/// `[eyes]`: eye overlay and profile selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EyeSection {
    /// Power-on fire profile index.
    pub profile: usize,
    pub update_interval_ms: u32,
    /// Island dip-switch setting selecting the eye DMX start address.
    pub island: usize,
}

impl Default for EyeSection {
    fn default() -> Self {
        Self {
            profile: EYE_PROFILE_DEFAULT,
            update_interval_ms: EYE_UPDATE_INTERVAL_DEFAULT_MS,
            island: 0,
        }
    }
}

impl EyeSection {
    /// Eye DMX start address for the configured island.
    pub fn dmx_eye_address(&self) -> u16 {
        island_eye_address(self.island).unwrap_or(ISLAND_EYE_ADDRESSES[0])
    }
}

/// `[status]`: indicator behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusSection {
    /// Indicator off entirely when false.
    pub enabled: bool,
    /// Channel whose servo status the indicator shows outside DMX/USB/demo
    /// modes.
    pub servo_channel: u8,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            enabled: true,
            servo_channel: 0,
        }
    }
}

/// Complete device configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "rs5-bench-01"
///
/// [system]
/// run_mode = "demo"
/// licensed_channels = 4
///
/// [eyes]
/// profile = 7
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub system: SystemSection,
    #[serde(default = "default_servos")]
    pub servos: Vec<ServoChannelConfig>,
    #[serde(default)]
    pub eyes: EyeSection,
    #[serde(default)]
    pub status: StatusSection,
}

impl Default for DeviceConfig {
    /// Built-in power-on configuration.
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            system: SystemSection::default(),
            servos: default_servos(),
            eyes: EyeSection::default(),
            status: StatusSection::default(),
        }
    }
}

impl DeviceConfig {
    /// Load from TOML and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            licensed = config.system.licensed_channels,
            "device configuration loaded"
        );
        Ok(config)
    }

    /// Fail-fast semantic validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.servos.len() != SERVO_CHANNELS {
            return Err(invalid(format!(
                "expected {SERVO_CHANNELS} servo entries, found {}",
                self.servos.len()
            )));
        }
        for (channel, servo) in self.servos.iter().enumerate() {
            servo.validate(channel)?;
        }

        let sys = &self.system;
        if sys.licensed_channels > SERVO_CHANNELS {
            return Err(invalid(format!(
                "licensed_channels {} exceeds {SERVO_CHANNELS}",
                sys.licensed_channels
            )));
        }
        if usize::from(sys.debug_servo) > SERVO_CHANNELS {
            return Err(invalid(format!("debug_servo {} is not a channel", sys.debug_servo)));
        }
        if sys.packet_age_limit_ms == 0 {
            return Err(invalid("packet_age_limit_ms must be positive"));
        }

        if self.eyes.profile >= EYE_PROFILE_COUNT {
            return Err(invalid(format!(
                "eye profile {} outside 0..{EYE_PROFILE_COUNT}",
                self.eyes.profile
            )));
        }
        if island_eye_address(self.eyes.island).is_none() {
            return Err(invalid(format!("unknown island {}", self.eyes.island)));
        }
        if usize::from(self.status.servo_channel) >= SERVO_CHANNELS {
            return Err(invalid(format!(
                "status servo_channel {} is not a channel",
                self.status.servo_channel
            )));
        }
        Ok(())
    }

    /// Whether `channel` falls inside the licensed count.
    #[inline]
    pub fn is_licensed(&self, channel: usize) -> bool {
        channel < self.system.licensed_channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed: TestWrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.servos.len(), SERVO_CHANNELS);
        assert_eq!(config.eyes.dmx_eye_address(), 494);
    }

    #[test]
    fn test_empty_file_is_default_config() {
        let config: DeviceConfig = toml::from_str("").unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = DeviceConfig::load(Path::new("/nonexistent/path/device.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = DeviceConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_licensed_channels_bound() {
        let mut config = DeviceConfig::default();
        config.system.licensed_channels = SERVO_CHANNELS + 1;
        assert!(config.validate().is_err());

        config.system.licensed_channels = 2;
        assert!(config.validate().is_ok());
        assert!(config.is_licensed(1));
        assert!(!config.is_licensed(2));
    }

    #[test]
    fn test_servo_count_mismatch_fails_fast() {
        let mut config = DeviceConfig::default();
        config.servos.pop();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("servo entries"));
    }

    #[test]
    fn test_start_outside_travel_rejected() {
        let mut config = DeviceConfig::default();
        config.servos[0].start_deg = 120.0; // jaw travel is 0..80
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_eye_profile_bound() {
        let mut config = DeviceConfig::default();
        config.eyes.profile = EYE_PROFILE_COUNT;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_servo_flags_from_config() {
        let servo = ServoChannelConfig::from(&SERVO_DEFAULTS[2]);
        assert_eq!(servo.flags(true), ServoFlags::all());
        assert!(!servo.flags(false).contains(ServoFlags::LICENSED));
    }
}
