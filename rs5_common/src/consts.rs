//! System-wide constants for the RS5 workspace.
//!
//! Single source of truth for table sizes and timing defaults.
//! Every per-channel table is sized from [`SERVO_CHANNELS`].

/// Number of physical servo channels. Sizes every per-channel table.
pub const SERVO_CHANNELS: usize = 6;

/// Default number of licensed servo channels.
pub const LICENSED_CHANNELS_DEFAULT: usize = 6;

/// Number of eye "fire" profiles.
pub const EYE_PROFILE_COUNT: usize = 14;

/// Eye profile selected at power-on.
pub const EYE_PROFILE_DEFAULT: usize = 3;

/// Number of status indicator states.
pub const STATUS_STATE_COUNT: usize = 14;

/// Longest char payload carried by one record (servo name / part number).
pub const MAX_CHAR_PAYLOAD: usize = 40;

/// Depth of the inter-core mailbox, in record frames.
pub const MAILBOX_DEPTH: usize = 8;

/// Depth of the producer-side backlog used while the mailbox is full.
pub const BACKLOG_DEPTH: usize = 16;

/// Non-blocking push attempts before a record is deferred to the backlog.
pub const PUSH_ATTEMPTS: u32 = 4;

/// Wait between lock acquisition attempts [ms].
pub const LOCK_RETRY_INTERVAL_MS: u64 = 1;

/// Servo sleep timeout after the last move [ms].
pub const SERVO_SLEEP_DEFAULT_MS: u32 = 2000;

/// A DMX packet older than this is stale [ms].
pub const PACKET_AGE_LIMIT_DEFAULT_MS: u32 = 200;

/// Demo animation tick [ms].
pub const DEMO_INTERVAL_DEFAULT_MS: u32 = 50;

/// DMX-address dip-switch debounce [ms].
pub const DMX_DIP_INTERVAL_DEFAULT_MS: u32 = 500;

/// Run-mode dip-switch debounce [ms].
pub const RUN_MODE_DIP_INTERVAL_DEFAULT_MS: u32 = 500;

/// Servo instrumentation sample rate [ms].
pub const SERVO_SAMPLE_INTERVAL_DEFAULT_MS: u32 = 200;

/// Eye overlay refresh interval [ms].
pub const EYE_UPDATE_INTERVAL_DEFAULT_MS: u32 = 40;

/// Servo supply current sensor full-scale [mA].
pub const SERVO_CURRENT_HIGH: i32 = 2000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rs5/device.toml";
