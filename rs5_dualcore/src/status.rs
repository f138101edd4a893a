//! Status indicator selection and blinking.

use rs5_common::config::StatusSection;
use rs5_common::state::{BootPhase, RunMode};
use rs5_common::status::{StatusColor, StatusState};
use tracing::debug;

use crate::domain::DeviceState;

/// How long servo status reads "start success" after boot completes [ms].
pub const START_SUCCESS_WINDOW_MS: u32 = 1000;

/// Indicator state for one servo channel.
///
/// `running_since` is when this core first saw `Running`.
pub fn servo_status(
    device: &DeviceState,
    channel: usize,
    now: u32,
    running_since: Option<u32>,
) -> StatusState {
    let Some(since) = running_since else {
        return StatusState::ServoStatusStartup;
    };
    if now.wrapping_sub(since) < START_SUCCESS_WINDOW_MS {
        return StatusState::ServoStartSuccess;
    }
    if !device.servo_config.is_licensed(channel) {
        return StatusState::NotLicensed;
    }
    match device.servo_runtime.channel(channel) {
        Some(rt) if rt.active() => StatusState::Moving,
        Some(rt) if !rt.pwm_enabled() => StatusState::PwmDisabled,
        Some(_) => StatusState::Still,
        None => StatusState::NotLicensed,
    }
}

/// Picks the board indicator state from boot phase, run mode and freshness.
#[derive(Debug, Clone)]
pub struct StatusSignal {
    enabled: bool,
    servo_channel: usize,
    running_since: Option<u32>,
    last: Option<StatusState>,
}

impl StatusSignal {
    pub fn new(section: &StatusSection) -> Self {
        Self {
            enabled: section.enabled,
            servo_channel: usize::from(section.servo_channel),
            running_since: None,
            last: None,
        }
    }

    #[inline]
    pub fn running_since(&self) -> Option<u32> {
        self.running_since
    }

    pub fn select(&mut self, device: &DeviceState, now: u32) -> StatusState {
        let system = &device.system;
        let phase = system.boot_phase();
        if phase.is_running() && self.running_since.is_none() {
            self.running_since = Some(now);
        }

        let state = if !self.enabled {
            StatusState::Off
        } else {
            match phase {
                BootPhase::Core0SetupA | BootPhase::Core1SetupA => StatusState::Boot,
                BootPhase::Core0SetupB => StatusState::ServoStartup,
                BootPhase::Running => match system.run_mode() {
                    RunMode::Dmx if system.is_dmx_fresh(now) => StatusState::DmxReceive,
                    RunMode::Dmx => StatusState::DmxBad,
                    RunMode::Serial if system.is_dmx_fresh(now) => StatusState::UsbReceive,
                    RunMode::Serial => StatusState::UsbBad,
                    RunMode::Demo => StatusState::Demo,
                    RunMode::Program | RunMode::Pause => {
                        servo_status(device, self.servo_channel, now, self.running_since)
                    }
                },
            }
        };

        if self.last != Some(state) {
            debug!(?state, "status indicator");
            self.last = Some(state);
        }
        state
    }
}

/// Turns a state into on/off output at the state's blink interval.
#[derive(Debug, Clone, Default)]
pub struct StatusBlinker {
    state: Option<StatusState>,
    lit: bool,
    last_toggle: u32,
}

impl StatusBlinker {
    pub const fn new() -> Self {
        Self {
            state: None,
            lit: false,
            last_toggle: 0,
        }
    }

    /// Output for `now`. A new state starts lit.
    pub fn tick(&mut self, state: StatusState, now: u32) -> StatusColor {
        let pattern = state.pattern();
        if self.state != Some(state) {
            self.state = Some(state);
            self.lit = true;
            self.last_toggle = now;
        } else if now.wrapping_sub(self.last_toggle) > pattern.interval_ms {
            self.lit = !self.lit;
            self.last_toggle = now;
        }
        if self.lit { pattern.color } else { StatusColor::OFF }
    }
}
