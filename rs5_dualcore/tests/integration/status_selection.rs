//! Integration test: status indicator selection driven by replicated
//! records rather than direct setters.

use rs5_common::config::{DeviceConfig, StatusSection};
use rs5_common::record::fields::SystemField;
use rs5_common::record::{Address, ArrayIdent, Record, SystemChange, Value};
use rs5_common::state::{BootPhase, RunMode};
use rs5_common::status::{StatusColor, StatusState};
use rs5_dualcore::dispatch::apply_record;
use rs5_dualcore::domain::DeviceState;
use rs5_dualcore::status::{START_SUCCESS_WINDOW_MS, StatusBlinker, StatusSignal};

fn running(mode: RunMode) -> DeviceState {
    let device = DeviceState::new(&DeviceConfig::default(), 0);
    device.system.set_boot_phase(BootPhase::Running);
    apply_record(&Record::system(SystemChange::Run(mode)), &device).unwrap();
    device
}

fn packet_at(device: &DeviceState, now: u32) {
    let record = Record::data(
        Address::new(ArrayIdent::SystemState, SystemField::LastPacketTimestamp as u8, 0),
        Value::Int(now as i32),
    );
    apply_record(&record, device).unwrap();
}

#[test]
fn serial_freshness_follows_packet_age() {
    let device = running(RunMode::Serial);
    let mut signal = StatusSignal::new(&StatusSection::default());
    packet_at(&device, 5_000);
    assert_eq!(signal.select(&device, 5_199), StatusState::UsbReceive);
    assert_eq!(signal.select(&device, 5_201), StatusState::UsbBad);

    packet_at(&device, 5_300);
    assert_eq!(signal.select(&device, 5_310), StatusState::UsbReceive);
}

#[test]
fn demo_mode_has_its_own_state() {
    let device = running(RunMode::Demo);
    let mut signal = StatusSignal::new(&StatusSection::default());
    assert_eq!(signal.select(&device, 0), StatusState::Demo);
}

#[test]
fn pause_reports_selected_servo() {
    let device = running(RunMode::Pause);
    let section = StatusSection {
        servo_channel: 1,
        ..StatusSection::default()
    };
    let mut signal = StatusSignal::new(&section);
    assert_eq!(signal.select(&device, 100), StatusState::ServoStartSuccess);

    let later = 100 + START_SUCCESS_WINDOW_MS;
    device
        .servo_runtime
        .refresh_activity(1, later + 5_000, &device.servo_config);
    assert_eq!(signal.select(&device, later + 5_000), StatusState::PwmDisabled);
}

#[test]
fn mode_change_mid_run_switches_state() {
    let device = running(RunMode::Dmx);
    let mut signal = StatusSignal::new(&StatusSection::default());
    assert_eq!(signal.select(&device, 10_000), StatusState::DmxBad);

    apply_record(&Record::system(SystemChange::Run(RunMode::Demo)), &device).unwrap();
    assert_eq!(signal.select(&device, 10_001), StatusState::Demo);
}

#[test]
fn blinker_follows_selected_state() {
    let device = running(RunMode::Demo);
    let mut signal = StatusSignal::new(&StatusSection::default());
    let mut blinker = StatusBlinker::new();

    let state = signal.select(&device, 0);
    let pattern = state.pattern();
    assert_eq!(blinker.tick(state, 0), pattern.color);
    assert_eq!(
        blinker.tick(state, pattern.interval_ms + 1),
        StatusColor::OFF
    );
}
