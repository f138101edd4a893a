//! Integration test: core 0 writes reach the core 1 replica.
//!
//! Core 0 ingests DMX and publishes every change as a record; after a few
//! iterations core 1's replica must hold the same targets, positions,
//! packet timestamp and eye profile.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rs5_common::config::DeviceConfig;
use rs5_common::consts::SERVO_CHANNELS;
use rs5_common::record::fields::ServoRuntimeField;
use rs5_common::record::{Address, ArrayIdent, Record, Value};
use rs5_common::state::RunMode;
use rs5_dualcore::channel::Mailbox;
use rs5_dualcore::cycle::{
    Core0, Core1, DMX_UNIVERSE, DirectServo, DmxFrame, DmxSource, FixedSwitch, NullOutput,
};
use rs5_dualcore::domain::{DeviceState, SyncCounters};
use rs5_dualcore::status::StatusSignal;

/// Repeats one packet while `live` is set.
struct FixedDmx {
    frame: DmxFrame,
    live: Arc<AtomicBool>,
}

impl DmxSource for FixedDmx {
    fn poll(&mut self, _now: u32) -> Option<DmxFrame> {
        self.live
            .load(Ordering::Relaxed)
            .then(|| self.frame.clone())
    }
}

/// Servo slots 1-4 plus the island 0 eye slot (494).
fn packet() -> DmxFrame {
    let mut frame = DmxFrame::new();
    frame.resize(DMX_UNIVERSE, 0).unwrap();
    frame[0] = 255;
    frame[1] = 0;
    frame[2] = 128;
    frame[3] = 64;
    frame[4] = 200;
    frame[5] = 200;
    // Profile 6 covers 71..=80.
    frame[493] = 75;
    frame
}

fn licensed_config() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.system.licensed_channels = 4;
    config
}

#[test]
fn dmx_changes_replicate_to_core1() {
    let config = licensed_config();
    let d0 = DeviceState::new(&config, 0);
    let d1 = DeviceState::new(&config, 0);
    let mut to_core1 = Mailbox::new();
    let mut to_core0 = Mailbox::new();
    let (tx0, rx1) = to_core1.split(&d0.counters);
    let (tx1, rx0) = to_core0.split(&d1.counters);

    let live = Arc::new(AtomicBool::new(true));
    let dmx = FixedDmx {
        frame: packet(),
        live: live.clone(),
    };
    let switch = FixedSwitch {
        run_mode: RunMode::Dmx,
        dmx_address: Some(1),
    };
    let mut core0 = Core0::new(&d0, tx0, rx0, dmx, switch, DirectServo::default());
    let mut core1 = Core1::new(
        &d1,
        tx1,
        rx1,
        StatusSignal::new(&config.status),
        NullOutput,
        NullOutput,
    );
    core0.start();
    core1.start();

    let mut now = 0;
    while now < 40 {
        core0.step(now);
        core1.step(now);
        now += 1;
    }
    assert!(d1.system.boot_phase().is_running());

    // Let core 1 drain what core 0 published last.
    live.store(false, Ordering::Relaxed);
    for _ in 0..4 {
        core0.step(now);
        core1.step(now);
        now += 1;
    }

    for ch in 0..SERVO_CHANNELS {
        let a = d0.servo_runtime.channel(ch).unwrap();
        let b = d1.servo_runtime.channel(ch).unwrap();
        assert_eq!(a.target(), b.target(), "target ch{ch}");
        assert_eq!(a.current(), b.current(), "current ch{ch}");
    }
    let jaw_max = d0.servo_config.limits(0).unwrap().max_deg;
    assert!((d1.servo_runtime.channel(0).unwrap().target() - jaw_max).abs() < 1e-3);

    // Unlicensed channels ignore DMX and hold their start position.
    for ch in 4..SERVO_CHANNELS {
        let start = d0.servo_config.channel(ch).unwrap().start_deg();
        assert_eq!(d1.servo_runtime.channel(ch).unwrap().target(), start);
    }

    assert_eq!(d1.system.last_packet(), d0.system.last_packet());
    assert_ne!(d1.system.last_packet(), 0);
    assert_eq!(d0.system.eye_color_profile(), 6);
    assert_eq!(d1.system.eye_color_profile(), 6);

    let sent = d0.counters.snapshot();
    let received = d1.counters.snapshot();
    assert_eq!(sent.dropped, 0);
    assert_eq!(received.framing, 0);
    assert_eq!(received.unlicensed, 0);
}

#[test]
fn run_mode_switch_replicates() {
    let config = licensed_config();
    let d0 = DeviceState::new(&config, 0);
    let d1 = DeviceState::new(&config, 0);
    let mut to_core1 = Mailbox::new();
    let mut to_core0 = Mailbox::new();
    let (tx0, rx1) = to_core1.split(&d0.counters);
    let (tx1, rx0) = to_core0.split(&d1.counters);

    let switch = FixedSwitch {
        run_mode: RunMode::Demo,
        dmx_address: Some(1),
    };
    let live = Arc::new(AtomicBool::new(false));
    let dmx = FixedDmx {
        frame: packet(),
        live,
    };
    let mut core0 = Core0::new(&d0, tx0, rx0, dmx, switch, DirectServo::default());
    let mut core1 = Core1::new(
        &d1,
        tx1,
        rx1,
        StatusSignal::new(&config.status),
        NullOutput,
        NullOutput,
    );
    core0.start();
    core1.start();

    // The run-mode switch is sampled every 500 ms.
    let mut now = 0;
    while now < 700 {
        core0.step(now);
        core1.step(now);
        now += 10;
    }

    assert_eq!(d0.system.run_mode(), RunMode::Demo);
    assert_eq!(d1.system.run_mode(), RunMode::Demo);
}

#[test]
fn unlicensed_target_is_refused_and_counted() {
    let config = licensed_config();
    let device = DeviceState::new(&config, 0);
    let counters = SyncCounters::new();
    let mut mailbox = Mailbox::new();
    let (mut tx, mut rx) = mailbox.split(&counters);

    let start = device.servo_runtime.channel(5).unwrap().target();
    tx.push(&Record::data(
        Address::new(ArrayIdent::ServoRuntime, 5, ServoRuntimeField::TargetPos as u8),
        Value::Float(12.0),
    ));
    tx.push(&Record::data(
        Address::new(ArrayIdent::ServoRuntime, 1, ServoRuntimeField::TargetPos as u8),
        Value::Float(12.0),
    ));

    let report = rx.drain(&device, |_| {});
    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(device.servo_runtime.channel(5).unwrap().target(), start);
    assert_eq!(device.servo_runtime.channel(1).unwrap().target(), 12.0);
    assert_eq!(device.counters.snapshot().unlicensed, 1);
}
