//! Integration test: two-core boot handshake.
//!
//! Both cores start in `Core0SetupA` and must reach `Running` by exchanging
//! Boot records, never moving backwards on the way.

use rs5_common::config::DeviceConfig;
use rs5_common::state::{BootPhase, CoreId, RunMode};
use rs5_dualcore::boot::{BootSequencer, BootStep};
use rs5_dualcore::channel::Mailbox;
use rs5_dualcore::cycle::{Core0, Core1, DirectServo, FixedSwitch, NoDmx, NullOutput};
use rs5_dualcore::domain::{DeviceState, SystemState};
use rs5_dualcore::status::StatusSignal;

fn switch() -> FixedSwitch {
    FixedSwitch {
        run_mode: RunMode::Dmx,
        dmx_address: Some(1),
    }
}

// ── Core Loops ──────────────────────────────────────────────────────

#[test]
fn both_cores_reach_running() {
    let config = DeviceConfig::default();
    let d0 = DeviceState::new(&config, 0);
    let d1 = DeviceState::new(&config, 0);
    let mut to_core1 = Mailbox::new();
    let mut to_core0 = Mailbox::new();
    let (tx0, rx1) = to_core1.split(&d0.counters);
    let (tx1, rx0) = to_core0.split(&d1.counters);

    let mut core0 = Core0::new(&d0, tx0, rx0, NoDmx, switch(), DirectServo::default());
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

    let mut phases = Vec::new();
    for now in 0..20 {
        core0.step(now);
        core1.step(now);
        phases.push((d0.system.boot_phase(), d1.system.boot_phase()));
        if d0.system.boot_phase().is_running() && d1.system.boot_phase().is_running() {
            break;
        }
    }

    assert_eq!(d0.system.boot_phase(), BootPhase::Running);
    assert_eq!(d1.system.boot_phase(), BootPhase::Running);
    for pair in phases.windows(2) {
        assert!(pair[1].0 >= pair[0].0, "core0 regressed: {pair:?}");
        assert!(pair[1].1 >= pair[0].1, "core1 regressed: {pair:?}");
    }
    assert_eq!(d0.counters.snapshot().dropped, 0);
    assert_eq!(d1.counters.snapshot().framing, 0);
}

#[test]
fn startup_puts_licensed_servos_on_start_position() {
    let mut config = DeviceConfig::default();
    config.system.licensed_channels = 2;
    let d0 = DeviceState::new(&config, 0);
    let d1 = DeviceState::new(&config, 0);
    let mut to_core1 = Mailbox::new();
    let mut to_core0 = Mailbox::new();
    let (tx0, rx1) = to_core1.split(&d0.counters);
    let (tx1, rx0) = to_core0.split(&d1.counters);

    let mut core0 = Core0::new(&d0, tx0, rx0, NoDmx, switch(), DirectServo::default());
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
    for now in 0..20 {
        core0.step(now);
        core1.step(now);
    }

    assert!(d0.system.boot_phase().is_running());
    let pulses = core0.servos().pulses;
    assert!(pulses[0] > 0.0);
    assert!(pulses[1] > 0.0);
    // Unlicensed channels never get a pulse.
    assert_eq!(pulses[4], 0.0);
    assert_eq!(pulses[5], 0.0);
}

// ── Sequencer Pair ──────────────────────────────────────────────────

fn system() -> SystemState {
    let s = SystemState::from_config(&DeviceConfig::default());
    s.domain().init();
    s
}

/// Drive one sequencer pair, delivering each announced phase to the peer
/// twice and in reverse order per round.
#[test]
fn duplicated_and_reordered_reports_still_converge() {
    let sys0 = system();
    let sys1 = system();
    let mut seq0 = BootSequencer::new(CoreId::Core0);
    let mut seq1 = BootSequencer::new(CoreId::Core1);
    let mut to_core0 = vec![BootPhase::Core0SetupA];
    let mut to_core1 = vec![BootPhase::Core0SetupA];

    for _ in 0..10 {
        for phase in to_core0.drain(..).rev() {
            seq0.on_peer(phase);
            seq0.on_peer(phase);
        }
        for phase in to_core1.drain(..).rev() {
            seq1.on_peer(phase);
            seq1.on_peer(phase);
        }

        if seq0.needs_local_work(&sys0) {
            seq0.complete_local();
        }
        if seq1.needs_local_work(&sys1) {
            seq1.complete_local();
        }
        if let BootStep::Advanced(p) = seq0.poll(&sys0) {
            // Stale report for the peer alongside the fresh one.
            to_core1.extend([BootPhase::Core0SetupA, p]);
        }
        if let BootStep::Advanced(p) = seq1.poll(&sys1) {
            to_core0.extend([BootPhase::Core0SetupA, p]);
        }
    }

    assert_eq!(sys0.boot_phase(), BootPhase::Running);
    assert_eq!(sys1.boot_phase(), BootPhase::Running);
    assert_eq!(seq0.peer_phase(), Some(BootPhase::Running));
}

#[test]
fn core1_never_leaves_setup_without_peer() {
    let sys = system();
    let mut seq = BootSequencer::new(CoreId::Core1);
    for _ in 0..5 {
        assert_eq!(seq.poll(&sys), BootStep::AwaitingPeer(BootPhase::Core0SetupA));
    }
    // A report of the phase core 1 is already in is not enough.
    seq.on_peer(BootPhase::Core0SetupA);
    assert_eq!(seq.poll(&sys), BootStep::AwaitingPeer(BootPhase::Core0SetupA));
    assert_eq!(sys.boot_phase(), BootPhase::Core0SetupA);
}
