//! Integration test: mutual exclusion under real thread contention.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use rs5_common::config::DeviceConfig;
use rs5_dualcore::domain::DeviceState;
use rs5_dualcore::lock::{LockDomain, SpinRelax};

const ROUNDS: u32 = 20_000;

#[test]
fn paired_writes_never_observed_torn() {
    let lock = LockDomain::with_relax("pair", SpinRelax);
    lock.init();
    let a = AtomicU32::new(0);
    let b = AtomicU32::new(0);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let _guard = lock.acquire();
                    let next = a.load(Ordering::Relaxed) + 1;
                    a.store(next, Ordering::Relaxed);
                    std::hint::spin_loop();
                    b.store(next, Ordering::Relaxed);
                }
            });
        }
        s.spawn(|| {
            for _ in 0..ROUNDS {
                let _guard = lock.acquire();
                assert_eq!(a.load(Ordering::Relaxed), b.load(Ordering::Relaxed));
            }
        });
    });

    // No increment lost.
    assert_eq!(a.load(Ordering::Relaxed), 2 * ROUNDS);
    assert!(!lock.is_held());
}

#[test]
fn uninitialized_domain_blocks_until_init() {
    let lock = LockDomain::with_relax("late", SpinRelax);
    let entered = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let _guard = lock.acquire();
            entered.store(true, Ordering::SeqCst);
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        lock.init();
    });

    assert!(entered.load(Ordering::SeqCst));
    assert!(lock.contention_count() > 0);
}

#[test]
fn servo_names_never_torn() {
    let device = DeviceState::new(&DeviceConfig::default(), 0);
    let left = [b'L'; 40];
    let right = [b'R'; 12];
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..2_000 {
                let name: &[u8] = if i % 2 == 0 { &left } else { &right };
                device.servo_config.set_name(2, name);
            }
            done.store(true, Ordering::Release);
        });
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                let name = device.servo_config.name(2).unwrap();
                let bytes = name.as_slice();
                let whole = bytes == b"Pitch".as_slice()
                    || bytes == left.as_slice()
                    || bytes == right.as_slice();
                assert!(whole, "torn name: {bytes:?}");
            }
        });
    });

    assert!(!device.servo_config.domain().is_held());
}
