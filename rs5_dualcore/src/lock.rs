//! Per-domain mutual exclusion.
//!
//! A [`LockDomain`] guards exactly one shared-state domain. Acquisition is a
//! non-blocking test-and-set retried indefinitely; between attempts the
//! caller waits through a substitutable [`Relax`] strategy. There is no
//! timeout and no priority inheritance. Ownership is released when the
//! returned [`DomainGuard`] drops.
//!
//! A domain that has not been initialized reads as held, so callers keep
//! retrying until setup completes.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use rs5_common::consts::LOCK_RETRY_INTERVAL_MS;

const UNINIT: u8 = 0;
const FREE: u8 = 1;
const HELD: u8 = 2;

/// Wait strategy between failed acquisition attempts.
pub trait Relax {
    fn relax(&self);
}

/// Sleep for the lock retry interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepRelax;

impl Relax for SleepRelax {
    #[inline]
    fn relax(&self) {
        std::thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS));
    }
}

/// Busy-wait with a CPU spin hint. For tests and short critical sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinRelax;

impl Relax for SpinRelax {
    #[inline]
    fn relax(&self) {
        std::hint::spin_loop();
        std::thread::yield_now();
    }
}

/// Named lock owning one domain.
#[derive(Debug)]
pub struct LockDomain<R: Relax = SleepRelax> {
    name: &'static str,
    state: AtomicU8,
    contended: AtomicU32,
    relax: R,
}

impl LockDomain<SleepRelax> {
    /// Uninitialized domain using the sleeping wait strategy.
    pub const fn new(name: &'static str) -> Self {
        Self::with_relax(name, SleepRelax)
    }
}

impl<R: Relax> LockDomain<R> {
    pub const fn with_relax(name: &'static str, relax: R) -> Self {
        Self {
            name,
            state: AtomicU8::new(UNINIT),
            contended: AtomicU32::new(0),
            relax,
        }
    }

    /// Mark the domain ready. Idempotent; never releases a held lock.
    pub fn init(&self) {
        let _ = self
            .state
            .compare_exchange(UNINIT, FREE, Ordering::Release, Ordering::Relaxed);
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) != UNINIT
    }

    /// Held or uninitialized.
    #[inline]
    pub fn is_held(&self) -> bool {
        self.state.load(Ordering::Acquire) != FREE
    }

    /// Failed attempts observed since creation.
    #[inline]
    pub fn contention_count(&self) -> u32 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Single test-and-set attempt.
    #[inline]
    pub fn try_acquire(&self) -> Option<DomainGuard<'_>> {
        self.state
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| DomainGuard { state: &self.state })
    }

    /// Block until exclusive ownership.
    pub fn acquire(&self) -> DomainGuard<'_> {
        let mut attempts: u32 = 0;
        loop {
            if let Some(guard) = self.try_acquire() {
                if attempts > 0 {
                    tracing::trace!(domain = self.name, attempts, "lock acquired after contention");
                }
                return guard;
            }
            attempts = attempts.saturating_add(1);
            self.contended.fetch_add(1, Ordering::Relaxed);
            self.relax.relax();
        }
    }
}

/// Exclusive ownership of a domain; releases on drop.
#[must_use = "the domain is released as soon as the guard drops"]
#[derive(Debug)]
pub struct DomainGuard<'a> {
    state: &'a AtomicU8,
}

impl Drop for DomainGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.state.store(FREE, Ordering::Release);
    }
}
