//! Two-core startup handshake.
//!
//! `Core0SetupA → Core1SetupA → Core0SetupB → Running`. The core that owns a
//! phase does its local work there; the other core waits. A core leaves a
//! phase only when
//!
//! - it owns the phase: its local work is done and the peer has reported
//!   reaching at least this phase;
//! - it does not own the phase: the peer has reported reaching the next one.
//!
//! Every advance is written to the core's own `SystemState` and announced
//! to the peer as a SystemChange(Boot) record. Peer reports are folded into
//! a running maximum, so duplicated or reordered records never move a core
//! backwards.

use rs5_common::record::{Record, SystemChange};
use rs5_common::state::{BootPhase, CoreId};
use tracing::{debug, info};

use crate::domain::SystemState;

/// Result of one [`BootSequencer::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    /// Moved to this phase; announce it to the peer.
    Advanced(BootPhase),
    /// Blocked on local work in the current phase.
    AwaitingLocal(BootPhase),
    /// Blocked on a peer report.
    AwaitingPeer(BootPhase),
    Running,
}

/// Boot state machine for one core.
#[derive(Debug)]
pub struct BootSequencer {
    core: CoreId,
    peer: Option<BootPhase>,
    local_done: bool,
}

impl BootSequencer {
    pub const fn new(core: CoreId) -> Self {
        Self {
            core,
            peer: None,
            local_done: false,
        }
    }

    #[inline]
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Highest phase the peer has reported.
    #[inline]
    pub fn peer_phase(&self) -> Option<BootPhase> {
        self.peer
    }

    /// Hello record carrying this core's current phase.
    pub fn start(&self, system: &SystemState) -> Record {
        info!(core = ?self.core, phase = ?system.boot_phase(), "boot handshake started");
        announce(system.boot_phase())
    }

    /// Fold in a Boot record from the peer.
    pub fn on_peer(&mut self, phase: BootPhase) {
        if self.peer.is_none_or(|p| phase > p) {
            debug!(core = ?self.core, peer = ?phase, "peer boot phase");
            self.peer = Some(phase);
        }
    }

    /// True while this core owns the current phase and has not finished it.
    pub fn needs_local_work(&self, system: &SystemState) -> bool {
        system.boot_phase().owner() == Some(self.core) && !self.local_done
    }

    /// Mark this core's work for the current phase finished.
    pub fn complete_local(&mut self) {
        self.local_done = true;
    }

    /// Advance at most one phase.
    pub fn poll(&mut self, system: &SystemState) -> BootStep {
        let phase = system.boot_phase();
        if phase.is_running() {
            return BootStep::Running;
        }

        let required = if phase.owner() == Some(self.core) {
            if !self.local_done {
                return BootStep::AwaitingLocal(phase);
            }
            phase
        } else {
            phase.next()
        };
        if self.peer.is_none_or(|p| p < required) {
            return BootStep::AwaitingPeer(phase);
        }

        let next = phase.next();
        system.set_boot_phase(next);
        self.local_done = false;
        BootStep::Advanced(next)
    }
}

/// Boot record for `phase`.
#[inline]
pub fn announce(phase: BootPhase) -> Record {
    Record::system(SystemChange::Boot(phase))
}
