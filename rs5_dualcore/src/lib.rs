//! # RS5 Dual-Core Library
//!
//! Cross-core state synchronization for the RS5 animatronic controller.
//! Each core holds a full replica of the shared state, split into five
//! domains, each guarded by its own [`lock::LockDomain`]. Local writes lock,
//! store and release; the change then travels to the peer core as an
//! encoded record over a [`channel::Mailbox`] and is applied to the peer's
//! replica under the same domain's lock.
//!
//! ## Layers
//!
//! 1. **LockDomain** - test-and-set lock with a substitutable wait strategy
//! 2. **Domains** - `SystemState`, servo config/runtime tables, eye overlay
//!    and eye profiles, each with a record applier
//! 3. **Channel** - ordered, non-blocking record transport with backlog
//! 4. **BootSequencer** - phased startup handshake carried as records
//! 5. **Core loops** - per-core iteration drivers over hardware traits
//!
//! ## No Nested Locks
//!
//! No code path holds two domain locks at once. Plain getters never lock;
//! they read machine-word atomics.

#![deny(clippy::disallowed_types)]

pub mod atomic;
pub mod boot;
pub mod channel;
pub mod cycle;
pub mod dispatch;
pub mod domain;
pub mod lock;
pub mod status;
