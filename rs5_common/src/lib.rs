//! RS5 Common Library
//!
//! Shared definitions for both cores of the RS5 animatronic controller:
//! compile-time table sizes, the boot/run/debug enums, the cross-core record
//! codec, the status indicator table and configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Table sizes and timing defaults (single source of truth)
//! - [`state`] - `BootPhase`, `RunMode`, `DebugLevel`, `CoreId`
//! - [`record`] - Typed records and their 32-bit marker wire format
//! - [`servo`] - Per-channel servo defaults and flag bits
//! - [`eyes`] - Eye "fire" profile defaults and island DMX addresses
//! - [`status`] - Status indicator states and their color/blink patterns
//! - [`config`] - TOML configuration loading and validation
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rs5_common::prelude::*;
//!
//! let record = Record::system(SystemChange::Run(RunMode::Demo));
//! let frame = encode(&record);
//! assert_eq!(decode(&frame).unwrap(), record);
//! ```

pub mod config;
pub mod consts;
pub mod eyes;
pub mod prelude;
pub mod record;
pub mod servo;
pub mod state;
pub mod status;
