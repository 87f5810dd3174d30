//! Bluetooth Low Energy subsystem.
//!
//! The hub runs the Nordic SoftDevice S140 in **Central** role:
//!
//! 1. **Scanner** - listens for collar advertisements and keeps the
//!    [`registry`] of nearby devices fresh.
//! 2. **Connection state machine** - owns the single peer link and walks
//!    it through connect, service discovery and subscription.
//! 3. **Command channel** - writes SNES commands and decodes telemetry
//!    notifications.
//!
//! Everything above the SoftDevice is plain Rust and runs on the host in
//! tests; the radio glue (`central`, `scanner`, `snes_client`) only builds
//! with the `embedded` feature.

pub mod adv_parser;
pub mod command_channel;
pub mod connection;
pub mod device;
pub mod protocol;
pub mod radio;
pub mod registry;

#[cfg(feature = "embedded")]
pub mod central;
#[cfg(feature = "embedded")]
pub mod scanner;
#[cfg(feature = "embedded")]
pub mod snes_client;

use crate::config::MAX_DEVICES;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Registry shared by the scanner, the sweep, the state machine and the UI.
pub type HubRegistry = registry::Registry<CriticalSectionRawMutex, MAX_DEVICES>;

/// Milliseconds since boot.
#[cfg(feature = "embedded")]
pub fn now_ms() -> u64 {
    embassy_time::Instant::now().as_millis()
}
