//! snes-hub library.
//!
//! Holds the whole module tree. The pure logic (registry, advertisement
//! parser, protocol, connection state machine, menu, Nextion encoder) builds
//! everywhere and is tested on the host; the SoftDevice and GPIO/UARTE glue
//! is compiled only with the `embedded` feature.
//!
//! Usage: `cargo test` (host) or
//! `cargo build --release --features embedded --target thumbv7em-none-eabihf`.
//!
//! The embedded binary in `main.rs` spawns the tasks defined here.

#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{BleError, Error};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
