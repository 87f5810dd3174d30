//! Unified error type for snes-hub.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The SoftDevice returned a BLE-level error.
    Ble(BleError),

    /// The radio could not be enabled. BLE is down, the UI keeps running.
    RadioUnavailable,

    /// Scanning could not be (re)started. Retried on the next tick.
    ScanStartFailed,

    /// Scanning could not be stopped before a connection attempt.
    ScanStopFailed,

    /// The connection attempt was rejected or timed out.
    ConnectFailed,

    /// The peer does not expose the SNES service.
    ServiceNotFound,

    /// A command write is still in flight; the new command is dropped.
    WriteAlreadyPending,

    /// No peer link, or the attribute handles are not resolved yet.
    NotConnected,

    /// Request does not make sense in the current connection state.
    InvalidState,

    /// The radio task's request queue is full.
    QueueFull,

    // Registry
    /// Registry is at capacity; the advertisement is dropped.
    RegistryFull,

    // Protocol
    /// A command argument is out of range.
    InvalidArgument,

    // UI / Display
    /// UART transfer to the display failed.
    Display,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// GAP / GATT raw error code from the SoftDevice.
    Raw(u32),
    /// Scan was cancelled or could not start.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// The peer rejected or never acknowledged a write.
    WriteFailed,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}
