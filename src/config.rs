//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Registry

/// A device that has not advertised for this long is dropped (ms).
pub const STALE_TIMEOUT_MS: u64 = 10_000;

/// Period of the staleness sweep (ms).
pub const SWEEP_INTERVAL_MS: u64 = 200;

/// Maximum number of devices tracked at once.
pub const MAX_DEVICES: usize = 16;

// Advertisement filter

/// Manufacturer-specific data prefix (HES-SO Valais company id, LE).
pub const VENDOR_SIGNATURE: [u8; 2] = [0x5A, 0x02];

/// Local names of collar trackers start with this prefix.
pub const DEVICE_NAME_PREFIX: &str = "Speak No Evil";

/// Longest local name considered by the parser (bytes).
pub const NAME_LEN: usize = 30;

/// Manufacturer block: signature (2), days recorded (1), status (1).
pub const MANUFACTURER_DATA_LEN: usize = 4;

// BLE link

/// BLE connection interval range (in 1.25 ms units).
/// 24 = 30 ms, 40 = 50 ms. Telemetry is low-rate.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Scan interval and window (in 0.625 ms units). 160 = 100 ms, 80 = 50 ms.
pub const BLE_SCAN_INTERVAL: u32 = 160;
pub const BLE_SCAN_WINDOW: u32 = 80;

/// A connection attempt that has not completed after this long is
/// abandoned and reported as failed (ms).
pub const CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Period of the connection state machine housekeeping tick (ms).
/// Failed scan starts and disconnect requests are retried on it, and the
/// connect deadline is checked on it.
pub const STATE_TICK_MS: u64 = 500;

// Display

/// Display refresh period (ms).
pub const DISPLAY_REFRESH_MS: u64 = 200;

/// The confirmation popup closes by itself after this long (ms).
pub const POPUP_TIMEOUT_MS: u64 = 3_000;

/// Device rows shown per page on the main screen.
pub const DEVICES_PER_PAGE: usize = 3;

/// Nextion panel baud rate. The HMI project must set `bauds=115200`,
/// a full main page does not fit in one refresh period at 9600.
pub const DISPLAY_BAUD: u32 = 115_200;

/// Bytes of Nextion instructions buffered per frame.
pub const FRAME_BUFFER_LEN: usize = 2048;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Button UP       → P0.11
//   Button DOWN     → P0.12
//   Button SELECT   → P0.24
//   Button TRIGGER  → P0.25
//   Nextion TX      → P0.06
//   Nextion RX      → P0.08 (unused, the panel is write-only)
//   Status LED      → P0.13

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 15;

/// Status LED blink period (ms).
pub const HEARTBEAT_MS: u64 = 200;
