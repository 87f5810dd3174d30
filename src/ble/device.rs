//! Collar tracker data model: status codes, addresses and the
//! registry record.

/// Operating state reported by a collar tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceStatus {
    Init,
    WaitingForStorage,
    Idle,
    Recording,
    StorageFull,
    LowBattery,
    PowerSaving,
    Error,
}

impl DeviceStatus {
    /// Wire value of the status byte.
    pub const fn code(self) -> u8 {
        match self {
            DeviceStatus::Init => 0x00,
            DeviceStatus::WaitingForStorage => 0x01,
            DeviceStatus::Idle => 0x02,
            DeviceStatus::Recording => 0x03,
            DeviceStatus::StorageFull => 0x04,
            DeviceStatus::LowBattery => 0x05,
            DeviceStatus::PowerSaving => 0x06,
            DeviceStatus::Error => 0xFF,
        }
    }

    /// Text shown on the display for this status.
    pub const fn label(self) -> &'static str {
        match self {
            DeviceStatus::Init => "Initialization",
            DeviceStatus::WaitingForStorage => "No SD Card",
            DeviceStatus::Idle => "Idle",
            DeviceStatus::Recording => "Recording",
            DeviceStatus::StorageFull => "Disk Full",
            DeviceStatus::LowBattery => "Low Battery",
            DeviceStatus::PowerSaving => "Power Saving",
            DeviceStatus::Error => "Error",
        }
    }
}

/// Unknown codes decode to `Error`.
impl From<u8> for DeviceStatus {
    fn from(code: u8) -> Self {
        match code {
            0x00 => DeviceStatus::Init,
            0x01 => DeviceStatus::WaitingForStorage,
            0x02 => DeviceStatus::Idle,
            0x03 => DeviceStatus::Recording,
            0x04 => DeviceStatus::StorageFull,
            0x05 => DeviceStatus::LowBattery,
            0x06 => DeviceStatus::PowerSaving,
            _ => DeviceStatus::Error,
        }
    }
}

/// BLE address type, as carried in advertising reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
    Anonymous,
}

impl AddressKind {
    /// Map the SoftDevice `addr_type` field. Unknown values are
    /// treated as anonymous.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => AddressKind::Public,
            0x01 => AddressKind::RandomStatic,
            0x02 => AddressKind::RandomPrivateResolvable,
            0x03 => AddressKind::RandomPrivateNonResolvable,
            _ => AddressKind::Anonymous,
        }
    }
}

/// Peer address: six bytes, least significant first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BleAddress {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

impl BleAddress {
    pub const fn new(kind: AddressKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

/// Last known telemetry of one collar tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceRecord {
    /// Numeric suffix of the advertised name. Unique key.
    pub id: u32,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    pub days_recorded: u8,
    pub status: DeviceStatus,
    pub address: BleAddress,
    /// Monotonic milliseconds of the last advertisement.
    pub last_seen: u64,
}
