//! BLE GATT client for the Speak No Evil Service.
//!
//! After the GAP link is up this module discovers the SNES service,
//! exposes its attribute handles, toggles the CCC descriptors of the four
//! telemetry characteristics and writes commands.

use crate::ble::protocol::{AttributeHandles, CommandBuf, NotificationKind};
use nrf_softdevice::ble::gatt_client::{self, DiscoverError, WriteError};
use nrf_softdevice::ble::Connection;

/// nrf-softdevice GATT client struct for the SNES service. All UUIDs sit on
/// the vendor base `0000xxxx-4865-7673-025A-4845532D534F`.
///
/// The `#[nrf_softdevice::gatt_client]` macro generates discovery and
/// write/notify helpers for the listed characteristics.
#[nrf_softdevice::gatt_client(uuid = "00000201-4865-7673-025a-4845532d534f")]
pub struct SnesClient {
    /// Command input, `[0xA5, opcode, args...]`.
    #[characteristic(uuid = "00000202-4865-7673-025a-4845532d534f", write)]
    pub cmd: CommandBuf,

    #[characteristic(uuid = "00000203-4865-7673-025a-4845532d534f", read, notify)]
    pub status: u8,

    #[characteristic(uuid = "00000204-4865-7673-025a-4845532d534f", read, notify)]
    pub days_of_records: u8,

    #[characteristic(uuid = "00000205-4865-7673-025a-4845532d534f", read, notify)]
    pub device_id: u8,

    #[characteristic(uuid = "00000206-4865-7673-025a-4845532d534f", read, notify)]
    pub mic_gain: u8,
}

/// Outcome of service discovery.
pub enum Discovery {
    Found(SnesClient),
    /// The peer does not expose the SNES service (or only part of it).
    NotFound,
    /// GATT procedure failed, usually because the link went away.
    Failed,
}

pub async fn discover(conn: &Connection) -> Discovery {
    match gatt_client::discover::<SnesClient>(conn).await {
        Ok(client) => Discovery::Found(client),
        Err(DiscoverError::ServiceNotFound) | Err(DiscoverError::ServiceIncomplete) => {
            Discovery::NotFound
        }
        Err(_) => Discovery::Failed,
    }
}

/// Handles resolved by discovery.
pub fn handles(client: &SnesClient) -> AttributeHandles {
    AttributeHandles {
        cmd: client.cmd_value_handle,
        status: client.status_value_handle,
        status_ccc: client.status_cccd_handle,
        days_recorded: client.days_of_records_value_handle,
        days_recorded_ccc: client.days_of_records_cccd_handle,
        device_id: client.device_id_value_handle,
        device_id_ccc: client.device_id_cccd_handle,
        mic_gain: client.mic_gain_value_handle,
        mic_gain_ccc: client.mic_gain_cccd_handle,
    }
}

/// Enable or disable notifications of one telemetry characteristic.
pub async fn set_notifications(
    client: &SnesClient,
    kind: NotificationKind,
    enabled: bool,
) -> Result<(), WriteError> {
    match kind {
        NotificationKind::Status => client.status_cccd_write(enabled).await,
        NotificationKind::DaysRecorded => client.days_of_records_cccd_write(enabled).await,
        NotificationKind::DeviceId => client.device_id_cccd_write(enabled).await,
        NotificationKind::MicGain => client.mic_gain_cccd_write(enabled).await,
    }
}

/// Map a client event to the characteristic it came from.
pub fn classify(event: SnesClientEvent) -> (NotificationKind, u8) {
    match event {
        SnesClientEvent::StatusNotification(v) => (NotificationKind::Status, v),
        SnesClientEvent::DaysOfRecordsNotification(v) => (NotificationKind::DaysRecorded, v),
        SnesClientEvent::DeviceIdNotification(v) => (NotificationKind::DeviceId, v),
        SnesClientEvent::MicGainNotification(v) => (NotificationKind::MicGain, v),
    }
}
