//! BLE GAP scanner - keeps the device registry fed.
//!
//! Uses the SoftDevice Central-role scanning API in continuous passive
//! mode. Every advertisement goes through the collar filter; matches are
//! upserted into the registry straight from the scan callback.

use crate::ble::adv_parser;
use crate::ble::device::{AddressKind, BleAddress, DeviceStatus};
use crate::ble::{now_ms, HubRegistry};
use crate::config::{BLE_SCAN_INTERVAL, BLE_SCAN_WINDOW, STALE_TIMEOUT_MS, SWEEP_INTERVAL_MS};
use defmt::{debug, warn};
use embassy_time::{Duration, Ticker};
use nrf_softdevice::ble::central;
use nrf_softdevice::Softdevice;

/// Scan until the SoftDevice reports an error.
///
/// Never returns `Ok` on its own; callers stop the scan by dropping the
/// future.
pub async fn scan(sd: &Softdevice, registry: &HubRegistry) -> Result<(), central::ScanError> {
    let config = central::ScanConfig {
        // Collars put everything we need in the advertising packet.
        active: false,
        interval: BLE_SCAN_INTERVAL,
        window: BLE_SCAN_WINDOW,
        timeout: 0,
        ..Default::default()
    };

    central::scan(sd, &config, |params| {
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };

        if let Some(adv) = adv_parser::parse(data, params.rssi) {
            let address = BleAddress::new(
                AddressKind::from_raw(params.peer_addr.addr_type()),
                params.peer_addr.addr,
            );
            let result = registry.upsert(
                adv.id,
                adv.rssi,
                adv.days_recorded,
                DeviceStatus::from(adv.status_byte),
                address,
                now_ms(),
            );
            if let Err(e) = result {
                warn!("dropping advertisement from device {}: {}", adv.id, e);
            }
        }

        // Keep scanning.
        None::<()>
    })
    .await
}

/// Periodically drop devices that stopped advertising.
pub async fn sweep_task(registry: &'static HubRegistry) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(SWEEP_INTERVAL_MS));
    loop {
        ticker.next().await;
        let removed = registry.sweep_stale(now_ms(), STALE_TIMEOUT_MS);
        if removed > 0 {
            debug!("swept {} stale device(s), {} left", removed, registry.count());
        }
    }
}
