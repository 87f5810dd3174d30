//! Live registry of collar trackers currently in radio range.
//!
//! The registry is the only structure shared between the scanner (radio
//! context), the housekeeping sweep, the connection state machine and the
//! UI. A single blocking mutex guards the whole list and every public
//! operation takes it exactly once, so readers never observe a record
//! half-way through an update.

use core::cell::RefCell;

use crate::ble::device::{BleAddress, DeviceRecord, DeviceStatus};
use crate::error::Error;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

/// Fixed-capacity device list keyed by `DeviceRecord::id`.
///
/// Records keep their insertion order; callers always receive copies.
pub struct Registry<M: RawMutex, const N: usize> {
    devices: Mutex<M, RefCell<Vec<DeviceRecord, N>>>,
}

impl<M: RawMutex, const N: usize> Registry<M, N> {
    pub const fn new() -> Self {
        Self {
            devices: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Insert a new record or refresh the existing one with the same id.
    ///
    /// Identity (`id`) is kept; everything else is overwritten. Fails with
    /// `Error::RegistryFull` when a new id does not fit.
    pub fn upsert(
        &self,
        id: u32,
        rssi: i8,
        days_recorded: u8,
        status: DeviceStatus,
        address: BleAddress,
        now: u64,
    ) -> Result<(), Error> {
        self.devices.lock(|devices| {
            let mut devices = devices.borrow_mut();
            if let Some(existing) = devices.iter_mut().find(|d| d.id == id) {
                existing.rssi = rssi;
                existing.days_recorded = days_recorded;
                existing.status = status;
                existing.address = address;
                existing.last_seen = now;
                return Ok(());
            }

            devices
                .push(DeviceRecord {
                    id,
                    rssi,
                    days_recorded,
                    status,
                    address,
                    last_seen: now,
                })
                .map_err(|_| Error::RegistryFull)
        })
    }

    /// Remove the record with `id`. Returns whether one was present.
    pub fn remove(&self, id: u32) -> bool {
        self.devices.lock(|devices| {
            let mut devices = devices.borrow_mut();
            match devices.iter().position(|d| d.id == id) {
                Some(index) => {
                    devices.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Copy of every record, in insertion order.
    pub fn snapshot_all(&self) -> Vec<DeviceRecord, N> {
        self.devices.lock(|devices| devices.borrow().clone())
    }

    pub fn get_at(&self, index: usize) -> Option<DeviceRecord> {
        self.devices
            .lock(|devices| devices.borrow().get(index).copied())
    }

    pub fn get_by_id(&self, id: u32) -> Option<DeviceRecord> {
        self.devices
            .lock(|devices| devices.borrow().iter().find(|d| d.id == id).copied())
    }

    pub fn count(&self) -> usize {
        self.devices.lock(|devices| devices.borrow().len())
    }

    /// Up to `W` consecutive records starting at `start`.
    ///
    /// `None` when `start` is past the end. Trailing slots that run off the
    /// end of the list are left empty.
    pub fn get_window<const W: usize>(&self, start: usize) -> Option<[Option<DeviceRecord>; W]> {
        self.devices.lock(|devices| {
            let devices = devices.borrow();
            if start >= devices.len() {
                return None;
            }
            let mut window = [None; W];
            for (slot, record) in window.iter_mut().zip(devices[start..].iter()) {
                *slot = Some(*record);
            }
            Some(window)
        })
    }

    /// Drop every record with `now - last_seen >= timeout`.
    ///
    /// Returns the number of records removed.
    pub fn sweep_stale(&self, now: u64, timeout: u64) -> usize {
        self.devices.lock(|devices| {
            let mut devices = devices.borrow_mut();
            let before = devices.len();
            devices.retain(|d| now.saturating_sub(d.last_seen) < timeout);
            before - devices.len()
        })
    }
}

impl<M: RawMutex, const N: usize> Default for Registry<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::device::AddressKind;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};

    fn addr(last: u8) -> BleAddress {
        BleAddress::new(AddressKind::RandomStatic, [last, 0, 0, 0, 0, 0xC0])
    }

    fn registry() -> Registry<NoopRawMutex, 4> {
        Registry::new()
    }

    #[test]
    fn upsert_inserts_new_device() {
        let reg = registry();
        reg.upsert(7, -60, 3, DeviceStatus::Idle, addr(1), 100).unwrap();

        assert_eq!(reg.count(), 1);
        let rec = reg.get_by_id(7).unwrap();
        assert_eq!(rec.rssi, -60);
        assert_eq!(rec.days_recorded, 3);
        assert_eq!(rec.status, DeviceStatus::Idle);
        assert_eq!(rec.last_seen, 100);
    }

    #[test]
    fn upsert_updates_in_place() {
        let reg = registry();
        reg.upsert(1, -70, 0, DeviceStatus::Init, addr(1), 0).unwrap();
        reg.upsert(2, -50, 0, DeviceStatus::Idle, addr(2), 0).unwrap();
        reg.upsert(1, -40, 5, DeviceStatus::Recording, addr(9), 500).unwrap();

        assert_eq!(reg.count(), 2);
        let first = reg.get_at(0).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.rssi, -40);
        assert_eq!(first.days_recorded, 5);
        assert_eq!(first.status, DeviceStatus::Recording);
        assert_eq!(first.address, addr(9));
        assert_eq!(first.last_seen, 500);
    }

    #[test]
    fn ids_stay_unique() {
        let reg = registry();
        for t in 0..10 {
            reg.upsert(3, -50, 0, DeviceStatus::Idle, addr(3), t).unwrap();
        }
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn full_registry_rejects_new_id() {
        let reg = registry();
        for id in 0..4 {
            reg.upsert(id, -50, 0, DeviceStatus::Idle, addr(id as u8), 0).unwrap();
        }
        assert_eq!(
            reg.upsert(99, -50, 0, DeviceStatus::Idle, addr(99), 0),
            Err(Error::RegistryFull)
        );
        // Known ids can still be refreshed.
        assert!(reg.upsert(2, -30, 0, DeviceStatus::Idle, addr(2), 10).is_ok());
        assert_eq!(reg.count(), 4);
    }

    #[test]
    fn remove_absent_is_noop() {
        let reg = registry();
        reg.upsert(1, -50, 0, DeviceStatus::Idle, addr(1), 0).unwrap();
        assert!(!reg.remove(42));
        assert!(reg.remove(1));
        assert!(!reg.remove(1));
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let reg = registry();
        for id in [30, 10, 20] {
            reg.upsert(id, -50, 0, DeviceStatus::Idle, addr(id as u8), 0).unwrap();
        }
        reg.remove(10);
        let ids: Vec<u32, 4> = reg.snapshot_all().iter().map(|d| d.id).collect();
        assert_eq!(ids.as_slice(), &[30, 20]);
    }

    #[test]
    fn window_of_three() {
        let reg = registry();
        for id in 1..=4 {
            reg.upsert(id, -50, 0, DeviceStatus::Idle, addr(id as u8), 0).unwrap();
        }

        let window = reg.get_window::<3>(0).unwrap();
        assert_eq!(window.map(|d| d.map(|d| d.id)), [Some(1), Some(2), Some(3)]);

        let window = reg.get_window::<3>(2).unwrap();
        assert_eq!(window.map(|d| d.map(|d| d.id)), [Some(3), Some(4), None]);

        assert!(reg.get_window::<3>(4).is_none());
    }

    #[test]
    fn window_starting_at_second_device() {
        let reg = registry();
        for id in 1..=4 {
            reg.upsert(id, -50, 0, DeviceStatus::Idle, addr(id as u8), 0).unwrap();
        }
        let window = reg.get_window::<3>(1).unwrap();
        assert_eq!(window.map(|d| d.map(|d| d.id)), [Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn window_on_empty_registry() {
        let reg = registry();
        assert!(reg.get_window::<3>(0).is_none());
    }

    #[test]
    fn sweep_boundary_is_inclusive() {
        let reg = registry();
        reg.upsert(1, -50, 0, DeviceStatus::Idle, addr(1), 0).unwrap();
        reg.upsert(2, -50, 0, DeviceStatus::Idle, addr(2), 1).unwrap();

        // now - last_seen == timeout removes; one ms younger survives.
        assert_eq!(reg.sweep_stale(10_000, 10_000), 1);
        assert!(reg.get_by_id(1).is_none());
        assert!(reg.get_by_id(2).is_some());
    }

    #[test]
    fn sweep_removes_only_expired_records() {
        let reg = registry();
        reg.upsert(1, -50, 0, DeviceStatus::Idle, addr(1), 3_000).unwrap();
        reg.upsert(2, -50, 0, DeviceStatus::Idle, addr(2), 6_000).unwrap();

        assert_eq!(reg.sweep_stale(15_000, 10_000), 1);
        assert!(reg.get_by_id(1).is_none());
        assert_eq!(reg.get_by_id(2).unwrap().last_seen, 6_000);
    }

    #[test]
    fn sweep_handles_clock_behind_record() {
        let reg = registry();
        reg.upsert(1, -50, 0, DeviceStatus::Idle, addr(1), 5_000).unwrap();
        assert_eq!(reg.sweep_stale(1_000, 10_000), 0);
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn snapshot_never_torn_under_concurrent_writers() {
        // Every writer stores the same value in rssi and days_recorded, so a
        // torn read would show them disagreeing.
        let reg: Registry<CriticalSectionRawMutex, 8> = Registry::new();

        std::thread::scope(|s| {
            for writer in 0..4u8 {
                let reg = &reg;
                s.spawn(move || {
                    for round in 0..500u32 {
                        let v = (round % 100) as u8;
                        let id = u32::from(writer) * 2 + round % 2;
                        let _ = reg.upsert(
                            id,
                            -(v as i8),
                            v,
                            DeviceStatus::Idle,
                            addr(writer),
                            u64::from(round),
                        );
                    }
                });
            }

            let reg = &reg;
            s.spawn(move || {
                for _ in 0..500 {
                    let snapshot = reg.snapshot_all();
                    let mut seen: Vec<u32, 8> = Vec::new();
                    for rec in snapshot.iter() {
                        assert_eq!(rec.rssi, -(rec.days_recorded as i8));
                        assert!(!seen.contains(&rec.id));
                        seen.push(rec.id).unwrap();
                    }
                }
            });
        });

        assert_eq!(reg.count(), 8);
    }
}
