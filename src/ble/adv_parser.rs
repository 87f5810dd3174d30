//! Advertisement filter and parser for collar trackers.
//!
//! A qualifying advertisement carries both a local name starting with
//! [`DEVICE_NAME_PREFIX`] and a manufacturer-specific block that opens
//! with [`VENDOR_SIGNATURE`]. Anything else is ignored.

use crate::config::{DEVICE_NAME_PREFIX, MANUFACTURER_DATA_LEN, NAME_LEN, VENDOR_SIGNATURE};

const AD_TYPE_SHORT_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
const AD_TYPE_MANUFACTURER: u8 = 0xFF;

/// Fields extracted from one qualifying advertisement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParsedAdvertisement {
    pub id: u32,
    pub rssi: i8,
    pub days_recorded: u8,
    pub status_byte: u8,
}

/// Walk the AD structures and return the payload of the first one whose
/// type is accepted by `want`.
fn find_ad(data: &[u8], want: impl Fn(u8) -> bool) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if want(ad_type) {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

/// Shortened or complete local name, truncated to [`NAME_LEN`] bytes.
pub fn local_name(data: &[u8]) -> Option<&[u8]> {
    find_ad(data, |t| t == AD_TYPE_SHORT_NAME || t == AD_TYPE_COMPLETE_NAME)
        .map(|name| &name[..name.len().min(NAME_LEN)])
}

/// Manufacturer-specific data block (company id included).
pub fn manufacturer_data(data: &[u8]) -> Option<&[u8]> {
    find_ad(data, |t| t == AD_TYPE_MANUFACTURER)
}

/// Numeric id embedded in a device name.
///
/// Leading non-digits are skipped and the first run of digits is read.
/// A name without digits yields 0. Overlong numbers saturate.
pub fn parse_device_id(name: &[u8]) -> u32 {
    name.iter()
        .skip_while(|b| !b.is_ascii_digit())
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Decode an advertising payload into tracker telemetry.
///
/// Returns `None` when either the name or the manufacturer block is
/// missing, the vendor signature does not match, the name prefix is wrong
/// or the manufacturer block is too short.
pub fn parse(data: &[u8], rssi: i8) -> Option<ParsedAdvertisement> {
    let name = local_name(data)?;
    let manuf = manufacturer_data(data)?;

    if manuf.len() < MANUFACTURER_DATA_LEN || manuf[..2] != VENDOR_SIGNATURE {
        return None;
    }
    if !name.starts_with(DEVICE_NAME_PREFIX.as_bytes()) {
        return None;
    }

    Some(ParsedAdvertisement {
        id: parse_device_id(name),
        rssi,
        days_recorded: manuf[2],
        status_byte: manuf[3],
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
