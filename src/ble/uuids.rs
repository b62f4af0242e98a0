//! Service UUID helpers for scan filters.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Bluetooth SIG base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`).
const BASE_UUID_BITS: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

/// Expand a 16-bit assigned number into a full 128-bit service UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID_BITS | ((short as u128) << 96))
}

/// Parse the service UUID strings a host passes to `start_scan`.
///
/// A missing list is an unfiltered scan, same as an empty one. The first
/// malformed entry fails the whole list.
pub fn parse_service_filters<S: AsRef<str>>(strings: Option<&[S]>) -> Result<Vec<Uuid>> {
    let Some(strings) = strings else {
        return Ok(Vec::new());
    };

    strings
        .iter()
        .map(|s| {
            let s = s.as_ref();
            Uuid::parse_str(s.trim()).map_err(|_| Error::InvalidUuid {
                value: s.to_string(),
            })
        })
        .collect()
}
