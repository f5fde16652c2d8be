//! Data format 3 (RAWv1), broadcast by older firmware.
//!
//! Temperature is sign-magnitude: the integer part in one byte with the sign
//! in its top bit, hundredths in the next. The format has no "not available"
//! markers and carries no address, tx power or counters.

use super::{FormatError, payload};
use crate::measurement::{DataFormat, Measurement};
use std::time::SystemTime;

/// Payload length including the format byte.
pub const PAYLOAD_LEN: usize = 14;

pub fn parse(raw: &[u8], received_at: SystemTime) -> Result<Measurement, FormatError> {
    let p = payload(raw, DataFormat::V3, PAYLOAD_LEN)?;
    let mut m = Measurement::empty(DataFormat::V3, received_at);

    m.humidity = Some(f64::from(p.u8(1)) * 0.5);

    let whole = p.u8(2);
    let magnitude = f64::from(whole & 0x7F) + f64::from(p.u8(3)) / 100.0;
    m.temperature = Some(if whole & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    });

    m.pressure = Some(u32::from(p.u16(4)) + 50_000);
    m.acceleration = Some((p.i16(6), p.i16(8), p.i16(10)));
    m.battery_voltage = Some(p.u16(12));
    Ok(m)
}
