//! Data format 5 (RAWv2), the layout every current RuuviTag broadcasts.
//!
//! | offset | size | field                                           |
//! |--------|------|-------------------------------------------------|
//! | 0      | 1    | format (5)                                      |
//! | 1      | 2    | temperature, i16, 0.005 C                       |
//! | 3      | 2    | humidity, u16, 0.0025 %                         |
//! | 5      | 2    | pressure, u16, Pa - 50000                       |
//! | 7      | 6    | acceleration x/y/z, i16, mG                     |
//! | 13     | 2    | battery (11 bits, mV - 1600), tx (5 bits, 2 dBm - 40) |
//! | 15     | 1    | movement counter                                |
//! | 16     | 2    | measurement sequence                            |
//! | 18     | 6    | MAC address                                     |

use super::{Fields, FormatError, RUUVI_COMPANY_ID, humidity, payload, pressure, temperature};
use crate::mac_address::MacAddress;
use crate::measurement::{DataFormat, Measurement};
use std::time::SystemTime;

/// Payload length including the format byte.
pub const PAYLOAD_LEN: usize = 24;

const BATTERY_OFFSET_MV: u16 = 1600;
const TX_POWER_OFFSET_DBM: i8 = -40;

pub fn parse(raw: &[u8], received_at: SystemTime) -> Result<Measurement, FormatError> {
    let p = payload(raw, DataFormat::V5, PAYLOAD_LEN)?;
    let mut m = Measurement::empty(DataFormat::V5, received_at);

    m.temperature = temperature(p.i16(1));
    m.humidity = humidity(p.u16(3));
    m.pressure = pressure(p.u16(5));
    m.acceleration = acceleration(p);

    let power = p.u16(13);
    let battery = power >> 5;
    let tx_power = power & 0x1F;
    m.battery_voltage = (battery != 0x7FF).then(|| battery + BATTERY_OFFSET_MV);
    // tx_power is at most 30 here, so the cast cannot wrap
    m.tx_power = (tx_power != 0x1F).then(|| tx_power as i8 * 2 + TX_POWER_OFFSET_DBM);

    let movement = p.u8(15);
    m.movement_counter = (movement != u8::MAX).then(|| u32::from(movement));
    let sequence = p.u16(16);
    m.measurement_sequence = (sequence != u16::MAX).then(|| u32::from(sequence));

    m.mac = MacAddress::from_slice(p.slice(18)).filter(|mac| !mac.is_unset());
    Ok(m)
}

fn acceleration(p: Fields<'_>) -> Option<(i16, i16, i16)> {
    let (x, y, z) = (p.i16(7), p.i16(9), p.i16(11));
    [x, y, z]
        .iter()
        .all(|&axis| axis != i16::MIN)
        .then_some((x, y, z))
}

/// Encode a measurement as a complete format 5 frame, company id included.
///
/// Missing fields are written as their "not available" markers and values
/// outside a field's range are clamped.
pub fn encode(m: &Measurement) -> Vec<u8> {
    let mut frame = Vec::with_capacity(RUUVI_COMPANY_ID.len() + PAYLOAD_LEN);
    frame.extend_from_slice(&RUUVI_COMPANY_ID);
    frame.push(DataFormat::V5.version_byte());

    let temperature = m.temperature.map_or(i16::MIN, |t| {
        (t / 0.005).round().clamp(f64::from(i16::MIN + 1), f64::from(i16::MAX)) as i16
    });
    frame.extend_from_slice(&temperature.to_be_bytes());

    let humidity = m.humidity.map_or(u16::MAX, |h| {
        (h / 0.0025).round().clamp(0.0, f64::from(u16::MAX - 1)) as u16
    });
    frame.extend_from_slice(&humidity.to_be_bytes());

    let pressure = m.pressure.map_or(u16::MAX, |pa| {
        pa.saturating_sub(50_000).min(u32::from(u16::MAX - 1)) as u16
    });
    frame.extend_from_slice(&pressure.to_be_bytes());

    let (x, y, z) = m.acceleration.unwrap_or((i16::MIN, i16::MIN, i16::MIN));
    for axis in [x, y, z] {
        frame.extend_from_slice(&axis.to_be_bytes());
    }

    let battery = m.battery_voltage.map_or(0x7FF, |mv| {
        mv.saturating_sub(BATTERY_OFFSET_MV).min(0x7FE)
    });
    let tx_power = m.tx_power.map_or(0x1F, |dbm| {
        (i16::from(dbm) - i16::from(TX_POWER_OFFSET_DBM)).clamp(0, 60) as u16 / 2
    });
    frame.extend_from_slice(&((battery << 5) | tx_power).to_be_bytes());

    frame.push(
        m.movement_counter
            .map_or(u8::MAX, |c| c.min(u32::from(u8::MAX - 1)) as u8),
    );
    let sequence = m
        .measurement_sequence
        .map_or(u16::MAX, |s| (s % u32::from(u16::MAX)) as u16);
    frame.extend_from_slice(&sequence.to_be_bytes());

    frame.extend_from_slice(&m.mac.unwrap_or(MacAddress([0xFF; 6])).0);
    frame
}
