//! Data format 6, broadcast by the Ruuvi Air quality monitor.
//!
//! Only the three low bytes of the address are carried, so the full address
//! always comes from the advertisement.

use super::{FormatError, air_index, humidity, particulate, payload, pressure, temperature};
use crate::measurement::{DataFormat, Measurement};
use std::time::SystemTime;

/// Payload length including the format byte.
pub const PAYLOAD_LEN: usize = 20;

const FLAGS: usize = 16;
const VOC_LSB_BIT: u8 = 6;
const NOX_LSB_BIT: u8 = 7;

pub fn parse(raw: &[u8], received_at: SystemTime) -> Result<Measurement, FormatError> {
    let p = payload(raw, DataFormat::V6, PAYLOAD_LEN)?;
    let mut m = Measurement::empty(DataFormat::V6, received_at);

    m.temperature = temperature(p.i16(1));
    m.humidity = humidity(p.u16(3));
    m.pressure = pressure(p.u16(5));
    m.pm2_5 = particulate(p.u16(7));
    let co2 = p.u16(9);
    m.co2 = (co2 != u16::MAX).then_some(co2);

    let flags = p.u8(FLAGS);
    m.voc_index = air_index(p.u8(11), flags, VOC_LSB_BIT);
    m.nox_index = air_index(p.u8(12), flags, NOX_LSB_BIT);
    m.luminosity = luminosity(p.u8(13));
    m.measurement_sequence = Some(u32::from(p.u8(15)));
    Ok(m)
}

/// Luminosity is log-coded into one byte: 0 is 0 lux, 254 is 65535 lux.
fn luminosity(code: u8) -> Option<f64> {
    if code == u8::MAX {
        return None;
    }
    let step = 65_536f64.ln() / 254.0;
    Some((f64::from(code) * step).exp() - 1.0)
}
