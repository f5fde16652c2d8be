//! Extended data format E1, the long-range air quality layout.
//!
//! | offset | size | field                                |
//! |--------|------|--------------------------------------|
//! | 0      | 1    | format (0xE1)                        |
//! | 1      | 6    | temperature, humidity, pressure      |
//! | 7      | 8    | PM1.0, PM2.5, PM4.0, PM10, 0.1 ug/m3 |
//! | 15     | 2    | CO2, ppm                             |
//! | 17     | 2    | VOC and NOx index, top 8 bits each   |
//! | 19     | 3    | luminosity, 0.01 lux                 |
//! | 22     | 3    | reserved                             |
//! | 25     | 3    | measurement sequence                 |
//! | 28     | 1    | flags                                |
//! | 29     | 5    | reserved                             |
//! | 34     | 6    | MAC address                          |

use super::{FormatError, air_index, humidity, particulate, payload, pressure, temperature};
use crate::mac_address::MacAddress;
use crate::measurement::{DataFormat, Measurement};
use std::time::SystemTime;

/// Payload length including the format byte.
pub const PAYLOAD_LEN: usize = 40;

const U24_UNAVAILABLE: u32 = 0xFF_FFFF;
const FLAGS: usize = 28;
const VOC_LSB_BIT: u8 = 6;
const NOX_LSB_BIT: u8 = 7;

pub fn parse(raw: &[u8], received_at: SystemTime) -> Result<Measurement, FormatError> {
    let p = payload(raw, DataFormat::E1, PAYLOAD_LEN)?;
    let mut m = Measurement::empty(DataFormat::E1, received_at);

    m.temperature = temperature(p.i16(1));
    m.humidity = humidity(p.u16(3));
    m.pressure = pressure(p.u16(5));
    m.pm1_0 = particulate(p.u16(7));
    m.pm2_5 = particulate(p.u16(9));
    m.pm4_0 = particulate(p.u16(11));
    m.pm10_0 = particulate(p.u16(13));
    let co2 = p.u16(15);
    m.co2 = (co2 != u16::MAX).then_some(co2);

    let flags = p.u8(FLAGS);
    m.voc_index = air_index(p.u8(17), flags, VOC_LSB_BIT);
    m.nox_index = air_index(p.u8(18), flags, NOX_LSB_BIT);

    let luminosity = p.u24(19);
    m.luminosity = (luminosity != U24_UNAVAILABLE).then(|| f64::from(luminosity) * 0.01);
    let sequence = p.u24(25);
    m.measurement_sequence = (sequence != U24_UNAVAILABLE).then_some(sequence);

    m.mac = MacAddress::from_slice(p.slice(34)).filter(|mac| !mac.is_unset());
    Ok(m)
}
