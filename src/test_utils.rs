use crate::decoder::RUUVI_COMPANY_ID;
use crate::mac_address::MacAddress;
use crate::measurement::{DataFormat, Measurement};
use std::time::SystemTime;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Format 3 reference frame: 26.3 C, 20.5 %, 102766 Pa, acc (-1000, -1726, 714), 2899 mV.
pub const V3_FRAME: [u8; 16] = [
    0x99, 0x04, // Ruuvi company id
    0x03, // Format 3
    0x29, // Humidity: 20.5%
    0x1A, 0x1E, // Temperature: 26.30°C
    0xCE, 0x1E, // Pressure: 102766 Pa
    0xFC, 0x18, // Acceleration X: -1000 mG
    0xF9, 0x42, // Acceleration Y: -1726 mG
    0x02, 0xCA, // Acceleration Z: 714 mG
    0x0B, 0x53, // Battery: 2899 mV
];

/// Format 5 reference frame.
pub const V5_FRAME: [u8; 26] = [
    0x99, 0x04, // Ruuvi company id
    0x05, // Format 5
    0x12, 0xFC, // Temperature: 24.30°C (0x12FC = 4860, 4860 * 0.005 = 24.30)
    0x53, 0x94, // Humidity: 53.49% (0x5394 = 21396, 21396 * 0.0025 = 53.49)
    0xC3, 0x7C, // Pressure: 100044 Pa (0xC37C = 50044, 50044 + 50000 = 100044)
    0x00, 0x04, // Acceleration X: 4 mG
    0xFF, 0xFC, // Acceleration Y: -4 mG
    0x04, 0x0C, // Acceleration Z: 1036 mG
    0xAC, 0x36, // Battery: 2977 mV, TX Power: 4 dBm
    0x42, // Movement counter: 66
    0x00, 0xCD, // Sequence: 205
    0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F, // MAC address
];

/// Format 6 reference frame: 29.5 C, 55.3 %, 101102 Pa, PM2.5 11.2, CO2 201,
/// VOC 10, NOx 2, ~13027 lux, sequence 205.
pub const V6_FRAME: [u8; 22] = [
    0x99, 0x04, 0x06, 0x17, 0x0C, 0x56, 0x68, 0xC7, 0x9E, 0x00, 0x70, 0x00, 0xC9, 0x05, 0x01,
    0xD9, 0xFF, 0xCD, 0x00, 0x4C, 0x88, 0x4F,
];

/// Format E1 frame sharing the format 6 climate values, plus the extended fields.
pub const E1_FRAME: [u8; 42] = [
    0x99, 0x04, // Ruuvi company id
    0xE1, // Format E1
    0x17, 0x0C, // Temperature: 29.5°C
    0x56, 0x68, // Humidity: 55.3%
    0xC7, 0x9E, // Pressure: 101102 Pa
    0x00, 0x65, // PM1.0: 10.1
    0x00, 0x70, // PM2.5: 11.2
    0x00, 0x79, // PM4.0: 12.1
    0x00, 0x83, // PM10: 13.1
    0x00, 0xC9, // CO2: 201 ppm
    0x05, // VOC index, top 8 bits
    0x01, // NOx index, top 8 bits
    0x13, 0xE0, 0xB6, // Luminosity: 13027.10 lux
    0xFF, 0xFF, 0xFF, // Reserved
    0x01, 0xE2, 0x40, // Sequence: 123456
    0x00, // Flags
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // Reserved
    0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F, // MAC address
];

/// Build a format 5 `Measurement` with all optional fields set to `None`.
///
/// Tests can override just the fields they care about.
pub fn base_measurement(timestamp: SystemTime) -> Measurement {
    Measurement::empty(DataFormat::V5, timestamp)
}

/// Assert a decoded scaled value is present and within quantization error.
#[track_caller]
pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

pub fn encode_v3(
    temperature: f64,
    humidity: f64,
    pressure: u32,
    acceleration: (i16, i16, i16),
    battery: u16,
) -> Vec<u8> {
    let mut frame = RUUVI_COMPANY_ID.to_vec();
    frame.push(0x03);
    frame.push((humidity / 0.5).round() as u8);
    let hundredths = (temperature.abs() * 100.0).round() as u32;
    let sign = if temperature < 0.0 { 0x80 } else { 0x00 };
    frame.push(sign | (hundredths / 100) as u8);
    frame.push((hundredths % 100) as u8);
    frame.extend_from_slice(&((pressure - 50_000) as u16).to_be_bytes());
    for axis in [acceleration.0, acceleration.1, acceleration.2] {
        frame.extend_from_slice(&axis.to_be_bytes());
    }
    frame.extend_from_slice(&battery.to_be_bytes());
    frame
}

pub fn encode_v6(m: &Measurement) -> Vec<u8> {
    let mut frame = RUUVI_COMPANY_ID.to_vec();
    frame.push(0x06);
    frame.extend_from_slice(&((m.temperature.unwrap() / 0.005).round() as i16).to_be_bytes());
    frame.extend_from_slice(&((m.humidity.unwrap() / 0.0025).round() as u16).to_be_bytes());
    frame.extend_from_slice(&((m.pressure.unwrap() - 50_000) as u16).to_be_bytes());
    frame.extend_from_slice(&((m.pm2_5.unwrap() / 0.1).round() as u16).to_be_bytes());
    frame.extend_from_slice(&m.co2.unwrap().to_be_bytes());

    let voc = m.voc_index.unwrap();
    let nox = m.nox_index.unwrap();
    frame.push((voc >> 1) as u8);
    frame.push((nox >> 1) as u8);

    let step = 65_536f64.ln() / 254.0;
    frame.push(((m.luminosity.unwrap() + 1.0).ln() / step).round() as u8);
    frame.push(0xFF);
    frame.push(m.measurement_sequence.unwrap() as u8);

    let flags = ((voc & 1) << 6) | ((nox & 1) << 7);
    frame.push(flags as u8);
    frame.extend_from_slice(&m.mac.unwrap().0[3..]);
    frame
}

pub fn encode_e1(m: &Measurement) -> Vec<u8> {
    fn pm(value: Option<f64>) -> [u8; 2] {
        value
            .map_or(u16::MAX, |v| (v / 0.1).round() as u16)
            .to_be_bytes()
    }

    let mut frame = RUUVI_COMPANY_ID.to_vec();
    frame.push(0xE1);
    frame.extend_from_slice(&((m.temperature.unwrap() / 0.005).round() as i16).to_be_bytes());
    frame.extend_from_slice(&((m.humidity.unwrap() / 0.0025).round() as u16).to_be_bytes());
    frame.extend_from_slice(&((m.pressure.unwrap() - 50_000) as u16).to_be_bytes());
    for value in [m.pm1_0, m.pm2_5, m.pm4_0, m.pm10_0] {
        frame.extend_from_slice(&pm(value));
    }
    frame.extend_from_slice(&m.co2.unwrap().to_be_bytes());

    let voc = m.voc_index.unwrap();
    let nox = m.nox_index.unwrap();
    frame.push((voc >> 1) as u8);
    frame.push((nox >> 1) as u8);

    let luminosity = (m.luminosity.unwrap() / 0.01).round() as u32;
    frame.extend_from_slice(&luminosity.to_be_bytes()[1..]);
    frame.extend_from_slice(&[0xFF; 3]);
    frame.extend_from_slice(&m.measurement_sequence.unwrap().to_be_bytes()[1..]);

    let flags = ((voc & 1) << 6) | ((nox & 1) << 7);
    frame.push(flags as u8);
    frame.extend_from_slice(&[0xFF; 5]);
    frame.extend_from_slice(&m.mac.unwrap().0);
    frame
}
