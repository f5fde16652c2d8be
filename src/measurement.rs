//! Normalized sensor reading produced by the decoder.

use crate::mac_address::MacAddress;
use std::fmt;
use std::time::SystemTime;

/// Payload layout a measurement was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// RAWv1, 14 bytes.
    V3,
    /// RAWv2, 24 bytes.
    V5,
    /// Air quality, 20 bytes.
    V6,
    /// Extended air quality, 40 bytes.
    E1,
}

impl DataFormat {
    /// The format-version byte that opens the payload.
    pub const fn version_byte(self) -> u8 {
        match self {
            DataFormat::V3 => 0x03,
            DataFormat::V5 => 0x05,
            DataFormat::V6 => 0x06,
            DataFormat::E1 => 0xE1,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::V3 => write!(f, "3"),
            DataFormat::V5 => write!(f, "5"),
            DataFormat::V6 => write!(f, "6"),
            DataFormat::E1 => write!(f, "E1"),
        }
    }
}

/// A measurement from a RuuviTag sensor.
///
/// Units:
/// - Temperature in Celsius
/// - Humidity in percent (0-100)
/// - Pressure in Pascals
/// - Acceleration in milli-g
/// - Battery voltage in millivolts
/// - TX power and RSSI in dBm
/// - Particulate matter in ug/m3, CO2 in ppm, luminosity in lux
/// - VOC/NOx indexes are unitless scores
///
/// Fields a format does not carry, or carries with its "not available"
/// marker, are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub data_format: DataFormat,
    /// Source address. Taken from the payload when the format embeds it,
    /// otherwise filled in from the advertisement.
    pub mac: Option<MacAddress>,
    /// Received signal strength of the advertisement
    pub rssi: Option<i16>,
    /// When the frame was received
    pub timestamp: SystemTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<u32>,
    /// Acceleration vector (x, y, z)
    pub acceleration: Option<(i16, i16, i16)>,
    pub battery_voltage: Option<u16>,
    pub tx_power: Option<i8>,
    pub movement_counter: Option<u32>,
    pub measurement_sequence: Option<u32>,
    pub pm1_0: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm4_0: Option<f64>,
    pub pm10_0: Option<f64>,
    pub co2: Option<u16>,
    pub voc_index: Option<u16>,
    pub nox_index: Option<u16>,
    pub luminosity: Option<f64>,
}

impl Measurement {
    /// An empty reading of the given format; decoders fill in what they find.
    pub(crate) fn empty(data_format: DataFormat, timestamp: SystemTime) -> Self {
        Self {
            data_format,
            mac: None,
            rssi: None,
            timestamp,
            temperature: None,
            humidity: None,
            pressure: None,
            acceleration: None,
            battery_voltage: None,
            tx_power: None,
            movement_counter: None,
            measurement_sequence: None,
            pm1_0: None,
            pm2_5: None,
            pm4_0: None,
            pm10_0: None,
            co2: None,
            voc_index: None,
            nox_index: None,
            luminosity: None,
        }
    }

    /// Stamp the advertisement's address and signal strength onto the reading.
    ///
    /// The advertisement address wins over any address embedded in the
    /// payload, since it is the one the allowlist is written against.
    pub fn with_source(self, address: MacAddress, rssi: Option<i16>) -> Self {
        Self {
            mac: Some(address),
            rssi,
            ..self
        }
    }
}
