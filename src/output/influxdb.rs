//! InfluxDB line protocol output formatter.

use crate::measurement::Measurement;
use crate::output::OutputFormatter;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::Integer(num) => write!(f, "{num}i"),
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<&'static str, String>,
    pub field_set: BTreeMap<&'static str, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", escape(&self.measurement, &[',', ' ']))?;
        for (key, value) in &self.tag_set {
            write!(f, ",{key}={}", escape(value, &[',', '=', ' ']))?;
        }

        let mut separator = ' ';
        for (key, value) in &self.field_set {
            write!(f, "{separator}{key}={value}")?;
            separator = ',';
        }

        // Times before the epoch cannot be expressed; leave them to the server.
        if let Some(nanos) = self
            .timestamp
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        {
            write!(f, " {}", nanos.as_nanos())?;
        }
        Ok(())
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// InfluxDB line protocol formatter.
///
/// Tags each point with the source address and data format. Values keep the
/// units of [`Measurement`]; counters and integer readings become integer fields.
pub struct InfluxDbFormatter {
    /// The measurement name in InfluxDB
    measurement_name: String,
}

impl InfluxDbFormatter {
    pub fn new(measurement_name: impl Into<String>) -> Self {
        Self {
            measurement_name: measurement_name.into(),
        }
    }

    fn tag_set(&self, m: &Measurement) -> BTreeMap<&'static str, String> {
        let mut tags = BTreeMap::new();
        if let Some(mac) = m.mac {
            tags.insert("mac", mac.to_string());
        }
        tags.insert("data_format", m.data_format.to_string());
        tags
    }

    fn field_set(&self, m: &Measurement) -> BTreeMap<&'static str, FieldValue> {
        let mut fields = BTreeMap::new();

        macro_rules! float {
            ($name:literal, $val:expr) => {
                if let Some(v) = $val {
                    fields.insert($name, FieldValue::Float(v));
                }
            };
        }
        macro_rules! integer {
            ($name:literal, $val:expr) => {
                if let Some(v) = $val {
                    fields.insert($name, FieldValue::Integer(i64::from(v)));
                }
            };
        }

        float!("temperature", m.temperature);
        float!("humidity", m.humidity);
        integer!("pressure", m.pressure);
        integer!("battery_voltage", m.battery_voltage);
        integer!("tx_power", m.tx_power);
        integer!("movement_counter", m.movement_counter);
        integer!("measurement_sequence_number", m.measurement_sequence);
        integer!("rssi", m.rssi);
        float!("pm1_0", m.pm1_0);
        float!("pm2_5", m.pm2_5);
        float!("pm4_0", m.pm4_0);
        float!("pm10_0", m.pm10_0);
        integer!("co2", m.co2);
        integer!("voc_index", m.voc_index);
        integer!("nox_index", m.nox_index);
        float!("luminosity", m.luminosity);

        if let Some((x, y, z)) = m.acceleration {
            fields.insert("acceleration_x", FieldValue::Integer(x.into()));
            fields.insert("acceleration_y", FieldValue::Integer(y.into()));
            fields.insert("acceleration_z", FieldValue::Integer(z.into()));
        }

        fields
    }

    pub fn to_data_point(&self, measurement: &Measurement) -> DataPoint {
        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set: self.tag_set(measurement),
            field_set: self.field_set(measurement),
            timestamp: Some(measurement.timestamp),
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    /// A line needs at least one field, so an all-empty reading yields `None`.
    fn format(&self, measurement: &Measurement) -> Option<String> {
        let point = self.to_data_point(measurement);
        (!point.field_set.is_empty()).then(|| point.to_string())
    }
}
