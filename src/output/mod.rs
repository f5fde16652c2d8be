//! Serialization of measurements for the downstream sinks.
//!
//! Sinks treat what comes out of here as opaque; currently every sink speaks
//! InfluxDB line protocol.

pub mod influxdb;

use crate::measurement::Measurement;

/// Trait for formatting measurements into output strings.
pub trait OutputFormatter: Send + Sync {
    /// Format a measurement, or `None` if it has nothing worth sending.
    fn format(&self, measurement: &Measurement) -> Option<String>;
}
