//! `ruuvi-gateway` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. Frame decoding lives in [`decoder`], buffered
//! delivery in [`sink`], and the loop tying them together in [`app`], where
//! it can be tested deterministically with an injected scanner and writers.

pub mod app;
pub mod decoder;
pub mod filter;
pub mod mac_address;
pub mod measurement;
pub mod output;
pub mod scanner;
pub mod sink;
pub mod throttle;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use decoder::{DecodeError, FormatError, decode, decode_at, parse, parse_at};
pub use filter::TagFilter;
pub use mac_address::MacAddress;
pub use measurement::{DataFormat, Measurement};
pub use output::OutputFormatter;
pub use output::influxdb::InfluxDbFormatter;
pub use scanner::{Advertisement, Backend, ScanError};
pub use sink::{
    BufferConfig, BufferedPoint, LineWriterSink, PointWriter, ResilientSink, SinkError,
    TcpLineSink,
};
pub use throttle::{Throttle, parse_duration};
