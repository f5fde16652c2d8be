//! Ingestion loop: advertisements in, line protocol out.
//!
//! Each frame is decoded, stamped with its source, checked against the tag
//! allowlist and handed to every configured sink. This module is decoupled
//! from CLI parsing, logging setup and process exit codes so it can be
//! tested deterministically with an injected scanner and injected writers.

use crate::filter::TagFilter;
use crate::mac_address::MacAddress;
use crate::output::OutputFormatter;
use crate::output::influxdb::InfluxDbFormatter;
use crate::scanner::{Advertisement, Backend, ScanError};
use crate::sink::buffer::{DEFAULT_MAX_SIZE, DEFAULT_RETRY_INTERVAL};
use crate::sink::{
    BufferConfig, BufferedPoint, LineWriterSink, PointWriter, ResilientSink, TcpLineSink,
};
use crate::throttle::{Throttle, parse_duration};
use clap::Parser;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Command-line configuration.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "ruuvi_measurement")]
    pub influxdb_measurement: String,

    /// Where to send measurements: `stdout` or `tcp://HOST:PORT`.
    /// Repeat to send to several sinks.
    #[arg(long = "sink", value_name = "SINK", default_value = "stdout")]
    pub sinks: Vec<SinkTarget>,

    /// Only forward these tags. Repeat for several; none means all tags.
    /// Format: --tag DE:AD:BE:EF:00:00
    #[arg(long = "tag", value_name = "MAC")]
    pub tags: Vec<MacAddress>,

    /// Forward at most one measurement per tag per interval, per sink.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    #[arg(long, value_parser = parse_duration)]
    pub minimum_interval: Option<Duration>,

    /// Maximum number of points buffered per sink while it is unreachable.
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
    pub buffer_max_size: usize,

    /// Base interval between retries of buffered points.
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub retry_interval: Duration,

    /// Verbose output, log unrecognized frames and filtered tags
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,
}

impl Options {
    /// Log filter used when `RUST_LOG` is unset. Rejected frames and
    /// filtered tags are logged at trace, so `-v` has to reach it.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "trace" } else { "info" }
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            max_size: self.buffer_max_size,
            retry_interval: self.retry_interval,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            influxdb_measurement: "ruuvi_measurement".to_string(),
            sinks: vec![SinkTarget::Stdout],
            tags: Vec::new(),
            minimum_interval: None,
            buffer_max_size: DEFAULT_MAX_SIZE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            verbose: false,
            backend: Backend::default(),
        }
    }
}

/// A configured downstream destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Stdout,
    Tcp(String),
}

impl SinkTarget {
    /// Build the writer for this target.
    pub fn writer(&self) -> Box<dyn PointWriter<String>> {
        match self {
            SinkTarget::Stdout => Box::new(LineWriterSink::new(std::io::stdout())),
            SinkTarget::Tcp(addr) => Box::new(TcpLineSink::new(addr.clone())),
        }
    }
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Stdout => write!(f, "stdout"),
            SinkTarget::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

impl FromStr for SinkTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "stdout" {
            return Ok(SinkTarget::Stdout);
        }
        match s.strip_prefix("tcp://") {
            Some(addr) if addr.rsplit_once(':').is_some_and(|(host, port)| {
                !host.is_empty() && port.parse::<u16>().is_ok()
            }) =>
            {
                Ok(SinkTarget::Tcp(addr.to_string()))
            }
            _ => Err(format!(
                "invalid sink '{s}': expected stdout or tcp://HOST:PORT"
            )),
        }
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>
    {
        Box::pin(crate::scanner::start_scan(backend))
    }
}

/// One downstream destination with its own pacing.
struct Route {
    sink: ResilientSink<String>,
    throttle: Option<Throttle>,
}

/// Run the ingestion loop until the scanner stops.
///
/// `writers` pairs a sink name with its writer; each gets its own buffer.
/// All sinks are stopped once the scanner's channel closes; points still
/// buffered at that moment are discarded.
pub async fn run(
    options: Options,
    scanner: &dyn Scanner,
    filter: &TagFilter,
    writers: Vec<(String, Box<dyn PointWriter<String>>)>,
) -> Result<(), RunError> {
    let formatter = InfluxDbFormatter::new(options.influxdb_measurement.clone());
    let config = options.buffer_config();

    let mut routes: Vec<Route> = writers
        .into_iter()
        .map(|(name, writer)| Route {
            sink: ResilientSink::new_boxed(name, config, writer),
            throttle: options.minimum_interval.map(Throttle::new),
        })
        .collect();

    let mut advertisements = scanner.start_scan(options.backend).await?;
    tracing::info!(backend = %options.backend, sinks = routes.len(), "scanning");

    while let Some(advertisement) = advertisements.recv().await {
        let Some(measurement) = crate::decoder::parse(&advertisement.manufacturer_data) else {
            continue;
        };
        let measurement = measurement.with_source(advertisement.address, advertisement.rssi);

        if !filter.is_enabled(&advertisement.address) {
            tracing::trace!(mac = %advertisement.address, "tag not enabled, skipping");
            continue;
        }

        let Some(line) = formatter.format(&measurement) else {
            continue;
        };

        for route in &mut routes {
            let due = route
                .throttle
                .as_mut()
                .is_none_or(|t| t.should_emit(advertisement.address));
            if due {
                route.sink.write(BufferedPoint::new(line.clone())).await;
            }
        }
    }

    tracing::info!("scanner stopped, shutting down sinks");
    for route in &routes {
        if !route.sink.is_empty() {
            tracing::warn!(
                sink = %route.sink.name(),
                buffer_size = route.sink.len(),
                "discarding buffered points"
            );
        }
        route.sink.stop();
    }

    Ok(())
}
