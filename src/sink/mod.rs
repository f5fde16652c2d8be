//! Downstream delivery.
//!
//! A sink is anything implementing [`PointWriter`]: it takes one already
//! serialized point and either delivers it or fails. [`ResilientSink`] wraps a
//! writer with a bounded retry queue so a sink outage never stalls ingestion.

pub mod buffer;
pub mod line;
pub mod tcp;

pub use buffer::{BufferConfig, ResilientSink};
pub use line::LineWriterSink;
pub use tcp::TcpLineSink;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::SystemTime;
use thiserror::Error;

/// A serialized point waiting for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedPoint<T> {
    /// Sink-specific payload, opaque to the buffer
    pub data: T,
    /// When the point was first handed to the sink
    pub timestamp: SystemTime,
}

impl<T> BufferedPoint<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: SystemTime::now(),
        }
    }
}

/// A failed delivery attempt. Every variant is treated as retryable.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Future returned by [`PointWriter::write`].
pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// A single delivery attempt for one point.
pub trait PointWriter<T>: Send + Sync {
    fn write<'a>(&'a self, point: &'a BufferedPoint<T>) -> WriteFuture<'a>;
}

/// Plain functions and closures work as synchronous writers.
impl<T, F> PointWriter<T> for F
where
    F: Fn(&BufferedPoint<T>) -> Result<(), SinkError> + Send + Sync,
{
    fn write<'a>(&'a self, point: &'a BufferedPoint<T>) -> WriteFuture<'a> {
        Box::pin(std::future::ready(self(point)))
    }
}
