//! Newline-terminated output to any `io::Write`, typically stdout.

use super::{BufferedPoint, PointWriter, SinkError, WriteFuture};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Writes each point as one line and flushes, so a closed pipe surfaces as a
/// failed write instead of a silently filled buffer.
pub struct LineWriterSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineWriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> PointWriter<String> for LineWriterSink<W> {
    fn write<'a>(&'a self, point: &'a BufferedPoint<String>) -> WriteFuture<'a> {
        Box::pin(std::future::ready(self.write_line(&point.data)))
    }
}
