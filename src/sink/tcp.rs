//! Line protocol over a plain TCP connection, e.g. a Telegraf `socket_listener`.

use super::{BufferedPoint, PointWriter, SinkError, WriteFuture};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Bound on connecting and on writing a single line.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends each point as one newline-terminated line.
///
/// The connection is opened on first use and thrown away after any error;
/// the next write reconnects. Delivery is at least once: a write that times
/// out partway leaves a truncated line on the abandoned connection, and the
/// retry sends the whole line again on a new one. Listeners should discard
/// an unterminated final line when a connection closes.
pub struct TcpLineSink {
    addr: String,
    io_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpLineSink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            stream: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream, SinkError> {
        let stream = timeout(self.io_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| SinkError::Unavailable(format!("connect to {} timed out", self.addr)))??;
        tracing::debug!(addr = %self.addr, "connected");
        Ok(stream)
    }

    async fn send_line(&self, line: &str) -> Result<(), SinkError> {
        let mut slot = self.stream.lock().await;
        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        timeout(self.io_timeout, stream.write_all(&buf))
            .await
            .map_err(|_| SinkError::Unavailable(format!("write to {} timed out", self.addr)))??;

        *slot = Some(stream);
        Ok(())
    }
}

impl PointWriter<String> for TcpLineSink {
    fn write<'a>(&'a self, point: &'a BufferedPoint<String>) -> WriteFuture<'a> {
        Box::pin(self.send_line(&point.data))
    }
}
