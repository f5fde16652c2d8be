//! Sources of raw RuuviTag advertisements.
//!
//! Backends only capture frames; decoding happens in the ingestion loop, so a
//! backend never needs to know which data formats exist.

#[cfg(feature = "bluer")]
pub mod bluer;

pub mod mock;

use crate::mac_address::MacAddress;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Channel buffer size for captured advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Ruuvi Innovations company identifier, as BlueZ keys manufacturer data.
pub const RUUVI_MANUFACTURER_ID: u16 = 0x0499;

/// One captured broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Address the frame was sent from
    pub address: MacAddress,
    /// Signal strength, when the backend reports it
    pub rssi: Option<i16>,
    /// Manufacturer-specific data, starting with the 2-byte company id
    pub manufacturer_data: Vec<u8>,
}

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Two simulated tags, no hardware needed
    Mock,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(not(feature = "bluer"))]
        return Backend::Mock;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            Backend::Mock => write!(f, "mock"),
        }
    }
}

/// Start capturing advertisements with the given backend.
///
/// The receiver yields frames until the backend shuts down.
pub async fn start_scan(backend: Backend) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan().await,
        Backend::Mock => Ok(mock::start_scan(mock::MOCK_INTERVAL)),
    }
}
