//! BlueZ D-Bus backend.
//!
//! Registers an advertisement monitor matching the Ruuvi company id, so BlueZ
//! only wakes us for frames that can possibly decode. Requires `bluetoothd`.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, RUUVI_MANUFACTURER_ID, ScanError};
use crate::decoder::RUUVI_COMPANY_ID;
use crate::mac_address::MacAddress;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use tokio::sync::mpsc;

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
const MANUFACTURER_DATA_TYPE: u8 = 0xff;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Power the default adapter and start a passive scan.
///
/// Captured frames are sent through the returned channel until the receiver
/// is dropped.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    let pattern = Pattern {
        data_type: MANUFACTURER_DATA_TYPE,
        start_position: 0,
        content: RUUVI_COMPANY_ID.to_vec(),
    };

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![pattern]),
            ..Default::default()
        })
        .await?;

    tracing::info!(adapter = %adapter.name(), "started BlueZ advertisement monitor");

    // The task owns the session and monitor so they live as long as the scan.
    tokio::spawn(async move {
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            let MonitorEvent::DeviceFound(device_id) = event else {
                continue;
            };
            match capture(&adapter, device_id.device).await {
                Ok(Some(advertisement)) => {
                    if tx.send(advertisement).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(error) => tracing::debug!(%error, "failed to read advertisement"),
            }
        }
    });

    Ok(rx)
}

/// Read the Ruuvi manufacturer data a device last advertised.
///
/// BlueZ hands out manufacturer data keyed by company id, so the id is put
/// back in front to restore the frame as broadcast.
async fn capture(adapter: &Adapter, address: Address) -> Result<Option<Advertisement>, ScanError> {
    let device = adapter.device(address)?;

    let Some(mut manufacturer_data) = device.manufacturer_data().await? else {
        return Ok(None);
    };
    let Some(data) = manufacturer_data.remove(&RUUVI_MANUFACTURER_ID) else {
        return Ok(None);
    };

    let mut frame = Vec::with_capacity(RUUVI_COMPANY_ID.len() + data.len());
    frame.extend_from_slice(&RUUVI_COMPANY_ID);
    frame.extend_from_slice(&data);

    Ok(Some(Advertisement {
        address: MacAddress::from(address),
        rssi: device.rssi().await?,
        manufacturer_data: frame,
    }))
}
