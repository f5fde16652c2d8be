//! Simulated tags for running without Bluetooth hardware.
//!
//! Two tags, one indoors and one in a sauna, random-walk their climate values
//! and broadcast format 5 frames on a fixed tick.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement};
use crate::decoder::v5;
use crate::mac_address::MacAddress;
use crate::measurement::{DataFormat, Measurement};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

/// Time between broadcast rounds.
pub const MOCK_INTERVAL: Duration = Duration::from_secs(2);

struct MockTag {
    mac: MacAddress,
    temperature: f64,
    humidity: f64,
    pressure: u32,
    battery_voltage: u16,
    sequence: u32,
}

impl MockTag {
    fn step(&mut self, rng: &mut impl Rng) {
        self.temperature = (self.temperature + rng.gen_range(-0.05..0.05)).clamp(-30.0, 80.0);
        self.humidity = (self.humidity + rng.gen_range(-0.1..0.1)).clamp(0.0, 99.0);
        self.pressure = self.pressure.saturating_add_signed(rng.gen_range(-1..=1));
        self.sequence = (self.sequence + 1) % u32::from(u16::MAX);
    }

    fn frame(&self, rng: &mut impl Rng) -> Vec<u8> {
        let mut m = Measurement::empty(DataFormat::V5, SystemTime::now());
        m.mac = Some(self.mac);
        m.temperature = Some(self.temperature);
        m.humidity = Some(self.humidity);
        m.pressure = Some(self.pressure);
        m.acceleration = Some((
            rng.gen_range(-20..20),
            rng.gen_range(-20..20),
            rng.gen_range(980..1020),
        ));
        m.battery_voltage = Some(self.battery_voltage);
        m.tx_power = Some(4);
        m.movement_counter = Some(rng.gen_range(0..255));
        m.measurement_sequence = Some(self.sequence);
        v5::encode(&m)
    }
}

fn tags() -> Vec<MockTag> {
    vec![
        MockTag {
            mac: MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            temperature: 24.0,
            humidity: 45.0,
            pressure: 101_300,
            battery_voltage: 3000,
            sequence: 0,
        },
        MockTag {
            mac: MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            temperature: 80.0,
            humidity: 10.0,
            pressure: 100_000,
            battery_voltage: 2800,
            sequence: 1000,
        },
    ]
}

/// Start broadcasting simulated frames every `interval`.
///
/// Runs until the receiver is dropped.
pub fn start_scan(interval: Duration) -> mpsc::Receiver<Advertisement> {
    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        tracing::info!("starting mock BLE scanner");
        let mut rng = StdRng::from_entropy();
        let mut tags = tags();
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            for tag in &mut tags {
                tag.step(&mut rng);
                let advertisement = Advertisement {
                    address: tag.mac,
                    rssi: Some(rng.gen_range(-90..-50)),
                    manufacturer_data: tag.frame(&mut rng),
                };
                if tx.send(advertisement).await.is_err() {
                    return;
                }
            }
        }
    });

    rx
}
