//! Per-tag minimum interval between forwarded measurements.
//!
//! Tags advertise every second or so; a sink that only wants a reading every
//! minute gets its own [`Throttle`].

use crate::mac_address::MacAddress;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Allows at most one event per `interval` for each device.
///
/// The first event for a device is always allowed, and only allowed events
/// restart the device's timer.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emitted: HashMap<MacAddress, Instant>,
}

impl Throttle {
    /// ```
    /// use std::time::Duration;
    /// use ruuvi_gateway::throttle::Throttle;
    ///
    /// let throttle = Throttle::new(Duration::from_secs(3));
    /// assert_eq!(throttle.interval(), Duration::from_secs(3));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_emitted: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether an event from `mac` should go out now.
    pub fn should_emit(&mut self, mac: MacAddress) -> bool {
        self.should_emit_at(mac, Instant::now())
    }

    /// Like [`Throttle::should_emit`] with an explicit clock reading.
    pub fn should_emit_at(&mut self, mac: MacAddress, now: Instant) -> bool {
        match self.last_emitted.get(&mac) {
            Some(last) if now.saturating_duration_since(*last) < self.interval => false,
            _ => {
                self.last_emitted.insert(mac, now);
                true
            }
        }
    }
}

/// Parse a duration such as `500ms`, `3s`, `1m` or `2h`.
///
/// A bare number is taken as seconds.
///
/// ```
/// use ruuvi_gateway::throttle::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1000)];

    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (number, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, millis)| src.strip_suffix(suffix).map(|n| (n.trim(), *millis)))
        .unwrap_or((src, 1000));

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration out of range: {src}"))
}
