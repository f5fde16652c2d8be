//! Manufacturer-data decoder for RuuviTag broadcasts.
//!
//! A scanned frame carries no out-of-band format tag, so [`decode`] tries each
//! known layout in a fixed order (E1, 6, 5, 3) and returns the first one whose
//! manufacturer id, format byte and exact length all check out. A frame that
//! matches none of them is rejected as a whole; there is no partial decode.
//!
//! Every input here is the complete manufacturer-specific data, including the
//! two-byte company identifier (`0x99 0x04`, i.e. 0x0499 little-endian).

pub mod e1;
pub mod v3;
pub mod v5;
pub mod v6;

use crate::measurement::{DataFormat, Measurement};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Ruuvi Innovations company identifier as it appears on the wire.
pub const RUUVI_COMPANY_ID: [u8; 2] = [0x99, 0x04];

/// Why a single format rejected a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("frame is {0} bytes, too short for a header")]
    TooShort(usize),
    #[error("manufacturer id {:02X}{:02X} is not Ruuvi", .found[1], .found[0])]
    ManufacturerMismatch { found: [u8; 2] },
    #[error("format byte {found:#04x}, expected {expected:#04x}")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("format {format} needs {expected} bytes, got {found}")]
    LengthMismatch {
        format: DataFormat,
        expected: usize,
        found: usize,
    },
}

/// Returned by [`decode`] when no known format accepts the frame.
///
/// Holds the rejection reason of every candidate, in the order they were tried.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unrecognized data {}: {}", Hex(.raw), Rejections(.rejections))]
pub struct DecodeError {
    pub raw: Vec<u8>,
    pub rejections: Vec<(DataFormat, FormatError)>,
}

struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

struct Rejections<'a>(&'a [(DataFormat, FormatError)]);

impl fmt::Display for Rejections<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (format, error)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "format {format}: {error}")?;
        }
        Ok(())
    }
}

type Parser = fn(&[u8], SystemTime) -> Result<Measurement, FormatError>;

/// Candidate layouts, richest first.
const PARSERS: [(DataFormat, Parser); 4] = [
    (DataFormat::E1, e1::parse),
    (DataFormat::V6, v6::parse),
    (DataFormat::V5, v5::parse),
    (DataFormat::V3, v3::parse),
];

/// Decode a frame received at `received_at`.
pub fn decode_at(raw: &[u8], received_at: SystemTime) -> Result<Measurement, DecodeError> {
    let mut rejections = Vec::with_capacity(PARSERS.len());
    for (format, parser) in PARSERS {
        match parser(raw, received_at) {
            Ok(measurement) => return Ok(measurement),
            Err(error) => rejections.push((format, error)),
        }
    }
    Err(DecodeError {
        raw: raw.to_vec(),
        rejections,
    })
}

/// Decode a frame received just now.
pub fn decode(raw: &[u8]) -> Result<Measurement, DecodeError> {
    decode_at(raw, SystemTime::now())
}

/// Like [`decode_at`], but a mismatch is just `None`.
///
/// Most frames on the air are not from a tag at all, so the rejection
/// reasons only go to the trace log.
pub fn parse_at(raw: &[u8], received_at: SystemTime) -> Option<Measurement> {
    match decode_at(raw, received_at) {
        Ok(measurement) => Some(measurement),
        Err(error) => {
            tracing::trace!(%error, "failed to parse data");
            None
        }
    }
}

/// Like [`decode`], but a mismatch is just `None`.
pub fn parse(raw: &[u8]) -> Option<Measurement> {
    parse_at(raw, SystemTime::now())
}

/// Validate the common header and return the payload starting at the format byte.
///
/// `payload_len` counts the format byte but not the company id.
fn payload(raw: &[u8], format: DataFormat, payload_len: usize) -> Result<Fields<'_>, FormatError> {
    let (company, rest) = raw
        .split_first_chunk::<2>()
        .ok_or(FormatError::TooShort(raw.len()))?;
    if *company != RUUVI_COMPANY_ID {
        return Err(FormatError::ManufacturerMismatch { found: *company });
    }

    let &found = rest.first().ok_or(FormatError::TooShort(raw.len()))?;
    let expected = format.version_byte();
    if found != expected {
        return Err(FormatError::VersionMismatch { expected, found });
    }

    if rest.len() != payload_len {
        return Err(FormatError::LengthMismatch {
            format,
            expected: payload_len + RUUVI_COMPANY_ID.len(),
            found: raw.len(),
        });
    }

    Ok(Fields(rest))
}

/// Big-endian field reader over a payload whose length has already been checked.
#[derive(Clone, Copy)]
struct Fields<'a>(&'a [u8]);

impl<'a> Fields<'a> {
    fn u8(self, at: usize) -> u8 {
        self.0[at]
    }

    fn u16(self, at: usize) -> u16 {
        u16::from_be_bytes([self.0[at], self.0[at + 1]])
    }

    fn i16(self, at: usize) -> i16 {
        i16::from_be_bytes([self.0[at], self.0[at + 1]])
    }

    fn u24(self, at: usize) -> u32 {
        u32::from_be_bytes([0, self.0[at], self.0[at + 1], self.0[at + 2]])
    }

    fn slice(self, at: usize) -> &'a [u8] {
        &self.0[at..]
    }
}

/// Temperature in 0.005 C steps, `0x8000` means unavailable.
fn temperature(raw: i16) -> Option<f64> {
    (raw != i16::MIN).then(|| f64::from(raw) * 0.005)
}

/// Humidity in 0.0025 % steps, `0xFFFF` means unavailable.
fn humidity(raw: u16) -> Option<f64> {
    (raw != u16::MAX).then(|| f64::from(raw) * 0.0025)
}

/// Pressure offset from 50000 Pa, `0xFFFF` means unavailable.
fn pressure(raw: u16) -> Option<u32> {
    (raw != u16::MAX).then(|| u32::from(raw) + 50_000)
}

/// Particulate matter in 0.1 ug/m3 steps.
fn particulate(raw: u16) -> Option<f64> {
    (raw != u16::MAX).then(|| f64::from(raw) * 0.1)
}

/// VOC and NOx indexes are 9 bits: the top 8 in their own byte, the LSB in the flags.
fn air_index(high: u8, flags: u8, flag_bit: u8) -> Option<u16> {
    let value = (u16::from(high) << 1) | u16::from((flags >> flag_bit) & 1);
    (value != 0x1FF).then_some(value)
}
