//! Decoding of `ipmitool raw` responses.
//!
//! Raw responses are hex bytes with leading zero bytes omitted, e.g.
//! ` 80 01` for 0x8001. They are left-padded to 8 bytes and read as a
//! big-endian unsigned integer.

use tracing::error;

use crate::value::Reading;
use crate::{Error, Result};

/// Hex digits in a fully padded 64-bit payload.
pub const PAYLOAD_WIDTH: usize = 16;

/// Decodes a raw hex payload into an integer.
///
/// Whitespace between bytes is ignored. An empty payload is 0.
pub fn decode_payload(payload: &str) -> Result<u64> {
    let digits: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::RawPayload(payload.to_string()));
    }
    if digits.len() > PAYLOAD_WIDTH {
        return Err(Error::RawPayloadTooLong(payload.to_string()));
    }

    // Big-endian: the most significant byte comes first in the padded string.
    let padded = format!("{:0>width$}", digits, width = PAYLOAD_WIDTH);
    u64::from_str_radix(&padded, 16).map_err(|_| Error::RawPayload(payload.to_string()))
}

/// Builds a reading from a raw response, logging and substituting 0 on failure.
pub fn raw_reading(name: &str, payload: &str, unit: &str) -> Reading {
    let value = decode_payload(payload).unwrap_or_else(|e| {
        error!("Could not parse raw ipmi output for {}: {}", name, e);
        0
    });
    Reading::new(name, value as f64, unit)
}
