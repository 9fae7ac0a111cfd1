//! Wire encodings shared by the issuer backends.
//!
//! Vault takes SAN lists as a single comma-joined string and TTLs as duration
//! strings such as `720h0m0s`. These are plain functions called while building
//! a request rather than serialization hooks, so each encoding can be checked
//! on its own.

use crate::errors::{IssuerError, Result};
use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Join SAN entries with commas.
///
/// Returns `None` for an empty list so the field is left out of the request
/// instead of being sent as an empty string.
pub fn encode_sans(sans: &[String]) -> Option<String> {
    if sans.is_empty() {
        None
    } else {
        Some(sans.join(","))
    }
}

/// Split a comma-joined SAN list, trimming whitespace and dropping empty entries.
pub fn decode_sans(encoded: &str) -> Vec<String> {
    encoded
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a duration in its canonical string form (`24h0m0s`, `1m30s`, `1.5s`, `250ms`).
///
/// Durations of a second or more are written as hours, minutes and seconds,
/// omitting leading zero units. Shorter durations use the largest of
/// `ms`, `µs` or `ns` that keeps the whole part non-zero.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SECOND {
        let (scale, unit) = if nanos < 1_000 {
            (1, "ns")
        } else if nanos < 1_000_000 {
            (1_000, "µs")
        } else {
            (1_000_000, "ms")
        };
        return format!("{}{}", format_fraction(nanos, scale), unit);
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = u128::from(total_secs % 60) * NANOS_PER_SECOND + u128::from(duration.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format_fraction(seconds, NANOS_PER_SECOND));
    out.push('s');
    out
}

/// `value / scale` as a decimal with trailing zeros trimmed.
fn format_fraction(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }

    let width = scale.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse a duration string such as `30m`, `1h30m`, `720h0m0s` or `250ms`.
///
/// Accepts the units `h`, `m`, `s`, `ms`, `us`/`µs` and `ns`, with optional
/// decimal fractions (`1.5h`). A bare `0` is accepted; any other number
/// without a unit is rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let text = input.trim();
    if text.is_empty() {
        return Err(IssuerError::config("empty duration"));
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || IssuerError::config(format!("invalid duration '{}'", input));

    let mut total_nanos: u128 = 0;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "h" => 3600 * NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "s" => NANOS_PER_SECOND,
            "ms" => 1_000_000,
            "us" | "µs" => 1_000,
            "ns" => 1,
            _ => return Err(invalid()),
        };

        let (whole, frac) = match number.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (number, ""),
        };
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let mut value = whole.checked_mul(unit_nanos).ok_or_else(invalid)?;

        let mut place = unit_nanos;
        for digit in frac.chars() {
            place /= 10;
            let digit = u128::from(digit.to_digit(10).ok_or_else(invalid)?);
            value += digit * place;
        }

        total_nanos = total_nanos.checked_add(value).ok_or_else(invalid)?;
        rest = tail;
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SECOND).map_err(|_| invalid())?;
    Ok(Duration::new(secs, (total_nanos % NANOS_PER_SECOND) as u32))
}
