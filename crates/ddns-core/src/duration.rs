//! Human-readable durations
//!
//! Accepts one or more whitespace-separated `<integer><unit>` terms and sums
//! them, e.g. `30min`, `1h 30min`, `1d 2h 3min 4s 5ms`. Units are `d`, `h`,
//! `min`, `s` and `ms`.

use crate::error::{Error, Result};
use std::time::Duration;

fn unit_millis(unit: &str) -> Option<u64> {
    match unit {
        "d" => Some(24 * 60 * 60 * 1000),
        "h" => Some(60 * 60 * 1000),
        "min" => Some(60 * 1000),
        "s" => Some(1000),
        "ms" => Some(1),
        _ => None,
    }
}

/// Parse a duration such as `"1h 30min"`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |reason: &str| Error::config(format!("invalid duration '{input}': {reason}"));

    let mut rest = input.trim_start();
    if rest.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid("number too large"))?;
        rest = rest[digits..].trim_start();

        let letters = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let unit = &rest[..letters];
        let millis = unit_millis(unit).ok_or_else(|| {
            if unit.is_empty() {
                invalid("missing unit")
            } else {
                invalid(&format!("unknown unit '{unit}'"))
            }
        })?;
        rest = &rest[letters..];

        // terms must be separated by whitespace
        if rest.starts_with(|c: char| !c.is_whitespace()) {
            return Err(invalid("terms must be separated by whitespace"));
        }
        rest = rest.trim_start();

        total = value
            .checked_mul(millis)
            .and_then(|term| total.checked_add(term))
            .ok_or_else(|| invalid("overflow"))?;
    }

    Ok(Duration::from_millis(total))
}
