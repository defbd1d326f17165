// Block durations for the new-account gates.
//
// A configured duration is either empty (feature off), the literal "-1"
// (block forever) or a composable duration such as "24h", "12h30m", "1.5h".

use chrono::Duration;
use thiserror::Error;

/// Configured value meaning "block indefinitely".
pub const INDEFINITE: &str = "-1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parsed form of a configured duration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDuration {
    Disabled,
    Indefinite,
    For(Duration),
}

impl BlockDuration {
    pub fn parse(raw: &str) -> Result<Self, DurationParseError> {
        match raw.trim() {
            "" => Ok(BlockDuration::Disabled),
            INDEFINITE => Ok(BlockDuration::Indefinite),
            value => parse_duration(value).map(BlockDuration::For),
        }
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a sequence of decimal numbers each followed by a unit
/// (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). `"0"` needs no unit.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError::Invalid(input.to_string());
    let overflow = || DurationParseError::Overflow(input.to_string());

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(DurationParseError::Negative(input.to_string()));
    }
    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, after) = rest.split_at(int_len);

        let (frac_part, after) = match after.strip_prefix('.') {
            Some(tail) => {
                let frac_len = tail
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(tail.len());
                tail.split_at(frac_len)
            }
            None => ("", after),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Anything past nanosecond precision is noise.
        let frac_part = &frac_part[..frac_part.len().min(18)];
        if !frac_part.is_empty() {
            let frac: u128 = frac_part.parse().map_err(|_| invalid())?;
            let divisor = 10u128.pow(frac_part.len() as u32);
            value = value
                .checked_add(frac * scale / divisor)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(value).ok_or_else(overflow)?;
        rest = tail;
    }

    let nanos = i64::try_from(total).map_err(|_| overflow())?;
    Ok(Duration::nanoseconds(nanos))
}
