//! Canonical text form for elapsed time: `1h2m3.004s`, `1.5ms`, `250ns`, `0s`.
//!
//! Durations are carried as `chrono::TimeDelta` with nanosecond resolution.
//! Fractional digits finer than one nanosecond are truncated on decode, on
//! every platform. Negative values encode with a leading `-`.

use chrono::TimeDelta;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

/// Fraction digits beyond this are ignored; they cannot affect a nanosecond total.
const MAX_FRACTION_DIGITS: u32 = 20;

/// A duration string did not match the `<number><unit>...` grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    input: String,
    reason: &'static str,
}

impl FormatError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }

    /// The rejected input.
    #[cfg(test)]
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid duration {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for FormatError {}

/// Encode a duration in its canonical form.
///
/// Below one second a single unit is used (`ns`, `µs`, `ms`) with a trimmed
/// decimal fraction. From one second up, hours and minutes are prefixed
/// only when non-zero at their level or above (`1m0s`, `1h0m0.5s`).
pub fn encode(d: TimeDelta) -> String {
    let negative = d < TimeDelta::zero();
    let magnitude = if negative { -d } else { d };
    let secs = magnitude.num_seconds().unsigned_abs() as u128;
    let nanos = magnitude.subsec_nanos().unsigned_abs() as u128;
    let total = secs * NANOS_PER_SEC + nanos;

    if total == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if total < NANOS_PER_SEC {
        let (scale, unit) = if total < NANOS_PER_MICRO {
            (1, "ns")
        } else if total < NANOS_PER_MILLI {
            (NANOS_PER_MICRO, "µs")
        } else {
            (NANOS_PER_MILLI, "ms")
        };
        out.push_str(&decimal(total, scale));
        out.push_str(unit);
        return out;
    }

    let hours = total / NANOS_PER_HOUR;
    let minutes = (total % NANOS_PER_HOUR) / NANOS_PER_MIN;
    let rest = total % NANOS_PER_MIN;

    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&decimal(rest, NANOS_PER_SEC));
    out.push('s');
    out
}

/// `value / scale` as a decimal with trailing zeros removed.
fn decimal(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let width = scale.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Decode a duration string.
///
/// Accepts an optional sign followed by one or more `<number><unit>` terms,
/// where the number may carry a decimal fraction and the unit is one of
/// `ns`, `us`, `µs`, `μs`, `ms`, `s`, `m`, `h`. A bare `0` is also accepted.
pub fn decode(input: &str) -> Result<TimeDelta, FormatError> {
    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(TimeDelta::zero());
    }
    if s.is_empty() {
        return Err(FormatError::new(input, "empty"));
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let (whole, whole_digits, rest) = leading_int(s)
            .ok_or_else(|| FormatError::new(input, "number too large"))?;
        s = rest;

        let mut frac: u128 = 0;
        let mut frac_scale: u128 = 1;
        let mut frac_digits = 0usize;
        if let Some(rest) = s.strip_prefix('.') {
            let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            for b in rest[..digits_len].bytes() {
                if frac_scale.ilog10() < MAX_FRACTION_DIGITS {
                    frac = frac * 10 + u128::from(b - b'0');
                    frac_scale *= 10;
                }
            }
            frac_digits = digits_len;
            s = &rest[digits_len..];
        }
        if whole_digits == 0 && frac_digits == 0 {
            return Err(FormatError::new(input, "expected a number"));
        }

        let unit_len = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(FormatError::new(input, "missing unit"));
        }
        let unit = unit_nanos(&s[..unit_len])
            .ok_or_else(|| FormatError::new(input, "unknown unit"))?;
        s = &s[unit_len..];

        let term = whole
            .checked_mul(unit)
            .and_then(|v| v.checked_add(frac * unit / frac_scale))
            .ok_or_else(|| FormatError::new(input, "out of range"))?;
        total = total
            .checked_add(term)
            .ok_or_else(|| FormatError::new(input, "out of range"))?;
    }

    let secs = i64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| FormatError::new(input, "out of range"))?;
    let nanos = (total % NANOS_PER_SEC) as u32;
    let d = TimeDelta::new(secs, nanos).ok_or_else(|| FormatError::new(input, "out of range"))?;
    Ok(if negative { -d } else { d })
}

/// Parse leading ASCII digits. Returns (value, digit count, remainder), or
/// `None` on overflow.
fn leading_int(s: &str) -> Option<(u128, usize, &str)> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    let mut value: u128 = 0;
    for b in s[..len].bytes() {
        value = value.checked_mul(10)?.checked_add(u128::from(b - b'0'))?;
    }
    Some((value, len, &s[len..]))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(NANOS_PER_MIN),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}
