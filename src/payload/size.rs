//! Human size literals and filler generation.

use crate::core::{OtelgenError, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Parse a size literal like `"1kb"`, `"1.5mb"` or `"500b"` into bytes.
///
/// Units are case-insensitive and binary (1024-based). An empty literal means
/// "no padding" and yields 0. Fractional results are truncated.
pub fn parse_size(literal: &str) -> Result<u64> {
    let literal = literal.trim().to_ascii_lowercase();
    if literal.is_empty() {
        return Ok(0);
    }

    let split = literal
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(literal.len());
    let (number, unit) = literal.split_at(split);

    if number.is_empty() {
        return Err(OtelgenError::size(format!("invalid size format: {}", literal)));
    }

    let value: f64 = number
        .parse()
        .map_err(|e| OtelgenError::size(format!("invalid size number {:?}: {}", number, e)))?;

    let multiplier = match unit.trim() {
        "" | "b" => 1,
        "kb" | "k" => KIB,
        "mb" | "m" => MIB,
        "gb" | "g" => GIB,
        other => {
            return Err(OtelgenError::size(format!(
                "unknown size unit: {} (supported: b, kb, mb, gb)",
                other
            )))
        },
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let bytes = (value * multiplier as f64) as u64;
    Ok(bytes)
}

/// An `n`-byte filler string of `'x'` characters.
pub fn pad(n: u64) -> String {
    "x".repeat(usize::try_from(n).unwrap_or(usize::MAX))
}

/// A random alphanumeric string of `len` characters.
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
