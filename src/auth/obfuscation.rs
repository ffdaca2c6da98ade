//! Timestamp-keyed obfuscation of the legacy API key.
//!
//! Internet-access and Branch-connector logins do not send the raw API key.
//! Each login derives a 12-character key from the seed and the current
//! millisecond clock; the server repeats the derivation to verify it.

use crate::errors::{ZscalerError, ZscalerResult};
use chrono::Utc;
use serde::Serialize;

/// Minimum seed length for which every digit index is addressable.
pub const MIN_SEED_LEN: usize = 10;

/// An obfuscated key paired with the timestamp it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObfuscatedKey {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Derived key.
    pub key: String,
}

/// Derives the obfuscated key for the current clock.
pub fn obfuscate_now(seed: &str) -> ZscalerResult<ObfuscatedKey> {
    let now = u64::try_from(Utc::now().timestamp_millis())
        .map_err(|_| ZscalerError::credential("System clock is before the Unix epoch"))?;
    obfuscate(seed, now)
}

/// Derives the obfuscated key for a fixed millisecond timestamp.
pub fn obfuscate(seed: &str, timestamp_ms: u64) -> ZscalerResult<ObfuscatedKey> {
    let seed: Vec<char> = seed.chars().collect();
    if seed.len() < MIN_SEED_LEN {
        return Err(ZscalerError::credential(format!(
            "Obfuscation seed must be at least {} characters, got {}",
            MIN_SEED_LEN,
            seed.len()
        )));
    }

    let digits = format!("{:06}", timestamp_ms);
    let n = &digits[digits.len() - 6..];
    let half: u32 = n
        .parse::<u32>()
        .map_err(|e| ZscalerError::credential(format!("Invalid timestamp digits: {}", e)))?
        / 2;
    let r = format!("{:06}", half);

    let mut key = String::with_capacity(12);
    for digit in n.chars() {
        key.push(seed_char(&seed, digit, 0)?);
    }
    for digit in r.chars() {
        key.push(seed_char(&seed, digit, 2)?);
    }

    Ok(ObfuscatedKey {
        timestamp: timestamp_ms,
        key,
    })
}

fn seed_char(seed: &[char], digit: char, offset: usize) -> ZscalerResult<char> {
    let index = digit
        .to_digit(10)
        .ok_or_else(|| ZscalerError::credential(format!("Non-digit '{}' in timestamp", digit)))?
        as usize
        + offset;

    seed.get(index).copied().ok_or_else(|| {
        ZscalerError::credential(format!(
            "Obfuscation seed of {} characters has no index {}",
            seed.len(),
            index
        ))
    })
}
