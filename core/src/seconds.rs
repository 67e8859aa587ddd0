//! Serde adapter that stores a [`Duration`] as fractional seconds.
//!
//! Use with `#[serde(with = "lane_skirmish_core::seconds")]` so tuning files
//! can write `attack_cooldown = 1.5` instead of a `{ secs, nanos }` table.

use std::time::Duration;

use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

/// Serializes the duration as seconds.
///
/// # Errors
///
/// Propagates serializer failures.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Deserializes a non-negative number of seconds.
///
/// # Errors
///
/// Rejects negative, infinite or NaN values.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|error| D::Error::custom(format!("invalid duration {secs}: {error}")))
}
