//! Serde helpers for configuration types
//!
//! Durations in cache configuration files are written as plain millisecond
//! integers so that TOML and JSON files stay readable.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Serialize/deserialize a `Duration` as whole milliseconds (u64)
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use repocache_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct RetrySettings {
///     #[serde(with = "duration_millis")]
///     retry_delay: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{saturating_millis, Deserialize, Deserializer, Duration, Serializer};

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds, saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(saturating_millis(*duration))
    }

    /// Deserialize milliseconds into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization utilities.

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct RetrySettings {
        #[serde(with = "duration_millis")]
        retry_delay: Duration,
        worker_threads: usize,
    }

    /// Validates that a Duration is written as a millisecond integer.
    ///
    /// Assertions:
    /// - Ensures the JSON output contains `"retry_delay":250`.
    #[test]
    fn test_duration_millis_serialize() {
        let settings = RetrySettings { retry_delay: Duration::from_millis(250), worker_threads: 2 };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"retry_delay\":250"));
    }

    /// Validates that oversized durations saturate instead of wrapping.
    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    /// Validates reading a millisecond value from TOML.
    ///
    /// Assertions:
    /// - Confirms `retry_delay` equals 1.5 seconds.
    #[test]
    fn test_duration_millis_from_toml() {
        let settings: RetrySettings =
            toml::from_str("retry_delay = 1500\nworker_threads = 4\n").unwrap();
        assert_eq!(settings.retry_delay, Duration::from_millis(1500));
        assert_eq!(settings.worker_threads, 4);
    }

    /// Validates that zero is accepted and that non-numeric values fail.
    ///
    /// Assertions:
    /// - Confirms `retry_delay` of 0 deserializes to `Duration::ZERO`.
    /// - Ensures a string value is rejected.
    #[test]
    fn test_duration_millis_zero_and_invalid() {
        let settings: RetrySettings =
            serde_json::from_str(r#"{"retry_delay":0,"worker_threads":1}"#).unwrap();
        assert_eq!(settings.retry_delay, Duration::ZERO);

        let invalid: Result<RetrySettings, _> =
            serde_json::from_str(r#"{"retry_delay":"soon","worker_threads":1}"#);
        assert!(invalid.is_err());
    }
}
