//! Hub epoch time
//!
//! All in-message timestamps are unsigned 32-bit milliseconds since the
//! network epoch 2021-01-01T00:00:00Z. Converting at ingestion keeps the
//! wire format compact and makes the decimal rendering used by sync ids
//! a fixed 10 digits.

use crate::error::{HubError, Result};

/// Unix milliseconds of 2021-01-01T00:00:00Z
pub const EPOCH_UNIX_MS: u64 = 1_609_459_200_000;

/// Maximum tolerated clock skew for incoming messages (10 minutes)
pub const MAX_CLOCK_SKEW_MS: u32 = 600_000;

/// Convert unix milliseconds to epoch milliseconds
pub fn to_hub_time(unix_ms: u64) -> Result<u32> {
    let since = unix_ms
        .checked_sub(EPOCH_UNIX_MS)
        .ok_or_else(|| HubError::MalformedBytes("time predates the network epoch".into()))?;
    u32::try_from(since)
        .map_err(|_| HubError::MalformedBytes("time beyond the 32-bit epoch range".into()))
}

/// Convert epoch milliseconds back to unix milliseconds
pub fn to_unix_ms(hub_time: u32) -> u64 {
    EPOCH_UNIX_MS + u64::from(hub_time)
}

/// Current time in epoch milliseconds, saturating at the top of the range
pub fn now() -> u32 {
    let unix_ms = chrono::Utc::now().timestamp_millis() as u64;
    to_hub_time(unix_ms).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_roundtrip() {
        let unix = EPOCH_UNIX_MS + 12_345;
        let hub = to_hub_time(unix).unwrap();
        assert_eq!(hub, 12_345);
        assert_eq!(to_unix_ms(hub), unix);
    }

    #[test]
    fn test_pre_epoch_rejected() {
        assert!(to_hub_time(EPOCH_UNIX_MS - 1).is_err());
    }

    #[test]
    fn test_now_is_positive() {
        assert!(now() > 0);
    }
}
