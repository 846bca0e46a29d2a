// src/backoff.rs
use std::time::Duration;

/// Exponential retry delay: 500ms doubling per attempt. The exponent is
/// capped so an oversized configured retry count cannot overflow the shift.
pub(crate) fn delay(attempt: u8) -> Duration {
    let exponent = u32::from(attempt.saturating_sub(1)).min(10);
    Duration::from_millis(500u64 << exponent)
}

pub(crate) async fn sleep(attempt: u8) {
    tokio::time::sleep(delay(attempt)).await;
}
