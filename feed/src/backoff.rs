//! Reconnect backoff policy for the shared feed connection.

/// Base delay before the first reconnect attempt.
pub const BASE_DELAY_MS: u64 = 2_000;

/// Hard ceiling on the reconnect delay.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Attempt value stored by a deliberate `disconnect()`.
///
/// While the counter holds this sentinel the connection task exits
/// instead of scheduling another attempt.
pub const DISCONNECT_SENTINEL: u32 = u32::MAX;

/// Delay before reconnect attempt number `attempt` (0-based).
///
/// ```text
/// delay = min(2000 * 1.5^attempt, 60_000)
/// ```
///
/// Total for every attempt value: the exponential is computed in f64 and
/// saturates at the cap long before precision matters.
pub fn reconnect_delay_ms(attempt: u32) -> u64 {
    if attempt == DISCONNECT_SENTINEL {
        return MAX_DELAY_MS;
    }

    let raw = BASE_DELAY_MS as f64 * 1.5_f64.powi(attempt.min(64) as i32);
    if raw >= MAX_DELAY_MS as f64 {
        MAX_DELAY_MS
    } else {
        raw as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_base_delay() {
        assert_eq!(reconnect_delay_ms(0), 2_000);
    }

    #[test]
    fn delay_grows_exponentially() {
        assert_eq!(reconnect_delay_ms(1), 3_000);
        assert_eq!(reconnect_delay_ms(2), 4_500);
        assert!(reconnect_delay_ms(5) > reconnect_delay_ms(4));
    }

    #[test]
    fn ten_failures_hit_the_cap() {
        // 2000 * 1.5^10 = 115_330 -> capped
        assert_eq!(reconnect_delay_ms(10), MAX_DELAY_MS);
    }

    #[test]
    fn huge_attempt_counts_stay_capped() {
        assert_eq!(reconnect_delay_ms(1_000), MAX_DELAY_MS);
        assert_eq!(reconnect_delay_ms(u32::MAX - 1), MAX_DELAY_MS);
    }
}
