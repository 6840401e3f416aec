// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capped exponential backoff for crash recovery.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the given 1-based attempt: `base * 2^(attempt-1)`, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base.checked_mul(factor).unwrap_or(self.max).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        first   = { 1, 100 },
        second  = { 2, 200 },
        third   = { 3, 400 },
        capped  = { 6, 2000 },
        zeroth  = { 0, 100 },
        huge    = { 200, 2000 },
    )]
    fn delay(attempt: u32, expected_ms: u64) {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));
        assert_eq!(backoff.delay(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn overflow_saturates_to_max() {
        let backoff = Backoff::new(Duration::from_secs(u64::MAX / 2), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }
}
