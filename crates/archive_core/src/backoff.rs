use std::time::Duration;

/// Retry schedule for the outer batch envelope.
///
/// The first `max_attempts` retries wait `base_delay * multiplier^i`; after
/// those, `floor_attempts` further retries each wait `floor_delay`. Once the
/// schedule is exhausted the last error is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
    pub floor_delay: Duration,
    pub floor_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            multiplier: 2,
            max_attempts: 5,
            floor_delay: Duration::from_secs(30 * 60),
            floor_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_attempts: 0,
            floor_delay: Duration::ZERO,
            floor_attempts: 0,
        }
    }

    /// Number of retries after the initial attempt.
    pub fn retries(&self) -> u32 {
        self.max_attempts.saturating_add(self.floor_attempts)
    }

    /// Delay before retry number `retry` (zero-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry < self.max_attempts {
            let factor = self.multiplier.checked_pow(retry).unwrap_or(u32::MAX);
            return Some(self.base_delay.saturating_mul(factor));
        }
        if retry < self.retries() {
            return Some(self.floor_delay);
        }
        None
    }

    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.retries())
            .map_while(|retry| self.delay_for(retry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::BackoffPolicy;
    use std::time::Duration;

    #[test]
    fn huge_exponents_saturate_instead_of_overflowing() {
        let policy = BackoffPolicy {
            base_delay: Duration::from_secs(1),
            multiplier: 10,
            max_attempts: 40,
            floor_delay: Duration::ZERO,
            floor_attempts: 0,
        };
        let last = policy.delay_for(39).unwrap();
        assert_eq!(last, Duration::from_secs(u64::from(u32::MAX)));
    }
}
