use std::time::Duration;

use rand::Rng;

/// Randomized politeness delay between remote calls, drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub min: Duration,
    pub max: Duration,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Default pacing for payload fetches.
    pub fn for_fetch() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(5))
    }

    /// Default pacing for classification calls.
    pub fn for_probe() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }

    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rng.random_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::for_fetch()
    }
}
