//! Jittered delay between polls

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PollIntervalConfig;

/// Floor for the computed delay so a zero configuration cannot spin
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(100);

/// Strategy producing the jitter added on top of the base interval
pub trait JitterSource: Send {
    /// Pick a jitter in `min..=max`
    fn sample(&mut self, min: Duration, max: Duration) -> Duration;
}

/// Uniformly distributed jitter
#[derive(Debug)]
pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn sample(&mut self, min: Duration, max: Duration) -> Duration {
        self.rng.random_range(min..=max)
    }
}

/// Always yields the same jitter, clamped into the configured bounds
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl JitterSource for FixedJitter {
    fn sample(&mut self, min: Duration, max: Duration) -> Duration {
        self.0.clamp(min, max)
    }
}

/// Computes the wait before each poll of one device
pub struct PollScheduler {
    base: Duration,
    jitter_min: Duration,
    jitter_max: Duration,
    source: Box<dyn JitterSource>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("base", &self.base)
            .field("jitter_min", &self.jitter_min)
            .field("jitter_max", &self.jitter_max)
            .finish()
    }
}

impl PollScheduler {
    pub fn new(config: &PollIntervalConfig) -> Self {
        Self::with_source(config, Box::new(RandomJitter::new()))
    }

    pub fn with_source(config: &PollIntervalConfig, source: Box<dyn JitterSource>) -> Self {
        // Reversed bounds are treated as the same interval written backwards
        let (jitter_min, jitter_max) = if config.jitter_min <= config.jitter_max {
            (config.jitter_min, config.jitter_max)
        } else {
            (config.jitter_max, config.jitter_min)
        };
        Self {
            base: config.base,
            jitter_min,
            jitter_max,
            source,
        }
    }

    /// Delay before the next poll; recomputed on every call and never below [`MIN_POLL_DELAY`]
    pub fn next_delay(&mut self) -> Duration {
        let jitter = self.source.sample(self.jitter_min, self.jitter_max);
        self.base.saturating_add(jitter).max(MIN_POLL_DELAY)
    }

    /// Smallest value [`next_delay`](Self::next_delay) can return
    pub fn lower_bound(&self) -> Duration {
        self.base.saturating_add(self.jitter_min).max(MIN_POLL_DELAY)
    }

    /// Largest value [`next_delay`](Self::next_delay) can return
    pub fn upper_bound(&self) -> Duration {
        self.base.saturating_add(self.jitter_max).max(MIN_POLL_DELAY)
    }
}
