//! Chaos for peer-to-peer links
//!
//! Simulates an unreliable cluster network:
//! - Loss
//! - Duplication
//! - Delay jitter (which also reorders)
//!
//! Client traffic is never subjected to chaos.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Network chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Probability a peer message is dropped (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability a delivered peer message arrives twice (0.0 - 1.0)
    pub duplicate_prob: f64,
    /// Upper bound of the uniform delivery delay
    pub max_delay: Duration,
    /// RNG seed, for reproducible runs
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

impl ChaosConfig {
    /// Every message delivered exactly once, immediately
    pub fn reliable() -> Self {
        ChaosConfig {
            loss_rate: 0.0,
            duplicate_prob: 0.0,
            max_delay: Duration::ZERO,
            seed: 0,
        }
    }

    /// No loss, but duplicates and reordering
    pub fn duplicating(duplicate_prob: f64) -> Self {
        ChaosConfig {
            duplicate_prob,
            max_delay: Duration::from_millis(5),
            ..Self::reliable()
        }
    }

    /// Drops peer messages
    pub fn lossy(loss_rate: f64) -> Self {
        ChaosConfig {
            loss_rate,
            ..Self::reliable()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What to do with one peer message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// 0 (lost), 1 or 2 (duplicated)
    pub copies: usize,
    /// Delay per copy
    pub delays: Vec<Duration>,
}

/// Chaos statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub messages: u64,
    pub lost: u64,
    pub duplicated: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.messages == 0 {
            0.0
        } else {
            self.lost as f64 / self.messages as f64
        }
    }
}

/// Seeded chaos source
#[derive(Debug)]
pub struct Chaos {
    config: ChaosConfig,
    rng: StdRng,
    stats: ChaosStats,
}

impl Chaos {
    pub fn new(config: ChaosConfig) -> Self {
        Chaos {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            stats: ChaosStats::default(),
        }
    }

    /// Decide the fate of one peer message
    pub fn plan(&mut self) -> Delivery {
        self.stats.messages += 1;

        if self.rng.gen_bool(self.config.loss_rate.clamp(0.0, 1.0)) {
            self.stats.lost += 1;
            return Delivery {
                copies: 0,
                delays: Vec::new(),
            };
        }

        let copies = if self.rng.gen_bool(self.config.duplicate_prob.clamp(0.0, 1.0)) {
            self.stats.duplicated += 1;
            2
        } else {
            1
        };

        let delays = (0..copies).map(|_| self.sample_delay()).collect();
        Delivery { copies, delays }
    }

    fn sample_delay(&mut self) -> Duration {
        let max_us = self.config.max_delay.as_micros() as u64;
        if max_us == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.rng.gen_range(0..=max_us))
        }
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }
}
