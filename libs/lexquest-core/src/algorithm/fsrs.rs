//! FSRS (Free Spaced Repetition Scheduler) memory model.
//!
//! DSR model:
//! - Difficulty (D): card difficulty 1-10
//! - Stability (S): days until retrievability drops to the target
//! - Retrievability (R): probability of recall

use serde::{Deserialize, Serialize};

use super::{MemoryModel, MemoryState, MIN_STABILITY};
use crate::types::Rating;

/// Tunable constants of the FSRS model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsrsParams {
    /// FSRS-4.5 parameters (17 weights).
    pub w: [f64; 17],
    pub maximum_interval: f64,
    /// Bounds of the relearning step, in minutes.
    pub relearn_minutes_min: f64,
    pub relearn_minutes_max: f64,
    /// Fraction of the prior stability a lapse may keep at most.
    pub lapse_ceiling: f64,
}

impl Default for FsrsParams {
    fn default() -> Self {
        Self {
            w: [
                0.4, 0.6, 2.4, 5.8, // w[0-3]: initial stability for Again, Hard, Good, Easy
                4.93,  // w[4]: initial difficulty base
                0.94,  // w[5]: initial difficulty modifier
                0.86,  // w[6]: difficulty decay
                0.01,  // w[7]: mean reversion weight
                1.49,  // w[8]: stability exp base
                0.14,  // w[9]: stability decay
                0.94,  // w[10]: retrievability effect
                2.18,  // w[11]: forget stability base
                0.05,  // w[12]: difficulty on forget
                0.34,  // w[13]: stability on forget
                1.26,  // w[14]: retrievability on forget
                0.29,  // w[15]: hard penalty
                2.61,  // w[16]: easy bonus
            ],
            maximum_interval: 36500.0,
            relearn_minutes_min: 10.0,
            relearn_minutes_max: 720.0,
            lapse_ceiling: 0.5,
        }
    }
}

/// FSRS model with configurable parameters.
#[derive(Debug, Clone, Default)]
pub struct Fsrs {
    pub params: FsrsParams,
}

impl Fsrs {
    pub const VERSION: u32 = 45;

    pub fn new(params: FsrsParams) -> Self {
        Self { params }
    }

    fn w(&self, i: usize) -> f64 {
        self.params.w[i]
    }

    /// S0(G) = w[G-1]
    fn initial_stability(&self, rating: Rating) -> f64 {
        let index = usize::from(rating.to_value().saturating_sub(1)).min(3);
        self.w(index).max(MIN_STABILITY)
    }

    /// D0(G) = w[4] - w[5] * (G - 3)
    fn initial_difficulty(&self, rating: Rating) -> f64 {
        let g = f64::from(rating.to_value());
        (self.w(4) - self.w(5) * (g - 3.0)).clamp(1.0, 10.0)
    }

    /// D' = w[7] * D0(G) + (1 - w[7]) * D, then D'' = D' - w[6] * (G - 3)
    fn next_difficulty(&self, current: f64, rating: Rating) -> f64 {
        let g = f64::from(rating.to_value());
        let d0 = self.initial_difficulty(rating);
        let reverted = self.w(7) * d0 + (1.0 - self.w(7)) * current;
        (reverted - self.w(6) * (g - 3.0)).clamp(1.0, 10.0)
    }

    /// S' = S * (e^w[8] * (11 - D) * S^-w[9] * (e^(w[10]*(1-R)) - 1) * modifier + 1)
    fn next_stability_recall(
        &self,
        stability: f64,
        difficulty: f64,
        r: f64,
        rating: Rating,
    ) -> f64 {
        let d_factor = (11.0 - difficulty).max(0.1);
        let s_decay = stability.powf(-self.w(9));
        let r_factor = (self.w(10) * (1.0 - r)).exp() - 1.0;

        let modifier = match rating {
            Rating::Hard => self.w(15),
            Rating::Easy => self.w(16),
            _ => 1.0,
        };

        let growth = self.w(8).exp() * d_factor * s_decay * r_factor * modifier + 1.0;
        (stability * growth)
            .max(MIN_STABILITY)
            .min(self.params.maximum_interval)
    }

    /// S' = w[11] * D^-w[12] * ((S+1)^w[13] - 1) * e^(w[14]*(1-R)),
    /// never above `lapse_ceiling * S`.
    fn next_stability_forget(&self, stability: f64, difficulty: f64, r: f64) -> f64 {
        let d_factor = difficulty.max(1.0).powf(-self.w(12));
        let s_factor = (stability + 1.0).powf(self.w(13)) - 1.0;
        let r_factor = (self.w(14) * (1.0 - r)).exp();

        let ceiling = stability * self.params.lapse_ceiling.clamp(0.0, 0.99);
        (self.w(11) * d_factor * s_factor * r_factor)
            .min(ceiling)
            .max(MIN_STABILITY)
    }
}

impl MemoryModel for Fsrs {
    fn name(&self) -> &'static str {
        "fsrs"
    }

    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn initial_state(&self, rating: Rating) -> MemoryState {
        MemoryState {
            stability: self.initial_stability(rating),
            difficulty: self.initial_difficulty(rating),
        }
    }

    /// R = (1 + t / (9 * S))^-1
    fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        if stability <= 0.0 {
            return 0.0;
        }
        (1.0 + elapsed_days.max(0.0) / (9.0 * stability)).powf(-1.0)
    }

    fn next_state(&self, current: MemoryState, elapsed_days: f64, rating: Rating) -> MemoryState {
        let stability = current.stability.max(MIN_STABILITY);
        let difficulty = current.difficulty.clamp(1.0, 10.0);
        let r = self.retrievability(elapsed_days, stability);

        let next_stability = match rating {
            Rating::Again => self.next_stability_forget(stability, difficulty, r),
            _ => self.next_stability_recall(stability, difficulty, r, rating),
        };

        MemoryState {
            stability: next_stability,
            difficulty: self.next_difficulty(difficulty, rating),
        }
    }

    /// I = 9 * S * (1/R - 1), rounded to whole days.
    fn review_interval(&self, stability: f64, retention: f64) -> f64 {
        let raw = if retention <= 0.0 || retention >= 1.0 {
            stability
        } else {
            9.0 * stability * (1.0 / retention - 1.0)
        };
        raw.round().clamp(1.0, self.params.maximum_interval)
    }

    fn relearn_interval(&self, stability: f64) -> f64 {
        let minutes = (stability * 60.0)
            .max(self.params.relearn_minutes_min)
            .min(self.params.relearn_minutes_max);
        minutes / 1440.0
    }

    fn maximum_interval(&self) -> f64 {
        self.params.maximum_interval
    }
}
