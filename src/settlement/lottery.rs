//! # Weighted priority lottery.
//!
//! Each payment draws its [`PriorityClass`] independently: a weighted coin flip
//! decides between `FastLane` and `Standard`. The weights give a soft
//! quality-of-service split (seat payments usually clear ahead of concession
//! payments) without starving either kind.

use std::sync::Arc;

use crate::random::RandomSource;
use crate::settlement::{PaymentKind, PriorityClass};

/// Probability of drawing `FastLane`, per payment kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotteryWeights {
    /// Fast-lane probability for seat payments.
    pub seats_fast_lane: f64,
    /// Fast-lane probability for concession payments.
    pub concessions_fast_lane: f64,
}

impl LotteryWeights {
    /// Returns the fast-lane probability for `kind`.
    #[inline]
    pub fn fast_lane(&self, kind: PaymentKind) -> f64 {
        match kind {
            PaymentKind::Seats => self.seats_fast_lane,
            PaymentKind::Concessions => self.concessions_fast_lane,
        }
    }
}

impl Default for LotteryWeights {
    /// Seat payments: 0.8; concession payments: 0.2.
    fn default() -> Self {
        Self {
            seats_fast_lane: 0.8,
            concessions_fast_lane: 0.2,
        }
    }
}

/// Draws priority classes from a shared [`RandomSource`].
#[derive(Clone)]
pub struct PriorityLottery {
    weights: LotteryWeights,
    random: Arc<dyn RandomSource>,
}

impl PriorityLottery {
    /// Creates a lottery.
    pub fn new(weights: LotteryWeights, random: Arc<dyn RandomSource>) -> Self {
        Self { weights, random }
    }

    /// Draws the class of one payment.
    pub fn draw(&self, kind: PaymentKind) -> PriorityClass {
        if self.random.lottery(self.weights.fast_lane(kind)) {
            PriorityClass::FastLane
        } else {
            PriorityClass::Standard
        }
    }
}
