//! # Settlement: the single payment authority.
//!
//! Ticket office and counters cannot commit anything until the payment behind it
//! is confirmed. All of them feed one [`SettlementQueue`], drained by exactly one
//! [`SettlementWorker`], so confirmations are totally ordered and each one is a
//! one-shot commit signal for its requester.
//!
//! ## Architecture
//! ```text
//! TicketOffice ──┐                                   ┌──► oneshot ──► TicketOffice
//! Counter 1..N ──┼─► SettlementDesk::settle()        │
//!                │     ├─ PriorityLottery::draw(kind)│
//!                │     └─ SettlementQueue::push ─────┤
//!                │                                   │
//!                └──── (await receipt) ◄─── SettlementWorker (pop by class, then arrival)
//! ```
//!
//! ## Ordering
//! - Lower [`PriorityClass`] first (`FastLane` before `Standard`).
//! - Within a class, strict arrival order (FIFO), so no request starves.
//! - Seat payments draw `FastLane` with probability 0.8, concession payments
//!   with 0.2 (configurable via [`LotteryWeights`]).

mod lottery;
mod queue;
mod worker;

use std::sync::Arc;

use crate::client::ClientId;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

pub use lottery::{LotteryWeights, PriorityLottery};
pub use queue::{SettlementQueue, SettlementRequest};
pub use worker::SettlementWorker;

/// What a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentKind {
    /// Seats bought at the ticket office.
    Seats,
    /// Drinks and popcorn bought at a counter.
    Concessions,
}

impl PaymentKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Seats => "seats",
            PaymentKind::Concessions => "concessions",
        }
    }
}

/// Coarse two-tier ranking of pending payments; lower is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    /// Class 1.
    FastLane = 1,
    /// Class 2.
    Standard = 2,
}

impl PriorityClass {
    /// Numeric class (1 or 2).
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// Proof that a payment was confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Arrival number assigned by the queue.
    pub id: u64,
    /// Paying client.
    pub client: ClientId,
    /// What was paid for.
    pub kind: PaymentKind,
    /// Class the payment was queued under.
    pub priority: PriorityClass,
    /// 1-based position in the worker's confirmation order.
    pub position: u64,
}

/// Producer-side handle: draws a priority, enqueues, and waits for the receipt.
#[derive(Clone)]
pub struct SettlementDesk {
    queue: Arc<SettlementQueue>,
    lottery: PriorityLottery,
    bus: Bus,
}

impl SettlementDesk {
    /// Creates a desk feeding `queue`.
    pub fn new(queue: Arc<SettlementQueue>, lottery: PriorityLottery, bus: Bus) -> Self {
        Self {
            queue,
            lottery,
            bus,
        }
    }

    /// Requests settlement of one payment and blocks until it is confirmed.
    ///
    /// Fails with [`ServiceError::Closed`] if the worker stopped before confirming.
    pub async fn settle(&self, client: ClientId, kind: PaymentKind) -> Result<Receipt, ServiceError> {
        let priority = self.lottery.draw(kind);
        let (_id, confirmation) = self.queue.push(client, kind, priority).await?;

        self.bus.publish(
            Event::new(EventKind::SettlementEnqueued)
                .with_client(client)
                .with_payment(kind, priority),
        );

        confirmation
            .await
            .map_err(|_| ServiceError::closed("settlement"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_class_order() {
        assert!(PriorityClass::FastLane < PriorityClass::Standard);
        assert_eq!(PriorityClass::FastLane.rank(), 1);
        assert_eq!(PriorityClass::Standard.rank(), 2);
    }
}
