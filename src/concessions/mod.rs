//! # Concessions: counters, their stock, and restocking.
//!
//! ```text
//! Client ──submit──► Dispatch ◄──claim── Counter 1..N ──order──► ReplenishWorker
//!   ▲                  (FIFO)               │    │                    │
//!   │                                       │    └─ settle ─► SettlementWorker
//!   └───────── oneshot outcome ─────────────┘                         │
//!                                      Inventory (per counter) ◄──────┘ restock
//! ```
//!
//! Each inventory belongs to exactly one counter; the replenish worker only
//! touches it on that counter's behalf, under the same per-inventory lock.

mod counter;
mod dispatch;
mod inventory;
mod replenish;

use std::fmt;

use crate::error::ServiceError;
use crate::settlement::Receipt;

pub use counter::{Counter, CounterDeps};
pub use dispatch::{Claimed, ConsumptionRequest, ConsumptionTicket, Dispatch};
pub use inventory::{Inventory, InventorySnapshot, SharedInventory, Stock};
pub use replenish::{ReplenishHandle, ReplenishWorker, Restock};

/// Counter identifier (1-based).
pub type CounterId = u32;

/// Why a counter declined a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// Asked for more than a full restock provides.
    ExceedsTarget {
        /// The counter's replenish target.
        target: i64,
    },
    /// Asked for nothing.
    EmptyRequest,
    /// Settlement stopped before confirming; the stock was put back.
    SettlementUnconfirmed,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::ExceedsTarget { target } => {
                write!(f, "request exceeds replenish target {target}")
            }
            DeclineReason::EmptyRequest => f.write_str("empty request"),
            DeclineReason::SettlementUnconfirmed => f.write_str("settlement unconfirmed"),
        }
    }
}

/// Terminal outcome of one consumption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumptionOutcome {
    /// Deducted and paid.
    Served {
        /// Serving counter.
        counter: CounterId,
        /// Drinks served.
        drinks: u32,
        /// Popcorn served.
        popcorn: u32,
        /// True if serving required a restock.
        restocked: bool,
        /// Settlement receipt.
        receipt: Receipt,
    },
    /// Not served; the inventory is unchanged.
    Declined {
        /// Counter that declined.
        counter: CounterId,
        /// Why.
        reason: DeclineReason,
    },
    /// The counter failed while serving.
    Faulted(ServiceError),
}

impl ConsumptionOutcome {
    /// Returns true for [`ConsumptionOutcome::Served`].
    pub fn is_served(&self) -> bool {
        matches!(self, ConsumptionOutcome::Served { .. })
    }
}
