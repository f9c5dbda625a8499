//! # SettlementWorker: the single consumer of the settlement queue.
//!
//! ```text
//! loop {
//!   ├─► queue.pop()            (sleeps while empty, cancellable)
//!   ├─► pace (optional delay)
//!   ├─► position += 1
//!   ├─► request.confirm(position) ─► wakes requester
//!   └─► publish SettlementConfirmed
//! }
//! on exit: queue.close()   (pending requesters observe Closed)
//! ```
//!
//! ## Rules
//! - Exactly one worker per queue, so confirmations are totally ordered.
//! - A fault while confirming drops that request (its requester is released
//!   with a closed channel) and the loop continues.

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::core::fault::contain;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::settlement::{SettlementQueue, SettlementRequest};

const NAME: &str = "settlement";

/// Drains the settlement queue in priority order.
pub struct SettlementWorker {
    queue: Arc<SettlementQueue>,
    bus: Bus,
    delay: Duration,
    confirmed: u64,
}

impl SettlementWorker {
    /// Creates a worker over `queue`; `delay` is spent on each confirmation.
    pub fn new(queue: Arc<SettlementQueue>, bus: Bus, delay: Duration) -> Self {
        Self {
            queue,
            bus,
            delay,
            confirmed: 0,
        }
    }

    /// Actor name used in events.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Runs until cancelled; returns the number of confirmed payments.
    pub async fn run(mut self, token: CancellationToken) -> u64 {
        loop {
            let request = select! {
                _ = token.cancelled() => break,
                next = self.queue.pop() => match next {
                    Some(request) => request,
                    None => break,
                },
            };

            let client = request.client;
            let res = select! {
                _ = token.cancelled() => break,
                res = contain(NAME, self.confirm(request)) => res,
            };
            if let Err(e) = res {
                self.bus
                    .publish(Event::actor_fault(NAME, e.to_string()).with_client(client));
            }
        }

        self.queue.close().await;
        self.confirmed
    }

    async fn confirm(&mut self, request: SettlementRequest) -> Result<(), ServiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.confirmed += 1;
        let (receipt, delivered) = request.confirm(self.confirmed);
        if !delivered {
            tracing::debug!(client = receipt.client, id = receipt.id, "settlement requester gone");
        }

        self.bus.publish(
            Event::new(EventKind::SettlementConfirmed)
                .with_actor(NAME)
                .with_client(receipt.client)
                .with_payment(receipt.kind, receipt.priority)
                .with_position(receipt.position),
        );
        Ok(())
    }
}
