//! # ReplenishWorker: restocks counters, one order at a time.
//!
//! Counters send a [`RestockOrder`] per low-stock event; the worker serves them
//! in strict FIFO order and resets the target inventory to its replenish level.
//! The inventory lock is held for the whole reset, so a restock is atomic with
//! respect to the owning counter's deductions.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::concessions::{CounterId, SharedInventory, Stock};
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

const NAME: &str = "replenish";

/// A pending restock.
pub struct RestockOrder {
    counter: CounterId,
    inventory: SharedInventory,
    done: oneshot::Sender<Restock>,
}

/// Result of one applied restock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restock {
    /// Restocked counter.
    pub counter: CounterId,
    /// Quantities added.
    pub added: Stock,
    /// Stock on hand afterwards.
    pub on_hand: Stock,
}

/// Handle used by counters to order restocks.
#[derive(Clone)]
pub struct ReplenishHandle {
    tx: mpsc::UnboundedSender<RestockOrder>,
}

impl ReplenishHandle {
    /// Orders a restock of `inventory`; the receiver resolves once it is applied.
    pub fn order(&self, counter: CounterId, inventory: SharedInventory) -> Result<oneshot::Receiver<Restock>, ServiceError> {
        let (done, applied) = oneshot::channel();
        self.tx
            .send(RestockOrder {
                counter,
                inventory,
                done,
            })
            .map_err(|_| ServiceError::closed(NAME))?;
        Ok(applied)
    }
}

/// Background restocking server.
pub struct ReplenishWorker {
    rx: mpsc::UnboundedReceiver<RestockOrder>,
    bus: Bus,
    delay: Duration,
    applied: u64,
}

impl ReplenishWorker {
    /// Creates the worker and its handle; `delay` is spent on each restock.
    pub fn new(bus: Bus, delay: Duration) -> (Self, ReplenishHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            rx,
            bus,
            delay,
            applied: 0,
        };
        (worker, ReplenishHandle { tx })
    }

    /// Actor name used in events.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Serves orders until cancelled; returns the number of restocks applied.
    pub async fn run(mut self, token: CancellationToken) -> u64 {
        loop {
            let order = tokio::select! {
                _ = token.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(order) => order,
                    None => break,
                },
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.apply(order) => {}
            }
        }

        self.rx.close();
        self.applied
    }

    async fn apply(&mut self, order: RestockOrder) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let restock = {
            let mut inventory = order.inventory.lock().await;
            let added = inventory.restock();
            Restock {
                counter: order.counter,
                added,
                on_hand: inventory.on_hand(),
            }
        };
        self.applied += 1;

        self.bus.publish(
            Event::new(EventKind::Replenished)
                .with_actor(NAME)
                .with_counter(order.counter)
                .with_items(restock.on_hand.drinks, restock.on_hand.popcorn),
        );
        let _ = order.done.send(restock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concessions::Inventory;

    #[tokio::test]
    async fn test_restock_resets_to_target() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let (worker, handle) = ReplenishWorker::new(bus, Duration::ZERO);
        let token = CancellationToken::new();
        let task = tokio::spawn(worker.run(token.clone()));

        let inventory = Inventory::new(2, 2, 2, 10).shared();
        let restock = handle.order(2, inventory.clone()).unwrap().await.unwrap();

        assert_eq!(restock.added, Stock::new(8, 8));
        assert_eq!(restock.on_hand, Stock::new(10, 10));
        assert_eq!(inventory.lock().await.on_hand(), Stock::new(10, 10));

        let ev = events.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Replenished);
        assert_eq!(ev.counter, Some(2));

        token.cancel();
        assert_eq!(task.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_orders_are_fifo() {
        let (worker, handle) = ReplenishWorker::new(Bus::new(16), Duration::ZERO);
        let a = Inventory::new(1, 0, 0, 5).shared();
        let b = Inventory::new(2, 0, 0, 7).shared();
        let first = handle.order(1, a).unwrap();
        let second = handle.order(2, b).unwrap();

        let token = CancellationToken::new();
        let task = tokio::spawn(worker.run(token.clone()));

        assert_eq!(first.await.unwrap().counter, 1);
        assert_eq!(second.await.unwrap().counter, 2);
        token.cancel();
        assert_eq!(task.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stopped_worker_refuses_orders() {
        let (worker, handle) = ReplenishWorker::new(Bus::new(4), Duration::ZERO);
        let token = CancellationToken::new();
        token.cancel();
        worker.run(token).await;

        let err = handle.order(1, Inventory::new(1, 1, 1, 1).shared()).unwrap_err();
        assert_eq!(err, ServiceError::closed("replenish"));
    }
}
