//! # Counter: one concession sale point.
//!
//! Each counter loops: claim the oldest pending request from [`Dispatch`],
//! serve it against its own [`Inventory`](crate::concessions::Inventory),
//! settle the payment, and answer the client.
//!
//! ```text
//! claim ─► too large for target?  → Declined(ExceedsTarget)        (no payment)
//!       ─► short on stock?
//!            ├─ AwaitRestock: order restock ─► wait ─► hold
//!            └─ Optimistic:   order restock ─► hold (restock not awaited)
//!       ─► otherwise hold
//!       ─► settle(Concessions) ─► commit hold ─► Served
//!             └─ not confirmed → release hold ─► Declined(SettlementUnconfirmed)
//! fault or cancel while holding ─► release hold
//! ```
//!
//! A hold is a deduction awaiting payment: it only becomes a served deduction
//! once the payment is confirmed. Under `AwaitRestock` stock never goes
//! negative. Under `Optimistic` it can, until the restock lands.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::concessions::{
    Claimed, ConsumptionOutcome, ConsumptionRequest, CounterId, DeclineReason, Dispatch,
    InventorySnapshot, ReplenishHandle, SharedInventory,
};
use crate::core::config::RestockPolicy;
use crate::core::fault::contain;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::settlement::{PaymentKind, SettlementDesk};

/// Collaborators every counter shares.
#[derive(Clone)]
pub struct CounterDeps {
    /// Request queue shared by all counters.
    pub dispatch: Arc<Dispatch>,
    /// Restock channel.
    pub replenish: ReplenishHandle,
    /// Payment desk.
    pub settlement: SettlementDesk,
    /// Event bus.
    pub bus: Bus,
}

/// One sale point.
pub struct Counter {
    id: CounterId,
    name: String,
    inventory: SharedInventory,
    deps: CounterDeps,
    policy: RestockPolicy,
    delay: Duration,
}

impl Counter {
    /// Creates counter `id` over its own inventory.
    pub fn new(id: CounterId, inventory: SharedInventory, deps: CounterDeps, policy: RestockPolicy, delay: Duration) -> Self {
        Self {
            id,
            name: format!("counter-{id}"),
            inventory,
            deps,
            policy,
            delay,
        }
    }

    /// Actor name used in events (`counter-<id>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serves requests until cancelled or the dispatch queue closes.
    ///
    /// Returns the final inventory state.
    pub async fn run(self, token: CancellationToken) -> InventorySnapshot {
        loop {
            let claimed = tokio::select! {
                _ = token.cancelled() => break,
                next = self.deps.dispatch.claim(self.id) => match next {
                    Some(claimed) => claimed,
                    None => break,
                },
            };
            let request = claimed.request;
            self.deps.bus.publish(
                Event::new(EventKind::ConsumptionClaimed)
                    .with_actor(self.name.as_str())
                    .with_client(request.client)
                    .with_counter(self.id),
            );

            let res = tokio::select! {
                _ = token.cancelled() => break,
                res = contain(&self.name, self.serve(request)) => res,
            };
            if res.is_err() {
                self.release_hold().await;
            }
            self.answer(claimed, res);
        }

        self.release_hold().await;
        self.inventory.lock().await.snapshot()
    }

    /// Puts back a deduction whose request never reached a served outcome.
    async fn release_hold(&self) {
        if let Some(stock) = self.inventory.lock().await.release_hold() {
            tracing::warn!(
                counter = self.id,
                drinks = stock.drinks,
                popcorn = stock.popcorn,
                "unfinished request; stock put back"
            );
        }
    }

    fn answer(&self, claimed: Claimed, res: Result<ConsumptionOutcome, ServiceError>) {
        let client = claimed.request.client;
        let outcome = res.unwrap_or_else(|e| {
            self.deps.bus.publish(
                Event::actor_fault(&self.name, e.to_string())
                    .with_client(client)
                    .with_counter(self.id),
            );
            ConsumptionOutcome::Faulted(e)
        });
        if !claimed.answer(outcome) {
            tracing::debug!(counter = self.id, client, "consumption requester gone");
        }
    }

    async fn serve(&self, request: ConsumptionRequest) -> Result<ConsumptionOutcome, ServiceError> {
        let ConsumptionRequest {
            client,
            drinks,
            popcorn,
        } = request;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if drinks == 0 && popcorn == 0 {
            return Ok(self.decline(client, DeclineReason::EmptyRequest));
        }

        let restocked = {
            let mut inventory = self.inventory.lock().await;
            if !inventory.can_ever_serve(drinks, popcorn) {
                let reason = DeclineReason::ExceedsTarget {
                    target: inventory.target(),
                };
                drop(inventory);
                return Ok(self.decline(client, reason));
            }

            if inventory.is_short(drinks, popcorn) {
                let on_hand = inventory.on_hand();
                self.deps.bus.publish(
                    Event::new(EventKind::ReplenishRequested)
                        .with_actor(self.name.as_str())
                        .with_counter(self.id)
                        .with_client(client)
                        .with_items(on_hand.drinks, on_hand.popcorn),
                );
                // No hold until the order is accepted.
                let applied = self.deps.replenish.order(self.id, self.inventory.clone())?;
                match self.policy {
                    RestockPolicy::Optimistic => {
                        // The worker needs this lock, so the hold lands before the restock.
                        inventory.hold(drinks, popcorn);
                    }
                    RestockPolicy::AwaitRestock => {
                        drop(inventory);
                        applied.await.map_err(|_| ServiceError::closed("replenish"))?;
                        self.inventory.lock().await.hold(drinks, popcorn);
                    }
                }
                true
            } else {
                inventory.hold(drinks, popcorn);
                false
            }
        };

        let receipt = match self.deps.settlement.settle(client, PaymentKind::Concessions).await {
            Ok(receipt) => receipt,
            Err(ServiceError::Closed { .. }) => {
                self.inventory.lock().await.release_hold();
                return Ok(self.decline(client, DeclineReason::SettlementUnconfirmed));
            }
            Err(e) => return Err(e),
        };

        let left = {
            let mut inventory = self.inventory.lock().await;
            inventory.commit_hold();
            inventory.on_hand()
        };
        self.deps.bus.publish(
            Event::new(EventKind::ConsumptionServed)
                .with_actor(self.name.as_str())
                .with_client(client)
                .with_counter(self.id)
                .with_items(i64::from(drinks), i64::from(popcorn))
                .with_remaining(left.drinks),
        );
        Ok(ConsumptionOutcome::Served {
            counter: self.id,
            drinks,
            popcorn,
            restocked,
            receipt,
        })
    }

    fn decline(&self, client: u32, reason: DeclineReason) -> ConsumptionOutcome {
        self.deps.bus.publish(
            Event::new(EventKind::ConsumptionDeclined)
                .with_actor(self.name.as_str())
                .with_client(client)
                .with_counter(self.id)
                .with_reason(reason.to_string()),
        );
        ConsumptionOutcome::Declined {
            counter: self.id,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concessions::{Inventory, ReplenishWorker, Stock};
    use crate::random::{PanicOnce, RandomSource, SeededRandom};
    use crate::settlement::{LotteryWeights, PriorityLottery, SettlementQueue, SettlementWorker};

    struct Rig {
        deps: CounterDeps,
        token: CancellationToken,
    }

    fn rig() -> Rig {
        rig_with(Arc::new(SeededRandom::new(5)), true)
    }

    fn rig_with(random: Arc<dyn RandomSource>, replenish_running: bool) -> Rig {
        let bus = Bus::new(256);
        let token = CancellationToken::new();
        let queue = Arc::new(SettlementQueue::new());
        let lottery = PriorityLottery::new(LotteryWeights::default(), random);
        let settlement = SettlementDesk::new(queue.clone(), lottery, bus.clone());
        tokio::spawn(SettlementWorker::new(queue, bus.clone(), Duration::ZERO).run(token.child_token()));

        let (replenish_worker, replenish) = ReplenishWorker::new(bus.clone(), Duration::ZERO);
        if replenish_running {
            tokio::spawn(replenish_worker.run(token.child_token()));
        } else {
            drop(replenish_worker);
        }

        Rig {
            deps: CounterDeps {
                dispatch: Arc::new(Dispatch::new()),
                replenish,
                settlement,
                bus,
            },
            token,
        }
    }

    fn request(client: u32, drinks: u32, popcorn: u32) -> ConsumptionRequest {
        ConsumptionRequest {
            client,
            drinks,
            popcorn,
        }
    }

    fn spawn_counter(
        rig: &Rig,
        policy: RestockPolicy,
        stock: (u32, u32, u32),
    ) -> (SharedInventory, tokio::task::JoinHandle<InventorySnapshot>) {
        let inventory = Inventory::new(1, stock.0, stock.1, stock.2).shared();
        let counter = Counter::new(1, inventory.clone(), rig.deps.clone(), policy, Duration::ZERO);
        (inventory, tokio::spawn(counter.run(rig.token.child_token())))
    }

    async fn submit(rig: &Rig, req: ConsumptionRequest) -> ConsumptionOutcome {
        let ticket = rig.deps.dispatch.submit(req).await.unwrap();
        assert_eq!(ticket.assigned.await.unwrap(), 1);
        ticket.outcome.await.unwrap()
    }

    async fn serve_one(policy: RestockPolicy, stock: (u32, u32, u32), req: ConsumptionRequest) -> (ConsumptionOutcome, InventorySnapshot) {
        let rig = rig();
        let (inventory, task) = spawn_counter(&rig, policy, stock);
        let outcome = submit(&rig, req).await;

        // Let an optimistic restock land before reading the final state.
        loop {
            if inventory.lock().await.snapshot().restocks > 0 || !matches!(outcome, ConsumptionOutcome::Served { restocked: true, .. }) {
                break;
            }
            tokio::task::yield_now().await;
        }

        rig.token.cancel();
        (outcome, task.await.unwrap())
    }

    #[tokio::test]
    async fn test_serves_from_stock() {
        let (outcome, snap) = serve_one(RestockPolicy::AwaitRestock, (15, 15, 15), request(1, 3, 4)).await;
        assert!(matches!(outcome, ConsumptionOutcome::Served { counter: 1, restocked: false, .. }));
        assert_eq!(snap.on_hand, Stock::new(12, 11));
        assert!(snap.is_balanced());
    }

    #[tokio::test]
    async fn test_short_stock_waits_for_restock() {
        let (outcome, snap) = serve_one(RestockPolicy::AwaitRestock, (2, 2, 10), request(1, 3, 1)).await;
        assert!(matches!(outcome, ConsumptionOutcome::Served { restocked: true, .. }));
        assert_eq!(snap.on_hand, Stock::new(7, 9));
        assert_eq!(snap.restocks, 1);
        assert!(snap.is_balanced());
    }

    #[tokio::test]
    async fn test_optimistic_deduct_then_restock() {
        let (outcome, snap) = serve_one(RestockPolicy::Optimistic, (2, 2, 10), request(1, 3, 1)).await;
        assert!(matches!(outcome, ConsumptionOutcome::Served { restocked: true, .. }));
        // Restock resets to the target after the deduction.
        assert_eq!(snap.on_hand, Stock::new(10, 10));
        assert!(snap.is_balanced());
    }

    #[tokio::test]
    async fn test_request_above_target_is_declined() {
        let (outcome, snap) = serve_one(RestockPolicy::AwaitRestock, (5, 5, 5), request(1, 6, 1)).await;
        assert_eq!(
            outcome,
            ConsumptionOutcome::Declined {
                counter: 1,
                reason: DeclineReason::ExceedsTarget { target: 5 }
            }
        );
        assert_eq!(snap.on_hand, Stock::new(5, 5));
        assert_eq!(snap.restocks, 0);
    }

    #[tokio::test]
    async fn test_fault_puts_stock_back_and_counter_keeps_serving() {
        let rig = rig_with(Arc::new(PanicOnce::default()), true);
        let mut events = rig.deps.bus.subscribe();
        let (inventory, task) = spawn_counter(&rig, RestockPolicy::AwaitRestock, (5, 5, 5));

        let first = submit(&rig, request(1, 1, 1)).await;
        assert!(
            matches!(&first, ConsumptionOutcome::Faulted(ServiceError::Panicked { info, .. }) if info == "lottery fault"),
            "got {first:?}"
        );
        let snap = inventory.lock().await.snapshot();
        assert_eq!(snap.on_hand, Stock::new(5, 5));
        assert_eq!(snap.served, Stock::default());
        assert!(snap.is_balanced());

        let second = submit(&rig, request(2, 2, 1)).await;
        assert!(matches!(second, ConsumptionOutcome::Served { counter: 1, .. }), "got {second:?}");

        rig.token.cancel();
        let snap = task.await.unwrap();
        assert_eq!(snap.on_hand, Stock::new(3, 4));
        assert_eq!(snap.served, Stock::new(2, 1));
        assert!(snap.is_balanced());

        let mut faults = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ActorFault {
                faults.push(ev);
            }
        }
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].client, Some(1));
        assert_eq!(faults[0].counter, Some(1));
    }

    #[tokio::test]
    async fn test_closed_replenish_fails_before_deducting() {
        let rig = rig_with(Arc::new(SeededRandom::new(5)), false);
        let (inventory, task) = spawn_counter(&rig, RestockPolicy::Optimistic, (2, 2, 10));

        let outcome = submit(&rig, request(1, 3, 1)).await;
        assert_eq!(outcome, ConsumptionOutcome::Faulted(ServiceError::closed("replenish")));

        let snap = inventory.lock().await.snapshot();
        assert_eq!(snap.on_hand, Stock::new(2, 2));
        assert_eq!(snap.served, Stock::default());
        assert_eq!(snap.restocks, 0);

        // Requests that fit the remaining stock are still served.
        let next = submit(&rig, request(2, 1, 1)).await;
        assert!(matches!(next, ConsumptionOutcome::Served { restocked: false, .. }), "got {next:?}");

        rig.token.cancel();
        let snap = task.await.unwrap();
        assert_eq!(snap.on_hand, Stock::new(1, 1));
        assert!(snap.is_balanced());
    }
}
