//! Per-counter stock of drinks and popcorn.
//!
//! Quantities are signed: under [`RestockPolicy::Optimistic`](crate::RestockPolicy)
//! a deduction may land before the restock and leave stock transiently negative.
//! Every change is recorded so the accounting identity
//! `on_hand == initial - served + restocked` can be checked at any time.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::concessions::CounterId;

/// Inventory shared by one counter and the replenish worker, serialized per counter.
pub type SharedInventory = Arc<Mutex<Inventory>>;

/// One counter's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    counter: CounterId,
    target: i64,
    initial: Stock,
    on_hand: Stock,
    served: Stock,
    restocked: Stock,
    restocks: u32,
    held: Option<Stock>,
}

/// A drinks/popcorn pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stock {
    /// Drinks.
    pub drinks: i64,
    /// Popcorn.
    pub popcorn: i64,
}

impl Stock {
    /// Creates a pair.
    pub fn new(drinks: i64, popcorn: i64) -> Self {
        Self { drinks, popcorn }
    }
}

impl Inventory {
    /// Creates an inventory with the given opening stock and replenish target.
    pub fn new(counter: CounterId, drinks: u32, popcorn: u32, target: u32) -> Self {
        let initial = Stock::new(i64::from(drinks), i64::from(popcorn));
        Self {
            counter,
            target: i64::from(target),
            initial,
            on_hand: initial,
            served: Stock::default(),
            restocked: Stock::default(),
            restocks: 0,
            held: None,
        }
    }

    /// Wraps the inventory for sharing with the replenish worker.
    pub fn shared(self) -> SharedInventory {
        Arc::new(Mutex::new(self))
    }

    /// Owning counter.
    pub fn counter(&self) -> CounterId {
        self.counter
    }

    /// Stock currently on hand.
    pub fn on_hand(&self) -> Stock {
        self.on_hand
    }

    /// Level a restock tops both goods up to.
    pub fn target(&self) -> i64 {
        self.target
    }

    /// True if either good is below the requested amount.
    pub fn is_short(&self, drinks: u32, popcorn: u32) -> bool {
        self.on_hand.drinks < i64::from(drinks) || self.on_hand.popcorn < i64::from(popcorn)
    }

    /// True if a full restock would cover the request.
    pub fn can_ever_serve(&self, drinks: u32, popcorn: u32) -> bool {
        i64::from(drinks) <= self.target && i64::from(popcorn) <= self.target
    }

    /// Removes a served request from stock.
    pub fn deduct(&mut self, drinks: u32, popcorn: u32) {
        let (drinks, popcorn) = (i64::from(drinks), i64::from(popcorn));
        self.on_hand.drinks -= drinks;
        self.on_hand.popcorn -= popcorn;
        self.served.drinks += drinks;
        self.served.popcorn += popcorn;
    }

    /// Deducts a request that is still awaiting payment.
    ///
    /// The deduction stays pending until [`Inventory::commit_hold`] confirms it
    /// or [`Inventory::release_hold`] puts it back. One hold at a time.
    pub fn hold(&mut self, drinks: u32, popcorn: u32) {
        self.deduct(drinks, popcorn);
        self.held = Some(Stock::new(i64::from(drinks), i64::from(popcorn)));
    }

    /// Confirms the pending deduction.
    pub fn commit_hold(&mut self) -> Option<Stock> {
        self.held.take()
    }

    /// Puts the pending deduction back (payment never confirmed); returns what was refunded.
    pub fn release_hold(&mut self) -> Option<Stock> {
        let held = self.held.take()?;
        self.put_back(held);
        Some(held)
    }

    /// Pending deduction, if any.
    pub fn held(&self) -> Option<Stock> {
        self.held
    }

    fn put_back(&mut self, stock: Stock) {
        self.on_hand.drinks += stock.drinks;
        self.on_hand.popcorn += stock.popcorn;
        self.served.drinks -= stock.drinks;
        self.served.popcorn -= stock.popcorn;
    }

    /// Resets both goods to the target; returns the quantities added.
    pub fn restock(&mut self) -> Stock {
        let added = Stock::new(
            self.target - self.on_hand.drinks,
            self.target - self.on_hand.popcorn,
        );
        self.on_hand = Stock::new(self.target, self.target);
        self.restocked.drinks += added.drinks;
        self.restocked.popcorn += added.popcorn;
        self.restocks += 1;
        added
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            counter: self.counter,
            target: self.target,
            initial: self.initial,
            on_hand: self.on_hand,
            served: self.served,
            restocked: self.restocked,
            restocks: self.restocks,
        }
    }
}

/// Final or intermediate state of one counter's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySnapshot {
    /// Owning counter.
    pub counter: CounterId,
    /// Replenish target.
    pub target: i64,
    /// Opening stock.
    pub initial: Stock,
    /// Stock on hand.
    pub on_hand: Stock,
    /// Total deducted for served requests.
    pub served: Stock,
    /// Total added by restocks.
    pub restocked: Stock,
    /// Number of restocks applied.
    pub restocks: u32,
}

impl InventorySnapshot {
    /// Checks `on_hand == initial - served + restocked` for both goods.
    pub fn is_balanced(&self) -> bool {
        self.on_hand.drinks == self.initial.drinks - self.served.drinks + self.restocked.drinks
            && self.on_hand.popcorn == self.initial.popcorn - self.served.popcorn + self.restocked.popcorn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_detection() {
        let inv = Inventory::new(1, 2, 2, 10);
        assert!(inv.is_short(3, 1));
        assert!(inv.is_short(1, 3));
        assert!(!inv.is_short(2, 2));
        assert!(inv.can_ever_serve(10, 10));
        assert!(!inv.can_ever_serve(11, 1));
    }

    #[test]
    fn test_restock_then_deduct() {
        let mut inv = Inventory::new(1, 2, 2, 10);
        let added = inv.restock();
        assert_eq!(added, Stock::new(8, 8));

        inv.deduct(3, 1);
        let snap = inv.snapshot();
        assert_eq!(snap.on_hand, Stock::new(7, 9));
        assert_eq!(snap.restocks, 1);
        assert!(snap.is_balanced());
    }

    #[test]
    fn test_optimistic_deduct_goes_negative_then_balances() {
        let mut inv = Inventory::new(1, 2, 2, 10);
        inv.deduct(3, 1);
        assert_eq!(inv.on_hand(), Stock::new(-1, 1));
        assert!(inv.snapshot().is_balanced());

        inv.restock();
        assert_eq!(inv.on_hand(), Stock::new(10, 10));
        let snap = inv.snapshot();
        assert_eq!(snap.restocked, Stock::new(11, 9));
        assert!(snap.is_balanced());
    }

    #[test]
    fn test_released_hold_restores_stock_once() {
        let mut inv = Inventory::new(1, 5, 5, 5);
        inv.hold(2, 1);
        assert_eq!(inv.on_hand(), Stock::new(3, 4));
        assert_eq!(inv.held(), Some(Stock::new(2, 1)));

        assert_eq!(inv.release_hold(), Some(Stock::new(2, 1)));
        assert_eq!(inv.release_hold(), None);
        let snap = inv.snapshot();
        assert_eq!(snap.on_hand, Stock::new(5, 5));
        assert_eq!(snap.served, Stock::default());
        assert!(snap.is_balanced());
    }

    #[test]
    fn test_committed_hold_stays_served() {
        let mut inv = Inventory::new(1, 5, 5, 5);
        inv.hold(2, 1);
        assert_eq!(inv.commit_hold(), Some(Stock::new(2, 1)));
        assert_eq!(inv.release_hold(), None);
        assert_eq!(inv.snapshot().served, Stock::new(2, 1));
    }
}
