//! # Priority-ordered settlement queue.
//!
//! Many producers, one consumer. The heap is guarded by a mutex; a counting
//! [`Semaphore`] holds one permit per queued request, so the consumer sleeps
//! while the queue is empty and wakes once per push, never missing one.
//!
//! ```text
//! push():  lock ─► heap.push(entry) ─► unlock ─► ready.add_permits(1)
//! pop():   ready.acquire() ─► lock ─► heap.pop() ─► unlock ─► forget permit
//! close(): lock ─► closed=true, heap.clear() ─► unlock ─► ready.close()
//! ```
//!
//! ## Rules
//! - `pop` returns the smallest `(priority, arrival)` pair.
//! - Arrival numbers are assigned under the lock, so they match push order.
//! - Closing drops every pending request; their requesters observe a closed
//!   channel instead of waiting forever.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::sync::{Mutex, Semaphore, oneshot};

use crate::client::ClientId;
use crate::error::ServiceError;
use crate::settlement::{PaymentKind, PriorityClass, Receipt};

/// A pending payment, owned by the queue until the worker confirms it.
#[derive(Debug)]
pub struct SettlementRequest {
    /// Arrival number.
    pub id: u64,
    /// Paying client.
    pub client: ClientId,
    /// What is being paid for.
    pub kind: PaymentKind,
    /// Queue class.
    pub priority: PriorityClass,
    reply: oneshot::Sender<Receipt>,
}

impl SettlementRequest {
    /// Marks the request confirmed and wakes the requester.
    ///
    /// Returns the receipt; `delivered` is false when the requester is gone.
    pub(crate) fn confirm(self, position: u64) -> (Receipt, bool) {
        let receipt = Receipt {
            id: self.id,
            client: self.client,
            kind: self.kind,
            priority: self.priority,
            position,
        };
        let delivered = self.reply.send(receipt.clone()).is_ok();
        (receipt, delivered)
    }

    fn key(&self) -> (PriorityClass, u64) {
        (self.priority, self.id)
    }
}

/// Heap entry: max-heap over the reversed `(priority, arrival)` key.
struct Entry(SettlementRequest);

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.0.key() == other.0.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.key().cmp(&self.0.key())
    }
}

struct State {
    heap: BinaryHeap<Entry>,
    next_id: u64,
    closed: bool,
}

/// Priority queue of pending payments.
pub struct SettlementQueue {
    state: Mutex<State>,
    ready: Semaphore,
}

impl SettlementQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                next_id: 0,
                closed: false,
            }),
            ready: Semaphore::new(0),
        }
    }

    /// Enqueues a payment; the receiver resolves when it is confirmed.
    pub async fn push(
        &self,
        client: ClientId,
        kind: PaymentKind,
        priority: PriorityClass,
    ) -> Result<(u64, oneshot::Receiver<Receipt>), ServiceError> {
        let (reply, confirmation) = oneshot::channel();
        let id = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ServiceError::closed("settlement"));
            }
            state.next_id += 1;
            let id = state.next_id;
            state.heap.push(Entry(SettlementRequest {
                id,
                client,
                kind,
                priority,
                reply,
            }));
            id
        };
        self.ready.add_permits(1);
        Ok((id, confirmation))
    }

    /// Waits for the next request in priority order; `None` once closed.
    pub async fn pop(&self) -> Option<SettlementRequest> {
        let permit = self.ready.acquire().await.ok()?;
        let next = self.state.lock().await.heap.pop();
        permit.forget();
        next.map(|entry| entry.0)
    }

    /// Takes the next request if one is ready, without waiting.
    pub async fn try_pop(&self) -> Option<SettlementRequest> {
        let permit = self.ready.try_acquire().ok()?;
        let next = self.state.lock().await.heap.pop();
        permit.forget();
        next.map(|entry| entry.0)
    }

    /// Number of pending requests.
    pub async fn len(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closes the queue: refuses new pushes and drops every pending request.
    pub async fn close(&self) {
        let dropped = {
            let mut state = self.state.lock().await;
            state.closed = true;
            std::mem::take(&mut state.heap)
        };
        self.ready.close();
        drop(dropped);
    }
}

impl Default for SettlementQueue {
    fn default() -> Self {
        Self::new()
    }
}
