//! # Dispatch: the shared consumption request queue.
//!
//! Clients submit; any idle counter claims. A [`Semaphore`] holds one permit
//! per pending request, so idle counters sleep until there is work. The claim
//! itself (pop the oldest request, stamp it with the counter id) happens under
//! one mutex, so each request is claimed by exactly one counter.
//!
//! ```text
//! submit():          lock ─► push_back ─► unlock ─► pending.add_permits(1)
//! claim(counter):    pending.acquire ─► lock ─► pop_front ─► unlock ─► forget permit
//!                      └─► assigned.send(counter)   (requester gone → skip)
//! ```

use std::collections::VecDeque;

use tokio::sync::{Mutex, Semaphore, oneshot};

use crate::client::ClientId;
use crate::concessions::{ConsumptionOutcome, CounterId};
use crate::error::ServiceError;

/// A client's bid for drinks and popcorn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionRequest {
    /// Requesting client.
    pub client: ClientId,
    /// Drinks asked for.
    pub drinks: u32,
    /// Popcorn asked for.
    pub popcorn: u32,
}

/// Requester's side of a submitted request.
pub struct ConsumptionTicket {
    /// Resolves once a counter claims the request.
    pub assigned: oneshot::Receiver<CounterId>,
    /// Resolves with the terminal outcome.
    pub outcome: oneshot::Receiver<ConsumptionOutcome>,
}

/// A request claimed by one counter; the counter must answer through it.
#[derive(Debug)]
pub struct Claimed {
    /// The request.
    pub request: ConsumptionRequest,
    /// Counter that claimed it.
    pub counter: CounterId,
    reply: oneshot::Sender<ConsumptionOutcome>,
}

impl Claimed {
    /// Delivers the outcome; returns false if the requester is gone.
    pub fn answer(self, outcome: ConsumptionOutcome) -> bool {
        self.reply.send(outcome).is_ok()
    }
}

struct Queued {
    request: ConsumptionRequest,
    assigned: oneshot::Sender<CounterId>,
    reply: oneshot::Sender<ConsumptionOutcome>,
}

struct State {
    queue: VecDeque<Queued>,
    closed: bool,
}

/// FIFO of unclaimed consumption requests.
pub struct Dispatch {
    state: Mutex<State>,
    pending: Semaphore,
}

impl Dispatch {
    /// Creates an empty, open dispatch queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            pending: Semaphore::new(0),
        }
    }

    /// Queues a request for the next idle counter.
    pub async fn submit(&self, request: ConsumptionRequest) -> Result<ConsumptionTicket, ServiceError> {
        let (assigned_tx, assigned) = oneshot::channel();
        let (reply, outcome) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ServiceError::closed("counters"));
            }
            state.queue.push_back(Queued {
                request,
                assigned: assigned_tx,
                reply,
            });
        }
        self.pending.add_permits(1);
        Ok(ConsumptionTicket { assigned, outcome })
    }

    /// Waits for the oldest unclaimed request and stamps it with `counter`.
    ///
    /// Requests whose client already gave up are skipped. Returns `None` once closed.
    pub async fn claim(&self, counter: CounterId) -> Option<Claimed> {
        loop {
            let permit = self.pending.acquire().await.ok()?;
            let next = self.state.lock().await.queue.pop_front();
            // Consumed only once the entry is out of the queue.
            permit.forget();

            let Some(queued) = next else {
                continue;
            };
            if queued.assigned.send(counter).is_err() {
                continue;
            }
            return Some(Claimed {
                request: queued.request,
                counter,
                reply: queued.reply,
            });
        }
    }

    /// Number of unclaimed requests.
    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Returns true if no request is waiting.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Refuses new requests and drops every unclaimed one.
    pub async fn close(&self) {
        let dropped = {
            let mut state = self.state.lock().await;
            state.closed = true;
            std::mem::take(&mut state.queue)
        };
        self.pending.close();
        drop(dropped);
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn request(client: ClientId) -> ConsumptionRequest {
        ConsumptionRequest {
            client,
            drinks: 1,
            popcorn: 1,
        }
    }

    #[tokio::test]
    async fn test_claims_in_arrival_order() {
        let dispatch = Dispatch::new();
        let mut tickets = Vec::new();
        for client in 1..=3 {
            tickets.push(dispatch.submit(request(client)).await.unwrap());
        }

        let first = dispatch.claim(7).await.unwrap();
        let second = dispatch.claim(8).await.unwrap();
        assert_eq!(first.request.client, 1);
        assert_eq!(second.request.client, 2);

        let mut tickets = tickets.into_iter();
        assert_eq!(tickets.next().unwrap().assigned.await.unwrap(), 7);
        assert_eq!(tickets.next().unwrap().assigned.await.unwrap(), 8);
        assert_eq!(dispatch.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_request_claimed_exactly_once() {
        let dispatch = Arc::new(Dispatch::new());
        let mut tickets = Vec::new();
        for client in 1..=200 {
            tickets.push(dispatch.submit(request(client)).await.unwrap());
        }

        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut counters = Vec::new();
        for counter in 1..=4 {
            let dispatch = dispatch.clone();
            let seen_tx = seen_tx.clone();
            counters.push(tokio::spawn(async move {
                while let Some(claimed) = dispatch.claim(counter).await {
                    seen_tx.send(claimed.request.client).unwrap();
                }
            }));
        }
        drop(seen_tx);

        for t in tickets {
            assert!(t.assigned.await.is_ok());
        }
        dispatch.close().await;
        for c in counters {
            c.await.unwrap();
        }

        let mut seen = HashSet::new();
        while let Some(client) = seen_rx.recv().await {
            assert!(seen.insert(client), "client {client} claimed twice");
        }
        assert_eq!(seen.len(), 200);
    }

    #[tokio::test]
    async fn test_abandoned_request_is_skipped() {
        let dispatch = Dispatch::new();
        let gone = dispatch.submit(request(1)).await.unwrap();
        drop(gone);
        let _live = dispatch.submit(request(2)).await.unwrap();

        assert_eq!(dispatch.claim(1).await.unwrap().request.client, 2);
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let dispatch = Dispatch::new();
        let ticket = dispatch.submit(request(1)).await.unwrap();
        dispatch.close().await;

        assert!(ticket.assigned.await.is_err());
        assert!(dispatch.claim(1).await.is_none());
        assert!(dispatch.submit(request(2)).await.is_err());
    }
}
