//! # TicketOffice: the single seat-pool server.
//!
//! The office owns the [`SeatPool`] outright. Clients reach it only through a
//! [`TicketOfficeHandle`], which sends a command over `mpsc` and waits on a
//! private `oneshot` for the outcome. The office processes one command at a
//! time, so check-then-commit on the pool can never see stale state.
//!
//! ```text
//! handle.request_seats(client, n)
//!   └─► Command::Admit ──► TicketOffice::run
//!                            ├─ n == 0            → Denied(EmptyRequest)
//!                            ├─ n > available     → Denied(InsufficientSeats)  (no payment)
//!                            ├─ settle(Seats) ──► SettlementWorker
//!                            │    └─ not confirmed → Denied(SettlementUnconfirmed)
//!                            └─ pool.commit(n)    → Granted { remaining }
//!   ◄── oneshot outcome ─────┘
//! ```
//!
//! A panic or error while handling one admission is contained: the requester
//! receives [`AdmissionOutcome::Faulted`], an `ActorFault` event is published,
//! and the office keeps serving.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::client::ClientId;
use crate::core::fault::contain;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::settlement::{PaymentKind, Receipt, SettlementDesk};

const NAME: &str = "ticket-office";
const COMMAND_QUEUE: usize = 64;

/// Shared seat counter; never negative, never above capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPool {
    capacity: u32,
    available: u32,
    admissions: u32,
}

impl SeatPool {
    /// Creates a full pool.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            available: capacity,
            admissions: 0,
        }
    }

    /// Seats still available.
    pub fn available(&self) -> u32 {
        self.available
    }

    /// Returns true if `seats` can be committed right now.
    pub fn can_seat(&self, seats: u32) -> bool {
        seats <= self.available
    }

    /// Deducts `seats`, returning the new availability.
    pub fn commit(&mut self, seats: u32) -> Result<u32, ServiceError> {
        let remaining = self
            .available
            .checked_sub(seats)
            .ok_or(ServiceError::SeatUnderflow {
                requested: seats,
                available: self.available,
            })?;
        self.available = remaining;
        self.admissions += 1;
        Ok(remaining)
    }

    /// Point-in-time view of the pool.
    pub fn snapshot(&self) -> SeatSnapshot {
        SeatSnapshot {
            capacity: self.capacity,
            available: self.available,
            granted: self.capacity - self.available,
            admissions: self.admissions,
        }
    }
}

/// Seat pool state reported by [`TicketOfficeHandle::snapshot`] and at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeatSnapshot {
    /// Initial capacity.
    pub capacity: u32,
    /// Seats still free.
    pub available: u32,
    /// Seats sold (`capacity - available`).
    pub granted: u32,
    /// Number of granted admissions.
    pub admissions: u32,
}

/// Why an admission was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// More seats requested than available. No payment was taken.
    InsufficientSeats {
        /// Seats requested.
        requested: u32,
        /// Seats available when checked.
        available: u32,
    },
    /// A request for zero seats.
    EmptyRequest,
    /// Settlement stopped before confirming the payment.
    SettlementUnconfirmed,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::InsufficientSeats {
                requested,
                available,
            } => write!(f, "insufficient seats: requested {requested}, available {available}"),
            DenialReason::EmptyRequest => f.write_str("empty request"),
            DenialReason::SettlementUnconfirmed => f.write_str("settlement unconfirmed"),
        }
    }
}

/// Terminal outcome of one admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Paid and committed.
    Granted {
        /// Seats committed.
        seats: u32,
        /// Pool availability right after the commit.
        remaining: u32,
        /// Settlement receipt.
        receipt: Receipt,
    },
    /// Not admitted; the pool is unchanged.
    Denied(DenialReason),
    /// The office failed while handling the request; the pool is unchanged.
    Faulted(ServiceError),
}

impl AdmissionOutcome {
    /// Returns true for [`AdmissionOutcome::Granted`].
    pub fn is_granted(&self) -> bool {
        matches!(self, AdmissionOutcome::Granted { .. })
    }
}

/// A client's bid for seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// Requesting client.
    pub client: ClientId,
    /// Seats asked for.
    pub seats: u32,
}

enum Command {
    Admit {
        request: AdmissionRequest,
        reply: oneshot::Sender<AdmissionOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<SeatSnapshot>,
    },
}

/// Handle for talking to a running [`TicketOffice`].
#[derive(Clone)]
pub struct TicketOfficeHandle {
    tx: mpsc::Sender<Command>,
}

impl TicketOfficeHandle {
    /// Submits an admission request and waits for its outcome.
    pub async fn request_seats(&self, client: ClientId, seats: u32) -> Result<AdmissionOutcome, ServiceError> {
        let (reply, outcome) = oneshot::channel();
        let request = AdmissionRequest { client, seats };
        self.tx
            .send(Command::Admit { request, reply })
            .await
            .map_err(|_| ServiceError::closed(NAME))?;
        outcome.await.map_err(|_| ServiceError::closed(NAME))
    }

    /// Reads the current pool state.
    pub async fn snapshot(&self) -> Result<SeatSnapshot, ServiceError> {
        let (reply, snapshot) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ServiceError::closed(NAME))?;
        snapshot.await.map_err(|_| ServiceError::closed(NAME))
    }
}

/// Seat-pool owner. Must be driven with [`TicketOffice::run`].
pub struct TicketOffice {
    pool: SeatPool,
    settlement: SettlementDesk,
    bus: Bus,
    delay: Duration,
    rx: mpsc::Receiver<Command>,
}

impl TicketOffice {
    /// Creates the office and its handle. `delay` is spent on each admission.
    pub fn new(capacity: u32, settlement: SettlementDesk, bus: Bus, delay: Duration) -> (Self, TicketOfficeHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let office = Self {
            pool: SeatPool::new(capacity),
            settlement,
            bus,
            delay,
            rx,
        };
        (office, TicketOfficeHandle { tx })
    }

    /// Actor name used in events.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Serves commands until cancelled or every handle is dropped.
    ///
    /// Returns the final pool state.
    pub async fn run(mut self, token: CancellationToken) -> SeatSnapshot {
        loop {
            let command = tokio::select! {
                _ = token.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.pool.snapshot());
                }
                Command::Admit { request, reply } => {
                    let res = tokio::select! {
                        _ = token.cancelled() => break,
                        res = contain(NAME, self.admit(request)) => res,
                    };
                    let outcome = res.unwrap_or_else(|e| {
                        self.bus.publish(
                            Event::actor_fault(NAME, e.to_string()).with_client(request.client),
                        );
                        AdmissionOutcome::Faulted(e)
                    });
                    let _ = reply.send(outcome);
                }
            }
        }

        self.rx.close();
        self.pool.snapshot()
    }

    async fn admit(&mut self, request: AdmissionRequest) -> Result<AdmissionOutcome, ServiceError> {
        let AdmissionRequest { client, seats } = request;
        self.bus.publish(
            Event::new(EventKind::AdmissionRequested)
                .with_actor(NAME)
                .with_client(client)
                .with_seats(seats),
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if seats == 0 {
            return Ok(self.deny(client, seats, DenialReason::EmptyRequest));
        }
        if !self.pool.can_seat(seats) {
            let reason = DenialReason::InsufficientSeats {
                requested: seats,
                available: self.pool.available(),
            };
            return Ok(self.deny(client, seats, reason));
        }

        let receipt = match self.settlement.settle(client, PaymentKind::Seats).await {
            Ok(receipt) => receipt,
            Err(ServiceError::Closed { .. }) => {
                return Ok(self.deny(client, seats, DenialReason::SettlementUnconfirmed));
            }
            Err(e) => return Err(e),
        };

        let remaining = self.pool.commit(seats)?;
        self.bus.publish(
            Event::new(EventKind::AdmissionGranted)
                .with_actor(NAME)
                .with_client(client)
                .with_seats(seats)
                .with_remaining(i64::from(remaining)),
        );
        Ok(AdmissionOutcome::Granted {
            seats,
            remaining,
            receipt,
        })
    }

    fn deny(&self, client: ClientId, seats: u32, reason: DenialReason) -> AdmissionOutcome {
        self.bus.publish(
            Event::new(EventKind::AdmissionDenied)
                .with_actor(NAME)
                .with_client(client)
                .with_seats(seats)
                .with_remaining(i64::from(self.pool.available()))
                .with_reason(reason.to_string()),
        );
        AdmissionOutcome::Denied(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::random::{PanicOnce, RandomSource, SeededRandom};
    use crate::settlement::{LotteryWeights, PriorityLottery, SettlementQueue, SettlementWorker};

    struct Harness {
        office: TicketOfficeHandle,
        token: CancellationToken,
        office_task: tokio::task::JoinHandle<SeatSnapshot>,
        bus: Bus,
    }

    async fn start(capacity: u32, with_worker: bool) -> Harness {
        start_with(capacity, with_worker, Arc::new(SeededRandom::new(3))).await
    }

    async fn start_with(capacity: u32, with_worker: bool, random: Arc<dyn RandomSource>) -> Harness {
        let bus = Bus::new(256);
        let queue = Arc::new(SettlementQueue::new());
        let lottery = PriorityLottery::new(LotteryWeights::default(), random);
        let desk = SettlementDesk::new(queue.clone(), lottery, bus.clone());
        let token = CancellationToken::new();

        if with_worker {
            let worker = SettlementWorker::new(queue, bus.clone(), Duration::ZERO);
            tokio::spawn(worker.run(token.child_token()));
        } else {
            queue.close().await;
        }

        let (office, handle) = TicketOffice::new(capacity, desk, bus.clone(), Duration::ZERO);
        let office_task = tokio::spawn(office.run(token.child_token()));
        Harness {
            office: handle,
            token,
            office_task,
            bus,
        }
    }

    #[test]
    fn test_pool_commit_is_checked() {
        let mut pool = SeatPool::new(10);
        assert_eq!(pool.commit(6), Ok(4));
        assert_eq!(
            pool.commit(5),
            Err(ServiceError::SeatUnderflow {
                requested: 5,
                available: 4
            })
        );
        assert_eq!(pool.snapshot().granted, 6);
        assert_eq!(pool.snapshot().admissions, 1);
    }

    #[tokio::test]
    async fn test_oversized_request_is_denied_without_payment() {
        let h = start(10, true).await;

        let outcome = h.office.request_seats(1, 12).await.unwrap();
        assert_eq!(
            outcome,
            AdmissionOutcome::Denied(DenialReason::InsufficientSeats {
                requested: 12,
                available: 10
            })
        );
        assert_eq!(h.office.snapshot().await.unwrap().available, 10);

        h.token.cancel();
        assert_eq!(h.office_task.await.unwrap().available, 10);
    }

    #[tokio::test]
    async fn test_grant_then_deny() {
        let h = start(10, true).await;

        let first = h.office.request_seats(1, 6).await.unwrap();
        assert!(matches!(first, AdmissionOutcome::Granted { seats: 6, remaining: 4, .. }));

        let second = h.office.request_seats(2, 5).await.unwrap();
        assert!(matches!(second, AdmissionOutcome::Denied(DenialReason::InsufficientSeats { .. })));

        let snap = h.office.snapshot().await.unwrap();
        assert_eq!(snap.available, 4);
        assert_eq!(snap.granted, 6);
        h.token.cancel();
    }

    #[tokio::test]
    async fn test_empty_request_is_denied() {
        let h = start(10, true).await;
        let outcome = h.office.request_seats(1, 0).await.unwrap();
        assert_eq!(outcome, AdmissionOutcome::Denied(DenialReason::EmptyRequest));
        h.token.cancel();
    }

    #[tokio::test]
    async fn test_unconfirmed_payment_leaves_pool_untouched() {
        let h = start(10, false).await;

        let outcome = h.office.request_seats(1, 3).await.unwrap();
        assert_eq!(outcome, AdmissionOutcome::Denied(DenialReason::SettlementUnconfirmed));
        assert_eq!(h.office.snapshot().await.unwrap().available, 10);
        h.token.cancel();
    }

    #[tokio::test]
    async fn test_fault_is_answered_and_office_keeps_serving() {
        let h = start_with(10, true, Arc::new(PanicOnce::default())).await;
        let mut events = h.bus.subscribe();

        let first = h.office.request_seats(1, 3).await.unwrap();
        assert!(
            matches!(&first, AdmissionOutcome::Faulted(ServiceError::Panicked { actor, .. }) if actor == "ticket-office"),
            "got {first:?}"
        );
        assert_eq!(h.office.snapshot().await.unwrap().available, 10);

        let second = h.office.request_seats(2, 3).await.unwrap();
        assert!(matches!(second, AdmissionOutcome::Granted { seats: 3, remaining: 7, .. }), "got {second:?}");

        h.token.cancel();
        assert_eq!(h.office_task.await.unwrap().available, 7);

        let mut faults = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ActorFault {
                faults.push(ev);
            }
        }
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].client, Some(1));
    }

    #[tokio::test]
    async fn test_stopped_office_reports_closed() {
        let h = start(10, true).await;
        h.token.cancel();
        h.office_task.await.unwrap();

        let err = h.office.request_seats(1, 1).await.unwrap_err();
        assert_eq!(err, ServiceError::closed("ticket-office"));
    }
}
