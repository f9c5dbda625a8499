//! # Runtime events emitted by the venue actors.
//!
//! The [`EventKind`] enum classifies event types across these categories:
//! - **Runtime events**: actor lifecycle, faults, shutdown
//! - **Admission events**: turns issued/released, seat requests and outcomes
//! - **Settlement events**: payments enqueued and confirmed
//! - **Concession events**: consumption requests, claims, replenishment
//! - **Client events**: state machine transitions
//!
//! The [`Event`] struct carries the metadata (actor, client, counter, quantities,
//! priority class, reason) set by the publisher. Events are observability only:
//! no actor reads the bus to make a decision.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use boxoffice::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AdmissionDenied)
//!     .with_actor("ticket-office")
//!     .with_client(7)
//!     .with_seats(12)
//!     .with_reason("insufficient seats");
//!
//! assert_eq!(ev.kind, EventKind::AdmissionDenied);
//! assert_eq!(ev.client, Some(7));
//! assert_eq!(ev.reason.as_deref(), Some("insufficient seats"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::client::{ClientId, ClientState};
use crate::concessions::CounterId;
use crate::settlement::{PaymentKind, PriorityClass};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `actor` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `actor` (subscriber name), `reason` ("full" or "closed").
    SubscriberOverflow,

    // === Runtime events ===
    /// An actor loop started.
    ///
    /// Sets: `actor`.
    ActorStarted,

    /// An actor loop exited (cancelled or drained).
    ///
    /// Sets: `actor`.
    ActorStopped,

    /// Transient fault inside an actor; the in-flight request got a `Faulted`
    /// outcome and the actor resumed its loop.
    ///
    /// Sets: `actor`, `reason`, optionally `client`.
    ActorFault,

    /// The turn scheduler failed; admission can no longer make progress.
    ///
    /// Sets: `actor`, `turn`, `reason`.
    SchedulerFailed,

    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All actors stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some actors did not stop in time.
    ///
    /// Sets: `reason` (stuck actor names).
    GraceExceeded,

    // === Admission ===
    /// A new turn was published to the waiting clients.
    ///
    /// Sets: `turn`.
    TurnIssued,

    /// The client holding the turn freed it.
    ///
    /// Sets: `turn`, `client`, `state` (admitted, rejected or aborted).
    TurnReleased,

    /// The ticket office received a seat request.
    ///
    /// Sets: `client`, `seats`.
    AdmissionRequested,

    /// Seats were paid and deducted from the pool.
    ///
    /// Sets: `client`, `seats`, `remaining` (seats left).
    AdmissionGranted,

    /// Seat request refused.
    ///
    /// Sets: `client`, `seats`, `remaining`, `reason`.
    AdmissionDenied,

    // === Settlement ===
    /// A payment entered the settlement queue.
    ///
    /// Sets: `client`, `payment`, `priority`.
    SettlementEnqueued,

    /// The settlement worker confirmed a payment.
    ///
    /// Sets: `client`, `payment`, `priority`, `position` (confirmation order).
    SettlementConfirmed,

    // === Concessions ===
    /// A client queued a consumption request.
    ///
    /// Sets: `client`, `drinks`, `popcorn`.
    ConsumptionRequested,

    /// A counter claimed a consumption request.
    ///
    /// Sets: `client`, `counter`.
    ConsumptionClaimed,

    /// Consumption request paid and handed over.
    ///
    /// Sets: `client`, `counter`, `drinks`, `popcorn`, `remaining` (drinks left).
    ConsumptionServed,

    /// Consumption request refused (larger than a full counter).
    ///
    /// Sets: `client`, `counter`, `reason`.
    ConsumptionDeclined,

    /// A counter ran short and asked for a restock.
    ///
    /// Sets: `counter`, `client`.
    ReplenishRequested,

    /// The replenish worker restocked a counter to its target.
    ///
    /// Sets: `counter`, `drinks`, `popcorn` (on hand after restock).
    Replenished,

    // === Clients ===
    /// Client moved to a new state.
    ///
    /// Sets: `client`, `state`.
    ClientStateChanged,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the publishing actor, if applicable.
    pub actor: Option<Arc<str>>,
    /// Client the event is about.
    pub client: Option<ClientId>,
    /// Counter the event is about.
    pub counter: Option<CounterId>,
    /// Turn value.
    pub turn: Option<u32>,
    /// Seat quantity.
    pub seats: Option<u32>,
    /// Drink quantity.
    pub drinks: Option<i64>,
    /// Popcorn quantity.
    pub popcorn: Option<i64>,
    /// Remaining stock (seats or drinks, depending on kind).
    pub remaining: Option<i64>,
    /// Payment kind of a settlement event.
    pub payment: Option<PaymentKind>,
    /// Settlement priority class.
    pub priority: Option<PriorityClass>,
    /// Position in the settlement confirmation order (1-based).
    pub position: Option<u64>,
    /// Client state (transitions and turn releases).
    pub state: Option<ClientState>,
    /// Human-readable reason (faults, denials, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            client: None,
            counter: None,
            turn: None,
            seats: None,
            drinks: None,
            popcorn: None,
            remaining: None,
            payment: None,
            priority: None,
            position: None,
            state: None,
            reason: None,
        }
    }

    /// Attaches the publishing actor name.
    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches a client id.
    #[inline]
    pub fn with_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }

    /// Attaches a counter id.
    #[inline]
    pub fn with_counter(mut self, counter: CounterId) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Attaches a turn value.
    #[inline]
    pub fn with_turn(mut self, turn: u32) -> Self {
        self.turn = Some(turn);
        self
    }

    /// Attaches a seat quantity.
    #[inline]
    pub fn with_seats(mut self, seats: u32) -> Self {
        self.seats = Some(seats);
        self
    }

    /// Attaches drink and popcorn quantities.
    #[inline]
    pub fn with_items(mut self, drinks: i64, popcorn: i64) -> Self {
        self.drinks = Some(drinks);
        self.popcorn = Some(popcorn);
        self
    }

    /// Attaches a remaining stock figure.
    #[inline]
    pub fn with_remaining(mut self, remaining: i64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    /// Attaches settlement metadata.
    #[inline]
    pub fn with_payment(mut self, payment: PaymentKind, priority: PriorityClass) -> Self {
        self.payment = Some(payment);
        self.priority = Some(priority);
        self
    }

    /// Attaches the settlement confirmation position.
    #[inline]
    pub fn with_position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }

    /// Attaches a client state.
    #[inline]
    pub fn with_state(mut self, state: ClientState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_actor(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_actor(subscriber)
            .with_reason(info)
    }

    /// Creates a transient actor fault event.
    #[inline]
    pub fn actor_fault(actor: &str, reason: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::ActorFault)
            .with_actor(actor)
            .with_reason(reason)
    }

    /// Returns true for events describing a fault (transient or fatal).
    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ActorFault | EventKind::SchedulerFailed | EventKind::SubscriberPanicked
        )
    }
}
