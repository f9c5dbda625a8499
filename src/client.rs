//! # Client: one moviegoer's journey through the venue.
//!
//! ```text
//! AwaitingTurn ─► RequestingSeats ─┬─► Rejected (denied)                        (exit)
//!                                  ├─► Aborted  (office faulted)                 (exit)
//!                                  └─► Admitted ─► RequestingConsumption ─► AwaitingService ─► Done
//!
//! any wait ──(cancelled, collaborator gone or faulted)──► Aborted
//! ```
//!
//! Every transition is driven by a wakeup from a collaborator: the turn board,
//! the ticket office's reply, the counter assignment and the counter's reply.
//! The turn is freed as soon as the admission outcome is known, so a client's
//! consumption phase never holds up the next admission.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionOutcome, TicketOfficeHandle, TurnBoard};
use crate::concessions::{ConsumptionOutcome, ConsumptionRequest, CounterId, Dispatch};
use crate::events::{Bus, Event, EventKind};
use crate::random::RandomSource;

/// Client identifier; also the turn the client waits for (1-based).
pub type ClientId = u32;

/// Where a client is in its journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Waiting for its turn number.
    AwaitingTurn,
    /// Holding the turn, waiting for the ticket office.
    RequestingSeats,
    /// Admission denied (terminal).
    Rejected,
    /// Seats granted.
    Admitted,
    /// Consumption request submitted, no counter yet.
    RequestingConsumption,
    /// Claimed by a counter, waiting to be served.
    AwaitingService,
    /// Consumption answered (terminal).
    Done,
    /// Stopped early: shutdown or a collaborator went away (terminal).
    Aborted,
}

impl ClientState {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::AwaitingTurn => "awaiting_turn",
            ClientState::RequestingSeats => "requesting_seats",
            ClientState::Rejected => "rejected",
            ClientState::Admitted => "admitted",
            ClientState::RequestingConsumption => "requesting_consumption",
            ClientState::AwaitingService => "awaiting_service",
            ClientState::Done => "done",
            ClientState::Aborted => "aborted",
        }
    }

    /// Returns true for `Rejected`, `Done` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Rejected | ClientState::Done | ClientState::Aborted)
    }
}

/// What a client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    /// Seats.
    pub seats: u32,
    /// Drinks.
    pub drinks: u32,
    /// Popcorn.
    pub popcorn: u32,
}

impl Demand {
    /// Fixed demand.
    pub fn new(seats: u32, drinks: u32, popcorn: u32) -> Self {
        Self {
            seats,
            drinks,
            popcorn,
        }
    }

    /// Draws seats in `[1, max_seats-1]` and each good in `[1, max_items-1]`.
    pub fn draw(random: &dyn RandomSource, max_seats: u32, max_items: u32) -> Self {
        Self {
            seats: random.next_bounded(max_seats),
            drinks: random.next_bounded(max_items),
            popcorn: random.next_bounded(max_items),
        }
    }
}

/// Everything a client went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    /// Client id.
    pub id: ClientId,
    /// What it asked for.
    pub demand: Demand,
    /// Terminal state.
    pub state: ClientState,
    /// Every state visited, in order.
    pub history: Vec<ClientState>,
    /// Ticket office answer, if one arrived.
    pub admission: Option<AdmissionOutcome>,
    /// Counter that claimed the consumption request.
    pub counter: Option<CounterId>,
    /// Counter answer, if one arrived.
    pub consumption: Option<ConsumptionOutcome>,
}

impl ClientReport {
    /// Seats actually granted.
    pub fn seats_granted(&self) -> u32 {
        match self.admission {
            Some(AdmissionOutcome::Granted { seats, .. }) => seats,
            _ => 0,
        }
    }
}

/// Collaborators every client talks to.
#[derive(Clone)]
pub struct ClientDeps {
    /// Turn token.
    pub board: TurnBoard,
    /// Ticket office.
    pub office: TicketOfficeHandle,
    /// Counter request queue.
    pub dispatch: Arc<Dispatch>,
    /// Event bus.
    pub bus: Bus,
}

/// One client actor.
pub struct Client {
    deps: ClientDeps,
    arrival: Duration,
    report: ClientReport,
}

impl Client {
    /// Creates client `id`; it starts waiting after `arrival`.
    pub fn new(id: ClientId, demand: Demand, deps: ClientDeps, arrival: Duration) -> Self {
        Self {
            deps,
            arrival,
            report: ClientReport {
                id,
                demand,
                state: ClientState::AwaitingTurn,
                history: Vec::new(),
                admission: None,
                counter: None,
                consumption: None,
            },
        }
    }

    /// Runs the journey to a terminal state.
    pub async fn run(mut self, token: CancellationToken) -> ClientReport {
        match self.journey(&token).await {
            Some(state) => self.enter(state),
            None => self.enter(ClientState::Aborted),
        }
        self.report
    }

    /// Returns the terminal state, or `None` if the journey was cut short.
    async fn journey(&mut self, token: &CancellationToken) -> Option<ClientState> {
        let id = self.report.id;
        let demand = self.report.demand;

        if !self.arrival.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(self.arrival) => {}
            }
        }

        self.enter(ClientState::AwaitingTurn);
        let permit = tokio::select! {
            _ = token.cancelled() => return None,
            permit = self.deps.board.wait_turn(id) => permit.ok()?,
        };

        self.enter(ClientState::RequestingSeats);
        // On early return the permit is dropped, which releases the turn as aborted.
        let admission = tokio::select! {
            _ = token.cancelled() => return None,
            outcome = self.deps.office.request_seats(id, demand.seats) => outcome.ok()?,
        };
        let end = match admission {
            AdmissionOutcome::Granted { .. } => None,
            AdmissionOutcome::Denied(_) => Some(ClientState::Rejected),
            AdmissionOutcome::Faulted(_) => Some(ClientState::Aborted),
        };
        self.report.admission = Some(admission);

        if let Some(end) = end {
            permit.release(end);
            return Some(end);
        }
        self.enter(ClientState::Admitted);
        permit.release(ClientState::Admitted);

        self.enter(ClientState::RequestingConsumption);
        self.deps.bus.publish(
            Event::new(EventKind::ConsumptionRequested)
                .with_client(id)
                .with_items(i64::from(demand.drinks), i64::from(demand.popcorn)),
        );
        let request = ConsumptionRequest {
            client: id,
            drinks: demand.drinks,
            popcorn: demand.popcorn,
        };
        let ticket = self.deps.dispatch.submit(request).await.ok()?;

        let counter = tokio::select! {
            _ = token.cancelled() => return None,
            counter = ticket.assigned => counter.ok()?,
        };
        self.report.counter = Some(counter);

        self.enter(ClientState::AwaitingService);
        let outcome = tokio::select! {
            _ = token.cancelled() => return None,
            outcome = ticket.outcome => outcome.ok()?,
        };
        let faulted = matches!(outcome, ConsumptionOutcome::Faulted(_));
        self.report.consumption = Some(outcome);

        if faulted { None } else { Some(ClientState::Done) }
    }

    fn enter(&mut self, state: ClientState) {
        self.report.state = state;
        self.report.history.push(state);
        self.deps.bus.publish(
            Event::new(EventKind::ClientStateChanged)
                .with_client(self.report.id)
                .with_state(state),
        );
    }
}
