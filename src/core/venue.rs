//! # Venue: wires every actor together and drives one run.
//!
//! ## Architecture
//! ```text
//! Venue::run()
//!   ├─► cfg.validate()
//!   ├─► listener: Bus ──► SubscriberSet (LogWriter, Journal, ...)
//!   ├─► services crew: SettlementWorker, ReplenishWorker, TicketOffice, Counter 1..N
//!   ├─► clients crew:  Client 1..M (arrivals staggered by pacing)
//!   ├─► admission crew: TurnScheduler (turns 1..=M)
//!   │
//!   └─► select!
//!         ├─ admission finished ─► scheduler Ok?
//!         │     ├─ yes: wait clients ─► cancel services ─► join within grace ─► RunReport
//!         │     └─ no:  publish SchedulerFailed ─► cancel all ─► Err(RuntimeError)
//!         └─ OS signal ─► publish ShutdownRequested ─► cancel all
//!                         └─► join within grace (GraceExceeded names stuck actors)
//! ```
//!
//! ## Rules
//! - Services get their own child token, so they outlive the clients they serve.
//! - A scheduler failure is fatal; the run never continues past it.
//! - Events published before the listener stops are all delivered to subscribers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::{RoundSummary, SeatSnapshot, TicketOffice, TurnScheduler};
use crate::client::{Client, ClientDeps, ClientReport, ClientState, Demand};
use crate::concessions::{Counter, CounterDeps, CounterId, Dispatch, Inventory, InventorySnapshot, ReplenishWorker};
use crate::core::builder::VenueBuilder;
use crate::core::config::Config;
use crate::core::crew::{ActorExit, Crew};
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::random::RandomSource;
use crate::settlement::{PriorityLottery, SettlementDesk, SettlementQueue, SettlementWorker};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One report per client, ordered by id.
    pub clients: Vec<ClientReport>,
    /// Final seat pool.
    pub seats: SeatSnapshot,
    /// Final inventory per counter, ordered by id.
    pub counters: Vec<InventorySnapshot>,
    /// Payments confirmed by the settlement worker.
    pub settlements_confirmed: u64,
    /// Restocks applied by the replenish worker.
    pub restocks_applied: u64,
    /// Turns issued and released.
    pub rounds: RoundSummary,
    /// True if the run was stopped by a signal.
    pub interrupted: bool,
}

impl RunReport {
    /// Clients that ended in `state`.
    pub fn count(&self, state: ClientState) -> usize {
        self.clients.iter().filter(|c| c.state == state).count()
    }

    /// Seats granted across all clients.
    pub fn seats_granted(&self) -> u32 {
        self.clients.iter().map(ClientReport::seats_granted).sum()
    }

    /// Report of client `id`.
    pub fn client(&self, id: u32) -> Option<&ClientReport> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// Final inventory of counter `id`.
    pub fn counter(&self, id: CounterId) -> Option<&InventorySnapshot> {
        self.counters.iter().find(|c| c.counter == id)
    }

    fn absorb(&mut self, exits: Vec<ActorExit>) {
        for exit in exits {
            match exit {
                ActorExit::Scheduler(Ok(rounds)) => self.rounds = rounds,
                ActorExit::Scheduler(Err(_)) => {}
                ActorExit::Client(report) => self.clients.push(report),
                ActorExit::Office(seats) => self.seats = seats,
                ActorExit::Counter(inventory) => self.counters.push(inventory),
                ActorExit::Settlement(n) => self.settlements_confirmed = n,
                ActorExit::Replenish(n) => self.restocks_applied = n,
                ActorExit::Faulted { actor, error } => {
                    tracing::warn!(actor = %actor, error = %error, "actor left no report");
                }
            }
        }
        self.clients.sort_by_key(|c| c.id);
        self.counters.sort_by_key(|c| c.counter);
    }
}

/// A configured venue, ready to run once.
pub struct Venue {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    random: Arc<dyn RandomSource>,
    demands: Vec<Demand>,
}

struct Crews {
    admission: Crew,
    clients: Crew,
    services: Crew,
}

impl Venue {
    /// Starts building a venue.
    pub fn builder(cfg: Config) -> VenueBuilder {
        VenueBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
        random: Arc<dyn RandomSource>,
        demands: Vec<Demand>,
    ) -> Self {
        Self {
            cfg,
            subscribers,
            random,
            demands,
        }
    }

    /// Configuration the venue runs with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs every admission round and serves every admitted client.
    ///
    /// Returns the final report, or a fatal [`RuntimeError`]: invalid
    /// configuration, a stalled or failed scheduler, or a shutdown that
    /// overran the grace period.
    pub async fn run(self) -> Result<RunReport, RuntimeError> {
        let Venue {
            cfg,
            subscribers,
            random,
            demands,
        } = self;
        cfg.validate()?;

        let bus = Bus::new(cfg.bus_capacity_clamped());
        let stop_listener = CancellationToken::new();
        let listener = spawn_listener(&bus, SubscriberSet::new(subscribers, bus.clone()), stop_listener.clone());
        tracing::debug!(
            seats = cfg.seat_capacity,
            counters = cfg.counters.len(),
            clients = cfg.clients,
            "venue opening"
        );

        let runtime = CancellationToken::new();
        let mut crews = spawn_actors(&cfg, &bus, &random, &demands, &runtime);

        let interrupted = tokio::select! {
            _ = shutdown::shutdown_requested(cfg.handle_signals) => true,
            _ = admission_phase(&mut crews) => false,
        };

        let res = if interrupted {
            bus.publish(Event::new(EventKind::ShutdownRequested));
            runtime.cancel();
            wait_all_with_grace(&bus, cfg.grace, &mut crews).await
        } else {
            finish(&bus, &cfg, &runtime, &mut crews).await
        };

        let res = res.map(|()| {
            let mut report = RunReport {
                interrupted,
                ..RunReport::default()
            };
            report.absorb(crews.admission.take_finished());
            report.absorb(crews.clients.take_finished());
            report.absorb(crews.services.take_finished());
            report
        });

        close_listener(stop_listener, listener).await;
        res
    }
}

/// Spawns every actor. Services first, so nothing a client calls is missing.
fn spawn_actors(
    cfg: &Config,
    bus: &Bus,
    random: &Arc<dyn RandomSource>,
    demands: &[Demand],
    runtime: &CancellationToken,
) -> Crews {
    let services_token = runtime.child_token();
    let mut services = Crew::new(bus.clone());
    let mut clients = Crew::new(bus.clone());
    let mut admission = Crew::new(bus.clone());

    let queue = Arc::new(SettlementQueue::new());
    let lottery = PriorityLottery::new(cfg.lottery, Arc::clone(random));
    let desk = SettlementDesk::new(queue.clone(), lottery, bus.clone());

    let settlement = SettlementWorker::new(queue, bus.clone(), cfg.pacing.settlement);
    services.spawn(
        settlement.name(),
        settlement.run(services_token.child_token()),
        ActorExit::Settlement,
    );

    let (replenish_worker, replenish) = ReplenishWorker::new(bus.clone(), cfg.pacing.replenish);
    services.spawn(
        replenish_worker.name(),
        replenish_worker.run(services_token.child_token()),
        ActorExit::Replenish,
    );

    let (office, office_handle) = TicketOffice::new(cfg.seat_capacity, desk.clone(), bus.clone(), cfg.pacing.office);
    services.spawn(office.name(), office.run(services_token.child_token()), ActorExit::Office);

    let dispatch = Arc::new(Dispatch::new());
    let counter_deps = CounterDeps {
        dispatch: dispatch.clone(),
        replenish,
        settlement: desk,
        bus: bus.clone(),
    };
    for (idx, stock) in cfg.counters.iter().enumerate() {
        let id = idx as CounterId + 1;
        let inventory = Inventory::new(id, stock.drinks, stock.popcorn, stock.target).shared();
        let counter = Counter::new(id, inventory, counter_deps.clone(), cfg.restock, cfg.pacing.counter);
        let name = counter.name().to_string();
        services.spawn(name, counter.run(services_token.child_token()), ActorExit::Counter);
    }

    let scheduler = TurnScheduler::new(bus.clone(), cfg.turn_timeout());
    let client_deps = ClientDeps {
        board: scheduler.board(),
        office: office_handle,
        dispatch,
        bus: bus.clone(),
    };
    for id in 1..=cfg.clients {
        let demand = demands.get(id as usize - 1).copied().unwrap_or_else(|| {
            Demand::draw(&**random, cfg.max_seats_per_request, cfg.max_items_per_request)
        });
        let arrival = cfg.pacing.client_arrival * (id - 1);
        let client = Client::new(id, demand, client_deps.clone(), arrival);
        clients.spawn(format!("client-{id}"), client.run(runtime.child_token()), ActorExit::Client);
    }
    // Only clients may hold the turn board from here on.
    drop(client_deps);

    admission.spawn(
        scheduler.name(),
        scheduler.run(cfg.clients, runtime.child_token()),
        ActorExit::Scheduler,
    );

    Crews {
        admission,
        clients,
        services,
    }
}

/// Waits for the scheduler and, if it succeeded, for every client.
async fn admission_phase(crews: &mut Crews) {
    crews.admission.join_all().await;
    let scheduler_ok = crews
        .admission
        .finished()
        .iter()
        .all(|exit| matches!(exit, ActorExit::Scheduler(Ok(_))));
    if scheduler_ok {
        crews.clients.join_all().await;
    }
}

/// Ends a run whose admission phase completed on its own.
async fn finish(bus: &Bus, cfg: &Config, runtime: &CancellationToken, crews: &mut Crews) -> Result<(), RuntimeError> {
    let failure = crews.admission.finished().iter().find_map(|exit| match exit {
        ActorExit::Scheduler(Ok(_)) => None,
        ActorExit::Scheduler(Err(e)) => Some((e.turn(), e.to_string())),
        ActorExit::Faulted { error, .. } => Some((None, error.to_string())),
        other => Some((None, format!("unexpected scheduler exit {other:?}"))),
    });

    let Some((turn, reason)) = failure else {
        runtime.cancel();
        return wait_all_with_grace(bus, cfg.grace, crews).await;
    };

    let mut failed = Event::new(EventKind::SchedulerFailed).with_reason(reason.clone());
    if let Some(turn) = turn {
        failed = failed.with_turn(turn);
    }
    bus.publish(failed);
    runtime.cancel();
    if let Err(e) = wait_all_with_grace(bus, cfg.grace, crews).await {
        tracing::error!(error = %e, "shutdown after scheduler failure overran grace");
    }

    let err = match crews.admission.take_finished().into_iter().next() {
        Some(ActorExit::Scheduler(Err(e))) => e,
        _ => RuntimeError::SchedulerPanicked { info: reason },
    };
    Err(err)
}

/// Joins every crew within `grace`.
///
/// Publishes [`EventKind::AllStoppedWithin`] on success, or
/// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
/// with the names of the actors still running.
async fn wait_all_with_grace(bus: &Bus, grace: Duration, crews: &mut Crews) -> Result<(), RuntimeError> {
    let done = async {
        crews.admission.join_all().await;
        crews.clients.join_all().await;
        crews.services.join_all().await;
    };

    match tokio::time::timeout(grace, done).await {
        Ok(()) => {
            bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        }
        Err(_) => {
            let mut stuck = crews.admission.stuck();
            stuck.extend(crews.clients.stuck());
            stuck.extend(crews.services.stuck());
            bus.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

/// Forwards bus events to the subscriber set until stopped, then drains what is left.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, stop: CancellationToken) -> JoinHandle<SubscriberSet> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        subs
    })
}

async fn close_listener(stop: CancellationToken, listener: JoinHandle<SubscriberSet>) {
    stop.cancel();
    if let Ok(subs) = listener.await {
        subs.shutdown().await;
    }
}
