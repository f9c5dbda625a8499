use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use boxoffice::{
    AdmissionOutcome, ClientState, Config, ConsumptionOutcome, CounterConfig, Demand, DenialReason,
    EventKind, Journal, Pacing, RestockPolicy, RunReport, RuntimeError, SeededRandom, Subscribe, Venue,
};

fn config(seats: u32, clients: u32, counters: Vec<CounterConfig>) -> Config {
    Config {
        seat_capacity: seats,
        clients,
        counters,
        handle_signals: false,
        ..Config::default()
    }
}

async fn run(cfg: Config, demands: Vec<Demand>) -> (Result<RunReport, RuntimeError>, Arc<Journal>) {
    let journal = Arc::new(Journal::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![journal.clone()];
    let res = Venue::builder(cfg)
        .with_subscribers(subs)
        .with_random(Arc::new(SeededRandom::new(7)))
        .with_demands(demands)
        .build()
        .run()
        .await;
    (res, journal)
}

#[tokio::test]
async fn test_oversized_request_is_denied() {
    let cfg = config(10, 1, vec![CounterConfig::full(10)]);
    let (res, journal) = run(cfg, vec![Demand::new(12, 1, 1)]).await;
    let report = res.unwrap();

    let client = report.client(1).unwrap();
    assert_eq!(client.state, ClientState::Rejected);
    assert_eq!(
        client.admission,
        Some(AdmissionOutcome::Denied(DenialReason::InsufficientSeats {
            requested: 12,
            available: 10
        }))
    );
    assert_eq!(report.seats.available, 10);
    assert_eq!(report.settlements_confirmed, 0);
    assert!(journal.of_kind(EventKind::SettlementEnqueued).await.is_empty());
    assert_eq!(journal.of_kind(EventKind::AdmissionDenied).await.len(), 1);
}

#[tokio::test]
async fn test_second_request_denied_when_pool_runs_short() {
    let cfg = config(10, 2, vec![CounterConfig::full(10)]);
    let (res, _) = run(cfg, vec![Demand::new(6, 1, 1), Demand::new(5, 1, 1)]).await;
    let report = res.unwrap();

    let first = report.client(1).unwrap();
    assert_eq!(first.state, ClientState::Done);
    assert!(matches!(
        first.admission,
        Some(AdmissionOutcome::Granted { seats: 6, remaining: 4, .. })
    ));

    let second = report.client(2).unwrap();
    assert_eq!(second.state, ClientState::Rejected);
    assert!(second.consumption.is_none());

    assert_eq!(report.seats.available, 4);
    assert_eq!(report.seats.granted, 6);
}

#[tokio::test]
async fn test_short_counter_is_replenished_before_serving() {
    let counter = CounterConfig {
        drinks: 2,
        popcorn: 2,
        target: 10,
    };
    let cfg = config(10, 1, vec![counter]);
    let (res, journal) = run(cfg, vec![Demand::new(1, 3, 1)]).await;
    let report = res.unwrap();

    let client = report.client(1).unwrap();
    assert!(matches!(
        client.consumption,
        Some(ConsumptionOutcome::Served { counter: 1, restocked: true, .. })
    ));

    let stock = report.counter(1).unwrap();
    assert_eq!((stock.on_hand.drinks, stock.on_hand.popcorn), (7, 9));
    assert_eq!(stock.restocks, 1);
    assert!(stock.is_balanced());
    assert_eq!(report.restocks_applied, 1);

    let replenished = journal.of_kind(EventKind::Replenished).await;
    assert_eq!(replenished.len(), 1);
    assert_eq!(replenished[0].counter, Some(1));
    assert_eq!(journal.of_kind(EventKind::ReplenishRequested).await.len(), 1);
}

#[tokio::test]
async fn test_busy_counters_split_concurrent_requests() {
    let mut cfg = config(
        10,
        3,
        vec![CounterConfig::full(15), CounterConfig::full(15), CounterConfig::full(15)],
    );
    // Each counter stays busy long enough for the next admission to land.
    cfg.pacing = Pacing {
        counter: Duration::from_millis(300),
        ..Pacing::default()
    };
    let demands = vec![Demand::new(1, 1, 1); 3];
    let (res, _) = run(cfg, demands).await;
    let report = res.unwrap();

    let counters: HashSet<_> = report.clients.iter().filter_map(|c| c.counter).collect();
    assert_eq!(counters.len(), 3, "each request should land on its own counter");
    assert!(report.clients.iter().all(|c| c.state == ClientState::Done));
}

#[tokio::test]
async fn test_turns_are_issued_in_strict_order() {
    let cfg = config(72, 8, Config::default().counters);
    let (res, journal) = run(cfg, Vec::new()).await;
    let report = res.unwrap();
    assert!(report.rounds.completed);

    let issued: Vec<_> = journal
        .of_kind(EventKind::TurnIssued)
        .await
        .iter()
        .filter_map(|e| e.turn)
        .collect();
    assert_eq!(issued, (1..=8).collect::<Vec<_>>());

    for release in journal.of_kind(EventKind::TurnReleased).await {
        assert_eq!(release.turn, release.client);
    }

    let requested: Vec<_> = journal
        .of_kind(EventKind::AdmissionRequested)
        .await
        .iter()
        .filter_map(|e| e.client)
        .collect();
    assert_eq!(requested, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stalled_turn_is_fatal() {
    let mut cfg = config(10, 2, vec![CounterConfig::full(10)]);
    cfg.turn_timeout = Duration::from_millis(50);
    cfg.pacing = Pacing {
        office: Duration::from_millis(500),
        ..Pacing::default()
    };
    let (res, journal) = run(cfg, Vec::new()).await;

    let err = res.unwrap_err();
    assert!(matches!(err, RuntimeError::TurnStalled { turn: 1, .. }), "got {err:?}");
    assert_eq!(err.as_label(), "runtime_turn_stalled");

    let failed = journal.of_kind(EventKind::SchedulerFailed).await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].turn, Some(1));
}

async fn assert_books_balance(policy: RestockPolicy) {
    let mut cfg = config(40, 20, vec![CounterConfig::full(10), CounterConfig::full(12)]);
    cfg.restock = policy;
    let (res, journal) = run(cfg, Vec::new()).await;
    let report = res.unwrap();

    assert_eq!(report.clients.len(), 20);
    assert!(report.clients.iter().all(|c| c.state.is_terminal()));
    assert_eq!(report.seats.available, 40 - report.seats_granted());

    for stock in &report.counters {
        assert!(stock.is_balanced(), "counter {} out of balance", stock.counter);
        if policy == RestockPolicy::AwaitRestock {
            assert!(stock.on_hand.drinks >= 0 && stock.on_hand.popcorn >= 0);
        }
    }

    let admitted = report
        .clients
        .iter()
        .filter(|c| matches!(c.admission, Some(AdmissionOutcome::Granted { .. })))
        .count() as u64;
    let served = report
        .clients
        .iter()
        .filter(|c| matches!(c.consumption, Some(ConsumptionOutcome::Served { .. })))
        .count() as u64;
    assert_eq!(report.settlements_confirmed, admitted + served);

    let positions: Vec<_> = journal
        .of_kind(EventKind::SettlementConfirmed)
        .await
        .iter()
        .filter_map(|e| e.position)
        .collect();
    assert_eq!(positions, (1..=admitted + served).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_accounting_identity_with_await_restock() {
    assert_books_balance(RestockPolicy::AwaitRestock).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accounting_identity_with_optimistic_restock() {
    assert_books_balance(RestockPolicy::Optimistic).await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_start() {
    let cfg = config(10, 1, Vec::new());
    let (res, journal) = run(cfg, Vec::new()).await;

    assert!(matches!(res, Err(RuntimeError::InvalidConfig(_))));
    assert!(journal.is_empty().await);
}
