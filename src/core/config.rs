//! # Venue configuration.
//!
//! Provides [`Config`], read once before any actor starts and immutable afterwards.
//!
//! ## Sentinel values
//! - `turn_timeout = 0s` → a round may stay unreleased forever
//! - `grace = 0s` → no wait on shutdown, report stuck actors immediately
//!
//! ## Environment
//! [`Config::from_env`] overlays these variables on the defaults:
//!
//! | variable                            | field                            |
//! |-------------------------------------|----------------------------------|
//! | `BOXOFFICE_SEATS`                   | `seat_capacity`                  |
//! | `BOXOFFICE_CLIENTS`                 | `clients`                        |
//! | `BOXOFFICE_MAX_SEATS`               | `max_seats_per_request`          |
//! | `BOXOFFICE_MAX_ITEMS`               | `max_items_per_request`          |
//! | `BOXOFFICE_SEATS_FAST_LANE`         | `lottery.seats_fast_lane`        |
//! | `BOXOFFICE_CONCESSIONS_FAST_LANE`   | `lottery.concessions_fast_lane`  |
//! | `BOXOFFICE_RESTOCK`                 | `restock` (`await`/`optimistic`) |
//! | `BOXOFFICE_TURN_TIMEOUT_MS`         | `turn_timeout`                   |
//! | `BOXOFFICE_GRACE_MS`                | `grace`                          |

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::settlement::LotteryWeights;

/// How a counter serves a request its stock cannot cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestockPolicy {
    /// Wait for the restock to land, then deduct. Stock never goes negative.
    #[default]
    AwaitRestock,
    /// Deduct at once and let the restock land later. Stock may dip below zero.
    Optimistic,
}

impl FromStr for RestockPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "await" | "await_restock" | "strict" => Ok(RestockPolicy::AwaitRestock),
            "optimistic" => Ok(RestockPolicy::Optimistic),
            _ => Err(()),
        }
    }
}

/// Opening stock and replenish target of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterConfig {
    /// Opening drinks.
    pub drinks: u32,
    /// Opening popcorn.
    pub popcorn: u32,
    /// Level a restock tops both goods up to.
    pub target: u32,
}

impl CounterConfig {
    /// A counter that opens full: both goods at `target`.
    pub fn full(target: u32) -> Self {
        Self {
            drinks: target,
            popcorn: target,
            target,
        }
    }
}

/// Artificial per-actor delays.
///
/// All zero by default; [`Pacing::theatrical`] slows the run down to a
/// human-watchable cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    /// Spent by the ticket office on each admission.
    pub office: Duration,
    /// Spent by the settlement worker on each confirmation.
    pub settlement: Duration,
    /// Spent by a counter on each request.
    pub counter: Duration,
    /// Spent by the replenish worker on each restock.
    pub replenish: Duration,
    /// Delay between consecutive client arrivals.
    pub client_arrival: Duration,
}

impl Pacing {
    /// Demo cadence.
    pub fn theatrical() -> Self {
        Self {
            office: Duration::from_millis(500),
            settlement: Duration::from_millis(400),
            counter: Duration::from_millis(300),
            replenish: Duration::from_millis(300),
            client_arrival: Duration::from_millis(100),
        }
    }
}

/// Venue configuration.
///
/// ## Field semantics
/// - request sizes are drawn in `[1, limit-1]`, so limits must be at least 2
/// - every counter's `target` must cover the largest possible request
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Seats in the shared pool.
    pub seat_capacity: u32,

    /// One entry per counter; ids are assigned 1..=N in order.
    pub counters: Vec<CounterConfig>,

    /// Number of clients (and admission rounds).
    pub clients: u32,

    /// Exclusive upper bound for drawn seat requests.
    pub max_seats_per_request: u32,

    /// Exclusive upper bound for drawn drink and popcorn requests.
    pub max_items_per_request: u32,

    /// Settlement priority lottery.
    pub lottery: LotteryWeights,

    /// Counter behavior on short stock.
    pub restock: RestockPolicy,

    /// Longest a round may stay unreleased before the run fails.
    ///
    /// `Duration::ZERO` = unbounded.
    pub turn_timeout: Duration,

    /// Maximum time to wait for actors to stop after cancellation.
    pub grace: Duration,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Listen for OS termination signals while running.
    pub handle_signals: bool,

    /// Artificial delays.
    pub pacing: Pacing,
}

impl Config {
    /// Returns the turn timeout as an `Option`.
    #[inline]
    pub fn turn_timeout(&self) -> Option<Duration> {
        if self.turn_timeout.is_zero() {
            None
        } else {
            Some(self.turn_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Largest drink or popcorn quantity a drawn request can ask for.
    #[inline]
    pub fn largest_item_request(&self) -> u32 {
        self.max_items_per_request.saturating_sub(1)
    }

    /// Checks the configuration before startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.counters.is_empty() {
            return Err(ConfigError::NoCounters);
        }
        for (name, value) in [
            ("max_seats_per_request", self.max_seats_per_request),
            ("max_items_per_request", self.max_items_per_request),
        ] {
            if value < 2 {
                return Err(ConfigError::RequestBoundTooSmall { name, value });
            }
        }
        for (name, value) in [
            ("seats_fast_lane", self.lottery.seats_fast_lane),
            ("concessions_fast_lane", self.lottery.concessions_fast_lane),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange { name, value });
            }
        }
        let largest = self.largest_item_request();
        for (idx, counter) in self.counters.iter().enumerate() {
            if counter.target < largest {
                return Err(ConfigError::TargetBelowRequest {
                    counter: idx as u32 + 1,
                    target: counter.target,
                    largest,
                });
            }
        }
        Ok(())
    }

    /// Defaults overlaid with `BOXOFFICE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup` (same keys as [`Config::from_env`]).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = parse(&lookup, "BOXOFFICE_SEATS")? {
            cfg.seat_capacity = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_CLIENTS")? {
            cfg.clients = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_MAX_SEATS")? {
            cfg.max_seats_per_request = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_MAX_ITEMS")? {
            cfg.max_items_per_request = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_SEATS_FAST_LANE")? {
            cfg.lottery.seats_fast_lane = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_CONCESSIONS_FAST_LANE")? {
            cfg.lottery.concessions_fast_lane = v;
        }
        if let Some(v) = parse(&lookup, "BOXOFFICE_RESTOCK")? {
            cfg.restock = v;
        }
        if let Some(ms) = parse(&lookup, "BOXOFFICE_TURN_TIMEOUT_MS")? {
            cfg.turn_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, "BOXOFFICE_GRACE_MS")? {
            cfg.grace = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - 72 seats, 30 clients
    /// - three counters opening full at 15, 12 and 10
    /// - seat requests in `[1, 5]`, item requests in `[1, 9]`
    /// - lottery 0.8 / 0.2, `AwaitRestock`
    /// - no turn timeout, `grace = 5s`, `bus_capacity = 1024`
    /// - signals handled, no pacing
    fn default() -> Self {
        Self {
            seat_capacity: 72,
            counters: vec![
                CounterConfig::full(15),
                CounterConfig::full(12),
                CounterConfig::full(10),
            ],
            clients: 30,
            max_seats_per_request: 6,
            max_items_per_request: 10,
            lottery: LotteryWeights::default(),
            restock: RestockPolicy::default(),
            turn_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            handle_signals: true,
            pacing: Pacing::default(),
        }
    }
}
