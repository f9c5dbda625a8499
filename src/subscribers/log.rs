//! # LogWriter: renders events as `tracing` records
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Normal outcomes (denials, replenishment) log at `info`, transient faults at
//! `warn`, fatal scheduler failures at `error`; chatty settlement traffic is `debug`.
//!
//! ## Example output (with the `fmt` layer)
//! ```text
//! INFO boxoffice: turn issued turn=3
//! INFO boxoffice: admission granted client=3 seats=4 seats_left=61
//! INFO boxoffice: admission denied client=9 seats=5 seats_left=2 reason="insufficient seats"
//! INFO boxoffice: replenish requested counter=2 client=11
//! WARN boxoffice: actor fault actor="counter-2" reason="panicked: ..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let actor = e.actor.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let state = e.state.map(|s| s.as_str()).unwrap_or("-");

        match e.kind {
            EventKind::SubscriberPanicked => {
                tracing::warn!(subscriber = actor, info = reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = actor, reason, "subscriber dropped an event");
            }
            EventKind::ActorStarted => tracing::debug!(actor, "actor started"),
            EventKind::ActorStopped => tracing::debug!(actor, "actor stopped"),
            EventKind::ActorFault => {
                tracing::warn!(actor, client = ?e.client, reason, "actor fault");
            }
            EventKind::SchedulerFailed => {
                tracing::error!(turn = ?e.turn, reason, "turn scheduler failed");
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!("all actors stopped within grace"),
            EventKind::GraceExceeded => tracing::error!(stuck = reason, "grace exceeded"),
            EventKind::TurnIssued => tracing::info!(turn = ?e.turn, "turn issued"),
            EventKind::TurnReleased => {
                tracing::info!(turn = ?e.turn, client = ?e.client, state, "turn released");
            }
            EventKind::AdmissionRequested => {
                tracing::info!(client = ?e.client, seats = ?e.seats, "admission requested");
            }
            EventKind::AdmissionGranted => {
                tracing::info!(
                    client = ?e.client,
                    seats = ?e.seats,
                    seats_left = ?e.remaining,
                    "admission granted"
                );
            }
            EventKind::AdmissionDenied => {
                tracing::info!(
                    client = ?e.client,
                    seats = ?e.seats,
                    seats_left = ?e.remaining,
                    reason,
                    "admission denied"
                );
            }
            EventKind::SettlementEnqueued => {
                tracing::debug!(
                    client = ?e.client,
                    payment = ?e.payment,
                    priority = ?e.priority,
                    "settlement enqueued"
                );
            }
            EventKind::SettlementConfirmed => {
                tracing::debug!(
                    client = ?e.client,
                    payment = ?e.payment,
                    priority = ?e.priority,
                    position = ?e.position,
                    "settlement confirmed"
                );
            }
            EventKind::ConsumptionRequested => {
                tracing::info!(
                    client = ?e.client,
                    drinks = ?e.drinks,
                    popcorn = ?e.popcorn,
                    "consumption requested"
                );
            }
            EventKind::ConsumptionClaimed => {
                tracing::info!(client = ?e.client, counter = ?e.counter, "consumption claimed");
            }
            EventKind::ConsumptionServed => {
                tracing::info!(
                    client = ?e.client,
                    counter = ?e.counter,
                    drinks = ?e.drinks,
                    popcorn = ?e.popcorn,
                    drinks_left = ?e.remaining,
                    "consumption served"
                );
            }
            EventKind::ConsumptionDeclined => {
                tracing::info!(client = ?e.client, counter = ?e.counter, reason, "consumption declined");
            }
            EventKind::ReplenishRequested => {
                tracing::info!(counter = ?e.counter, client = ?e.client, "replenish requested");
            }
            EventKind::Replenished => {
                tracing::info!(
                    counter = ?e.counter,
                    drinks = ?e.drinks,
                    popcorn = ?e.popcorn,
                    "counter replenished"
                );
            }
            EventKind::ClientStateChanged => {
                tracing::debug!(client = ?e.client, state, "client state changed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
