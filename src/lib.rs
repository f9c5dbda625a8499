//! # boxoffice
//!
//! **Boxoffice** runs a cinema's admission and concession pipeline as a set of
//! cooperating async actors on tokio.
//!
//! A bounded pool of seats, several parallel concession counters with their
//! own replenishable stock, and one settlement authority that serializes and
//! prioritizes every payment. The interesting part is the coordination: no
//! resource is over-allocated, every request gets exactly one outcome, and
//! admission follows strict turn order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                       ┌────────────────┐  turn token (watch)
//!                       │ TurnScheduler  │───────────────────────────┐
//!                       └───────▲────────┘                           ▼
//!                               │ release                  ┌──────────────────┐
//!                               └──────────────────────────│  Client 1..M     │
//!                                                          └──┬────────────┬──┘
//!                                     request_seats (oneshot) │            │ submit (oneshot)
//!                                                             ▼            ▼
//!                                              ┌──────────────┐    ┌────────────┐ claim ┌─────────────┐
//!                                              │ TicketOffice │    │  Dispatch  │◄──────│ Counter 1..N│
//!                                              │  (SeatPool)  │    └────────────┘       │ (Inventory) │
//!                                              └──────┬───────┘                         └──┬───────┬──┘
//!                                                     │ settle                      settle │       │ restock
//!                                                     ▼                                    ▼       ▼
//!                                        ┌──────────────────────────────────────┐  ┌─────────────────┐
//!                                        │ SettlementQueue ──► SettlementWorker │  │ ReplenishWorker │
//!                                        │ (class, then arrival)                │  └─────────────────┘
//!                                        └──────────────────────────────────────┘
//!
//! every actor ──publish──► Bus (broadcast) ──► listener ──► SubscriberSet ──► LogWriter, Journal, ...
//! ```
//!
//! ### Client journey
//! ```text
//! AwaitingTurn ─► RequestingSeats ─┬─► Rejected
//!                                  └─► Admitted ─► RequestingConsumption ─► AwaitingService ─► Done
//! (any wait) ─► Aborted
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types                                  |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------------|
//! | **Admission**     | Strict turn order, one admission in flight, seat pool never negative | [`TurnScheduler`], [`TicketOffice`]      |
//! | **Concessions**   | Exactly-once counter claim, per-counter stock, restock feedback    | [`Counter`], [`Dispatch`], [`Inventory`]   |
//! | **Settlement**    | Single worker, priority class then FIFO, weighted lottery          | [`SettlementQueue`], [`SettlementWorker`]  |
//! | **Orchestration** | Spawn, drive, cooperative shutdown with grace                      | [`Venue`], [`Config`], [`RunReport`]       |
//! | **Observability** | Broadcast events, isolated subscribers, tracing output             | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**        | Fatal runtime errors vs typed per-request outcomes                 | [`RuntimeError`], [`ServiceError`]         |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use boxoffice::{Config, Journal, LogWriter, Subscribe, Venue};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.clients = 10;
//!
//!     let journal = Arc::new(Journal::new());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), journal.clone()];
//!
//!     let report = Venue::builder(cfg).with_subscribers(subs).build().run().await?;
//!     println!("seats left: {}", report.seats.available);
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod client;
pub mod concessions;
mod core;
mod error;
pub mod events;
pub mod random;
pub mod settlement;
mod subscribers;

// ---- Public re-exports ----

pub use admission::{AdmissionOutcome, DenialReason, SeatSnapshot, TicketOffice, TurnScheduler};
pub use client::{ClientId, ClientReport, ClientState, Demand};
pub use concessions::{ConsumptionOutcome, Counter, CounterId, DeclineReason, Dispatch, Inventory, InventorySnapshot};
pub use core::{Config, CounterConfig, Pacing, RestockPolicy, RunReport, Venue, VenueBuilder};
pub use error::{ConfigError, RuntimeError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use settlement::{LotteryWeights, PaymentKind, PriorityClass, SettlementQueue, SettlementWorker};
pub use subscribers::{Journal, LogWriter, Subscribe, SubscriberSet};
