//! # Event subscribers for the venue runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Actors ── publish(Event) ──► Bus ──► venue listener ──► SubscriberSet
//!                                                            │
//!                                              ┌─────────────┼─────────────┐
//!                                              ▼             ▼             ▼
//!                                          LogWriter      Journal       Custom
//! ```
//!
//! ## Built-in subscribers
//! - [`LogWriter`]: renders events as structured `tracing` records.
//! - [`Journal`]: keeps an in-memory append-only copy of every event.

mod journal;
mod log;
mod set;
mod subscribe;

pub use journal::Journal;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
