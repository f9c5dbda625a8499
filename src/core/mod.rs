//! Runtime core: configuration, orchestration and lifecycle.
//!
//! The public API from this module is [`Venue`] (built with [`VenueBuilder`])
//! and its [`Config`].
//!
//! Internal modules:
//! - [`venue`]: spawns every actor, drives the run, handles shutdown;
//! - [`crew`]: named groups of spawned actors, stuck-actor reporting;
//! - [`runner`]: runs one actor with lifecycle events;
//! - [`fault`]: per-request panic containment;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
pub(crate) mod config;
mod crew;
pub(crate) mod fault;
mod runner;
mod shutdown;
mod venue;

pub use builder::VenueBuilder;
pub use config::{Config, CounterConfig, Pacing, RestockPolicy};
pub use venue::{RunReport, Venue};
