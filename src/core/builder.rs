//! # VenueBuilder: assembles a [`Venue`] from its config and collaborators.
//!
//! Subscribers, the random source and fixed per-client demands are optional;
//! without a random source the thread-local generator is used.

use std::sync::Arc;

use crate::client::Demand;
use crate::core::config::Config;
use crate::core::venue::Venue;
use crate::random::{RandomSource, ThreadRandom};
use crate::subscribers::Subscribe;

/// Builder for a [`Venue`].
pub struct VenueBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    random: Option<Arc<dyn RandomSource>>,
    demands: Vec<Demand>,
}

impl VenueBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            random: None,
            demands: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Each receives every event through its own bounded queue and worker.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the random source for demands and the settlement lottery.
    ///
    /// Defaults to [`ThreadRandom`].
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Fixes the demand of clients `1..=demands.len()`, in order.
    ///
    /// Clients beyond the list draw their demand from the random source.
    pub fn with_demands(mut self, demands: Vec<Demand>) -> Self {
        self.demands = demands;
        self
    }

    /// Builds the venue. Nothing runs until [`Venue::run`].
    pub fn build(self) -> Venue {
        let random = self.random.unwrap_or_else(|| Arc::new(ThreadRandom));
        Venue::new_internal(self.cfg, self.subscribers, random, self.demands)
    }
}
