//! # Crew: a named group of spawned actors.
//!
//! Owns the [`JoinSet`] of one group of actors (services, clients, the
//! scheduler) and remembers which task id belongs to which actor, so a
//! shutdown that overruns its grace period can name the actors still running.
//! Finished actors leave their [`ActorExit`] behind for the final report.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};

use crate::admission::{RoundSummary, SeatSnapshot};
use crate::client::ClientReport;
use crate::concessions::InventorySnapshot;
use crate::core::runner::run_actor;
use crate::error::{RuntimeError, ServiceError};
use crate::events::Bus;

/// What an actor left behind when it stopped.
#[derive(Debug)]
pub enum ActorExit {
    /// Turn scheduler result.
    Scheduler(Result<RoundSummary, RuntimeError>),
    /// Client journey.
    Client(ClientReport),
    /// Final seat pool.
    Office(SeatSnapshot),
    /// Final inventory of one counter.
    Counter(InventorySnapshot),
    /// Confirmed payments.
    Settlement(u64),
    /// Restocks applied.
    Replenish(u64),
    /// The actor panicked out of its loop.
    Faulted {
        /// Actor name.
        actor: Arc<str>,
        /// Contained panic.
        error: ServiceError,
    },
}

/// Group of actors joined together.
pub struct Crew {
    set: JoinSet<ActorExit>,
    names: HashMap<Id, Arc<str>>,
    finished: Vec<ActorExit>,
    bus: Bus,
}

impl Crew {
    /// Creates an empty crew publishing lifecycle events to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            set: JoinSet::new(),
            names: HashMap::new(),
            finished: Vec::new(),
            bus,
        }
    }

    /// Spawns `actor` as `name`; its output is mapped to an [`ActorExit`] by `exit`.
    pub fn spawn<T, F>(&mut self, name: impl Into<Arc<str>>, actor: F, exit: fn(T) -> ActorExit)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let bus = self.bus.clone();
        let task_name = Arc::clone(&name);
        let handle = self.set.spawn(async move {
            match run_actor(&task_name, &bus, actor).await {
                Ok(value) => exit(value),
                Err(error) => ActorExit::Faulted {
                    actor: task_name,
                    error,
                },
            }
        });
        self.names.insert(handle.id(), name);
    }

    /// Waits for every actor in the crew to stop.
    pub async fn join_all(&mut self) {
        while let Some(res) = self.set.join_next_with_id().await {
            match res {
                Ok((id, exit)) => {
                    self.names.remove(&id);
                    self.finished.push(exit);
                }
                Err(err) => {
                    // Aborted from outside; nothing to report.
                    self.names.remove(&err.id());
                }
            }
        }
    }

    /// Names of actors that have not stopped yet.
    pub fn stuck(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.values().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    /// Number of actors still running.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if every actor has stopped.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exits collected so far.
    pub fn finished(&self) -> &[ActorExit] {
        &self.finished
    }

    /// Takes the exits collected so far.
    pub fn take_finished(&mut self) -> Vec<ActorExit> {
        std::mem::take(&mut self.finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_exits() {
        let mut crew = Crew::new(Bus::new(16));
        crew.spawn("settlement", async { 4u64 }, ActorExit::Settlement);
        crew.spawn("replenish", async { 1u64 }, ActorExit::Replenish);
        assert_eq!(crew.len(), 2);

        crew.join_all().await;
        assert!(crew.is_empty());

        let mut totals: Vec<u64> = crew
            .take_finished()
            .into_iter()
            .map(|exit| match exit {
                ActorExit::Settlement(n) | ActorExit::Replenish(n) => n,
                other => panic!("unexpected exit {other:?}"),
            })
            .collect();
        totals.sort();
        assert_eq!(totals, vec![1, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_names_running_actors() {
        let mut crew = Crew::new(Bus::new(16));
        crew.spawn("settlement", async { 0u64 }, ActorExit::Settlement);
        crew.spawn(
            "counter-2",
            async {
                std::future::pending::<()>().await;
                0u64
            },
            ActorExit::Replenish,
        );

        let timed = tokio::time::timeout(Duration::from_millis(10), crew.join_all()).await;
        assert!(timed.is_err());
        assert_eq!(crew.stuck(), vec!["counter-2".to_string()]);
    }

    #[tokio::test]
    async fn test_panic_is_reported_as_fault() {
        let mut crew = Crew::new(Bus::new(16));
        crew.spawn(
            "ticket-office",
            async {
                let broken = true;
                if broken {
                    panic!("pool corrupted");
                }
                0u64
            },
            ActorExit::Settlement,
        );
        crew.join_all().await;

        let exits = crew.take_finished();
        assert!(matches!(
            &exits[..],
            [ActorExit::Faulted { actor, .. }] if &**actor == "ticket-office"
        ));
    }
}
