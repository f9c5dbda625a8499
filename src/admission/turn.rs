//! # TurnScheduler: strict, one-at-a-time admission order.
//!
//! The scheduler publishes turn values `1..=rounds` through a `watch` channel.
//! Every client waits on the [`TurnBoard`] until the published value equals its
//! own id, then holds a [`TurnPermit`] until its admission outcome is known.
//! The scheduler does not issue the next turn until that permit is released.
//!
//! ```text
//! TurnScheduler                         Client k
//!   turn := k  ──(watch, wakes all)──►  wait_for(turn == k) ─► TurnPermit
//!   wait release ◄──────(mpsc)───────  permit.release(Admitted | Rejected)
//!   turn := k+1 ...                    (dropping the permit releases as Aborted)
//! ```
//!
//! ## Rules
//! - The turn value only increases; each value is issued exactly once.
//! - A waiting client re-checks its predicate on every change, so a wakeup
//!   cannot be missed.
//! - A permit always releases its turn, even if the client task fails.
//! - A round that is never released is fatal: the scheduler returns
//!   [`RuntimeError::TurnStalled`] instead of skipping it.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientId, ClientState};
use crate::error::{RuntimeError, ServiceError};
use crate::events::{Bus, Event, EventKind};

const NAME: &str = "turn-scheduler";

/// A client's notice that it no longer needs the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRelease {
    /// Releasing client.
    pub client: ClientId,
    /// Client state when it released (admitted, rejected or aborted).
    pub outcome: ClientState,
}

/// Client-side view of the turn token.
#[derive(Clone)]
pub struct TurnBoard {
    turn: watch::Receiver<u32>,
    releases: mpsc::UnboundedSender<TurnRelease>,
}

impl TurnBoard {
    /// Waits until the published turn equals `client`.
    ///
    /// Fails with [`ServiceError::Closed`] if the scheduler is gone.
    pub async fn wait_turn(&self, client: ClientId) -> Result<TurnPermit, ServiceError> {
        let mut turn = self.turn.clone();
        turn.wait_for(|current| *current == client)
            .await
            .map_err(|_| ServiceError::closed(NAME))?;

        Ok(TurnPermit {
            client,
            releases: self.releases.clone(),
            released: false,
        })
    }

    /// The turn value currently published (0 before the first round).
    pub fn current(&self) -> u32 {
        *self.turn.borrow()
    }
}

/// Exclusive hold on the admission turn.
///
/// Dropped without [`release`](TurnPermit::release), it releases as `Aborted`.
pub struct TurnPermit {
    client: ClientId,
    releases: mpsc::UnboundedSender<TurnRelease>,
    released: bool,
}

impl TurnPermit {
    /// Client holding the turn.
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Frees the turn so the scheduler can advance.
    pub fn release(mut self, outcome: ClientState) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: ClientState) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.releases.send(TurnRelease {
            client: self.client,
            outcome,
        });
    }
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        self.send(ClientState::Aborted);
    }
}

/// What the scheduler did before it returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Turns issued, in order.
    pub issued: Vec<u32>,
    /// Releases received, in order.
    pub released: Vec<TurnRelease>,
    /// True if every round was issued and released.
    pub completed: bool,
}

/// Issues admission turns one at a time.
pub struct TurnScheduler {
    turn: watch::Sender<u32>,
    releases_tx: mpsc::UnboundedSender<TurnRelease>,
    releases_rx: mpsc::UnboundedReceiver<TurnRelease>,
    bus: Bus,
    timeout: Option<Duration>,
}

impl TurnScheduler {
    /// Creates a scheduler; `timeout` bounds how long one round may stay unreleased.
    pub fn new(bus: Bus, timeout: Option<Duration>) -> Self {
        let (turn, _) = watch::channel(0);
        let (releases_tx, releases_rx) = mpsc::unbounded_channel();
        Self {
            turn,
            releases_tx,
            releases_rx,
            bus,
            timeout,
        }
    }

    /// Actor name used in events.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Returns a board for clients to wait on.
    pub fn board(&self) -> TurnBoard {
        TurnBoard {
            turn: self.turn.subscribe(),
            releases: self.releases_tx.clone(),
        }
    }

    /// Runs turns `1..=rounds`.
    ///
    /// Returns early with `completed = false` on cancellation. Any stalled or
    /// inconsistent round is returned as a fatal [`RuntimeError`]; the round is
    /// never retried.
    pub async fn run(self, rounds: u32, token: CancellationToken) -> Result<RoundSummary, RuntimeError> {
        let TurnScheduler {
            turn: turn_tx,
            releases_tx,
            mut releases_rx,
            bus,
            timeout,
        } = self;
        // Only boards and permits keep the release channel open from here on.
        drop(releases_tx);

        let mut summary = RoundSummary::default();
        for turn in 1..=rounds {
            turn_tx.send_replace(turn);
            summary.issued.push(turn);
            bus.publish(Event::new(EventKind::TurnIssued).with_actor(NAME).with_turn(turn));

            let started = Instant::now();
            let release = tokio::select! {
                _ = token.cancelled() => return Ok(summary),
                next = next_release(&mut releases_rx, timeout) => next,
            };
            let release = release.ok_or(RuntimeError::TurnStalled {
                turn,
                waited: started.elapsed(),
            })?;

            if release.client != turn {
                return Err(RuntimeError::TurnMismatch {
                    expected: turn,
                    released_by: release.client,
                });
            }

            bus.publish(
                Event::new(EventKind::TurnReleased)
                    .with_actor(NAME)
                    .with_turn(turn)
                    .with_client(release.client)
                    .with_state(release.outcome),
            );
            summary.released.push(release);
        }

        summary.completed = true;
        Ok(summary)
    }
}

/// Receives the next release, giving up after `timeout` (if any) or when every
/// sender is gone.
async fn next_release(
    rx: &mut mpsc::UnboundedReceiver<TurnRelease>,
    timeout: Option<Duration>,
) -> Option<TurnRelease> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, rx.recv()).await.ok().flatten(),
        None => rx.recv().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_turns_follow_client_ids() {
        let scheduler = TurnScheduler::new(Bus::new(64), None);
        let board = scheduler.board();
        let seen = Arc::new(Mutex::new(Vec::new()));

        // Spawn in reverse so spawn order cannot explain the result.
        let mut clients = Vec::new();
        for id in (1..=5).rev() {
            let board = board.clone();
            let seen = seen.clone();
            clients.push(tokio::spawn(async move {
                let permit = board.wait_turn(id).await.unwrap();
                seen.lock().await.push(board.current());
                permit.release(ClientState::Admitted);
            }));
        }
        drop(board);

        let summary = scheduler.run(5, CancellationToken::new()).await.unwrap();
        for c in clients {
            c.await.unwrap();
        }

        assert!(summary.completed);
        assert_eq!(summary.issued, vec![1, 2, 3, 4, 5]);
        assert_eq!(*seen.lock().await, vec![1, 2, 3, 4, 5]);
        let releasers: Vec<_> = summary.released.iter().map(|r| r.client).collect();
        assert_eq!(releasers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_dropped_permit_releases_as_aborted() {
        let scheduler = TurnScheduler::new(Bus::new(8), None);
        let board = scheduler.board();

        let client = tokio::spawn(async move {
            let _permit = board.wait_turn(1).await.unwrap();
            panic!("client crashed while holding the turn");
        });

        let summary = scheduler.run(1, CancellationToken::new()).await.unwrap();
        assert!(client.await.is_err());
        assert_eq!(
            summary.released,
            vec![TurnRelease {
                client: 1,
                outcome: ClientState::Aborted
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreleased_round_is_fatal() {
        let scheduler = TurnScheduler::new(Bus::new(8), Some(Duration::from_millis(50)));
        let _board = scheduler.board();

        let err = scheduler.run(3, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::TurnStalled { turn: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_client_is_fatal_without_timeout() {
        let scheduler = TurnScheduler::new(Bus::new(8), None);
        let board = scheduler.board();
        let client = tokio::spawn(async move {
            board.wait_turn(1).await.unwrap().release(ClientState::Rejected);
        });

        // Two rounds but only one client: nobody can ever release turn 2.
        let err = scheduler.run(2, CancellationToken::new()).await.unwrap_err();
        client.await.unwrap();
        assert_eq!(err.turn(), Some(2));
    }

    #[tokio::test]
    async fn test_cancel_stops_between_rounds() {
        let scheduler = TurnScheduler::new(Bus::new(8), None);
        let _board = scheduler.board();
        let token = CancellationToken::new();
        token.cancel();

        let summary = scheduler.run(4, token).await.unwrap();
        assert!(!summary.completed);
        assert_eq!(summary.issued, vec![1]);
    }
}
