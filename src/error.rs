//! Error types used by the venue runtime and its actors.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: fatal errors of the orchestration itself (a stalled
//!   admission round, a shutdown that overran its grace period, bad config).
//! - [`ServiceError`]: transient faults inside one actor while handling one
//!   request. The request is answered with a `Faulted` outcome and the actor
//!   keeps serving.
//! - [`ConfigError`]: startup configuration rejected by [`Config::validate`](crate::Config::validate).
//!
//! Capacity shortfalls (too few seats, a counter running dry) are **not**
//! errors: they are ordinary request outcomes.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the venue runtime.
///
/// Any of these halts forward admission progress.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration rejected before any actor started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The client holding a turn never released it within the turn timeout.
    #[error("turn {turn} stalled: not released after {waited:?}")]
    TurnStalled {
        /// The turn that was never released.
        turn: u32,
        /// How long the scheduler waited.
        waited: Duration,
    },

    /// A turn release arrived from a client that does not hold the turn.
    #[error("turn {expected} released by client {released_by}")]
    TurnMismatch {
        /// The turn currently issued.
        expected: u32,
        /// The client that released.
        released_by: u32,
    },

    /// The turn scheduler panicked.
    #[error("turn scheduler panicked: {info}")]
    SchedulerPanicked {
        /// Panic message.
        info: String,
    },

    /// Shutdown grace period was exceeded; some actors remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Actors that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use boxoffice::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::TurnStalled { turn: 4, waited: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "runtime_turn_stalled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig(_) => "runtime_invalid_config",
            RuntimeError::TurnStalled { .. } => "runtime_turn_stalled",
            RuntimeError::TurnMismatch { .. } => "runtime_turn_mismatch",
            RuntimeError::SchedulerPanicked { .. } => "runtime_scheduler_panicked",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns the turn the failure is attached to, if any.
    pub fn turn(&self) -> Option<u32> {
        match self {
            RuntimeError::TurnStalled { turn, .. } => Some(*turn),
            RuntimeError::TurnMismatch { expected, .. } => Some(*expected),
            _ => None,
        }
    }
}

/// # Transient faults raised while serving a single request.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The collaborator's channel is closed (actor stopped or shutting down).
    #[error("{service} is closed")]
    Closed {
        /// Name of the unreachable service.
        service: &'static str,
    },

    /// The handler panicked; the panic was contained.
    #[error("{actor} panicked: {info}")]
    Panicked {
        /// Actor whose handler panicked.
        actor: String,
        /// Panic message.
        info: String,
    },

    /// A seat commit would have driven the pool negative.
    #[error("seat pool underflow: requested {requested}, available {available}")]
    SeatUnderflow {
        /// Seats requested.
        requested: u32,
        /// Seats available at commit time.
        available: u32,
    },
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Closed { .. } => "service_closed",
            ServiceError::Panicked { .. } => "service_panicked",
            ServiceError::SeatUnderflow { .. } => "service_seat_underflow",
        }
    }

    /// Shorthand for [`ServiceError::Closed`].
    pub(crate) fn closed(service: &'static str) -> Self {
        ServiceError::Closed { service }
    }
}

/// # Startup configuration errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// At least one counter is required.
    #[error("no counters configured")]
    NoCounters,

    /// Request sizes are drawn in `[1, limit-1]`, so a limit must be at least 2.
    #[error("{name} must be at least 2, got {value}")]
    RequestBoundTooSmall {
        /// Name of the bound.
        name: &'static str,
        /// Configured value.
        value: u32,
    },

    /// A lottery weight is not a probability.
    #[error("lottery weight {name} must be within [0, 1], got {value}")]
    WeightOutOfRange {
        /// Name of the weight.
        name: &'static str,
        /// Configured value.
        value: f64,
    },

    /// A counter could never satisfy the largest possible request even when full.
    #[error("counter {counter} replenish target {target} is below the largest request {largest}")]
    TargetBelowRequest {
        /// Counter id (1-based).
        counter: u32,
        /// Configured replenish target.
        target: u32,
        /// Largest quantity a client can ask for.
        largest: u32,
    },

    /// An environment override could not be parsed.
    #[error("environment variable {var}={value:?} is not valid")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}
