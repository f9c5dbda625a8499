//! # Run one actor to completion.
//!
//! Wraps an actor's main loop with lifecycle events on the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Normal exit:
//!   publish ActorStarted → actor loop → returns value → publish ActorStopped
//!
//! Panic escaping the loop:
//!   publish ActorStarted → actor loop → panic → publish ActorFault
//!                                             → return ServiceError::Panicked
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `ActorStopped` or `ActorFault`
//! - Per-request faults are handled inside each actor; only a panic that escapes
//!   the whole loop reaches this layer

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::core::fault::panic_message;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

/// Runs `actor` under `name`, publishing its lifecycle to `bus`.
pub async fn run_actor<T, F>(name: &str, bus: &Bus, actor: F) -> Result<T, ServiceError>
where
    F: Future<Output = T>,
{
    bus.publish(Event::new(EventKind::ActorStarted).with_actor(name));

    match AssertUnwindSafe(actor).catch_unwind().await {
        Ok(value) => {
            bus.publish(Event::new(EventKind::ActorStopped).with_actor(name));
            Ok(value)
        }
        Err(panic_err) => {
            let info = panic_message(&*panic_err);
            bus.publish(Event::actor_fault(name, info.clone()));
            Err(ServiceError::Panicked {
                actor: name.to_string(),
                info,
            })
        }
    }
}
