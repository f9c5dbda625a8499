//! # Fault containment for actor handlers.
//!
//! Every actor serves one request at a time. A handler that returns an error or
//! panics must not take the actor down with it, and must not leave the requester
//! waiting: [`contain`] turns both cases into a [`ServiceError`] the actor can
//! report and answer with.
//!
//! ```text
//! handler future ──► catch_unwind ──► Ok(Ok(v))   → Ok(v)
//!                                 ├─► Ok(Err(e))  → Err(e)
//!                                 └─► Err(panic)  → Err(ServiceError::Panicked)
//! ```
//!
//! **Warning**: `AssertUnwindSafe` is used. Handlers keep their state in plain
//! owned fields updated after the last await, so a panic can at worst lose the
//! in-flight request.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::ServiceError;

/// Runs `fut`, converting a panic into [`ServiceError::Panicked`].
pub(crate) async fn contain<T, F>(actor: &str, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic_err) => Err(ServiceError::Panicked {
            actor: actor.to_string(),
            info: panic_message(&*panic_err),
        }),
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
