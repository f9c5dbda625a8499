//! # Admission: turn order and the seat pool.
//!
//! - [`TurnScheduler`] issues turns `1..=M` and waits for each to be released.
//! - [`TicketOffice`] owns the [`SeatPool`] and answers each admission with an
//!   [`AdmissionOutcome`].
//!
//! A client holds its [`TurnPermit`] for the whole seat request, so at most
//! one admission is ever in flight.

mod office;
mod turn;

pub use office::{
    AdmissionOutcome, AdmissionRequest, DenialReason, SeatPool, SeatSnapshot, TicketOffice,
    TicketOfficeHandle,
};
pub use turn::{RoundSummary, TurnBoard, TurnPermit, TurnRelease, TurnScheduler};
