//! Outbound message delivery: the HTTP delivery client, the per-message
//! delivery unit with retry and backoff, and the polling scheduler that fans
//! pending messages out to delivery units.

pub mod client;
pub mod scheduler;
pub mod unit;

pub use client::{
    ClientTimeouts, DeliveryClient, DeliveryError, DeliveryOutcome, DeliveryRequest,
    HttpDeliveryClient,
};
pub use scheduler::{PassSummary, Scheduler, SchedulerSettings};
pub use unit::{DeliveryUnit, RetryPolicy, UnitOutcome};

#[cfg(test)]
pub(crate) mod testing;
