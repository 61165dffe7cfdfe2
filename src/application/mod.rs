//! Application layer orchestrating the billing provider.
//!
//! [`session::BillingSession`] owns the provider connection and sequences the
//! catalog, purchase and finalize operations. [`dispatcher::ResultDispatcher`]
//! turns outcomes into wire records for the callbacks, and
//! [`bridge::BillingBridge`] is the fire-and-forget entry point used by the
//! engine.

pub mod bridge;
pub mod dispatcher;
pub mod session;
