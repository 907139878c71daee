//! Dispatch engine: execution pool, request executor, pacer and lifecycle.

pub mod dispatcher;
pub mod executor;
pub mod pacer;
mod unit;

pub use dispatcher::{Dispatcher, Inbox, Outbox};
pub use executor::{Cycle, Executor, batch_body};
pub use pacer::Pacer;
