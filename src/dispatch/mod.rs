//! Dispatch drivers: the pieces that actually own an event loop and call
//! [`Connection::dispatch`](crate::Connection::dispatch) when there's
//! something to do (§4.E).
//!
//! Two concrete drivers are provided: [`run_loop`] for a dependency-free
//! cooperative poll loop, and [`tokio`] for integrating with a Tokio
//! runtime via `AsyncFd`. Both apply the same ordering rule: a watch
//! firing drains `connection.dispatch()` until the status is no longer
//! `DataRemains`, and neither ever calls `dispatch()` reentrantly from
//! inside that drain (§4.E "Reentrancy rule").

pub mod run_loop;

#[cfg(feature = "tokio")]
pub mod tokio_driver;
