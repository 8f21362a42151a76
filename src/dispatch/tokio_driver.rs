//! The Tokio-backed dispatch driver (§4.E, "one bound to a thread-pool
//! dispatch queue with a user-chosen queue").
//!
//! Wraps a connection's transport descriptor in an [`AsyncFd`], the same
//! reactor primitive the teacher crate drives its own client loop with,
//! and spawns a task per connection that waits for readability and drains
//! it exactly like [`super::run_loop::RunLoop`] does synchronously.

use std::sync::Arc;

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use crate::connection::{Connection, DispatchStatus};
use crate::error::Result;

struct ConnectionFd(Arc<Connection>);

impl std::os::fd::AsRawFd for ConnectionFd {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.raw_fd()
    }
}

/// Drives one connection's dispatch loop on the current Tokio runtime
/// until the connection is dropped or an unrecoverable I/O error occurs.
///
/// Spawn with `tokio::spawn(run(connection))`; the returned future never
/// resolves with `Ok` under normal operation, mirroring a long-lived
/// reactor task.
pub async fn run(connection: Arc<Connection>) -> Result<()> {
    connection.set_nonblocking(true)?;
    let async_fd = AsyncFd::with_interest(ConnectionFd(connection.clone()), Interest::READABLE)?;

    loop {
        let mut guard = async_fd.readable().await?;
        connection.read_available()?;
        loop {
            match connection.dispatch()? {
                DispatchStatus::DataRemains => continue,
                DispatchStatus::Complete | DispatchStatus::NeedMemory => break,
            }
        }
        guard.clear_ready();
    }
}
