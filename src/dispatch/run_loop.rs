//! A minimal cooperative dispatch driver with no runtime dependency
//! beyond `libc::poll` (§4.E, "one bound to a cooperative run-loop-style
//! event system").
//!
//! [`RunLoop::run_once`] blocks until one of its registered connections'
//! descriptors becomes ready, then drains that connection the way §4.E
//! requires: read whatever is available, then `dispatch()` repeatedly
//! until the status is no longer `DataRemains`.

use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{Connection, DispatchStatus};
use crate::error::{ErrorKind, Result};

struct Registration {
    fd: RawFd,
    connection: Arc<Connection>,
}

/// A single-threaded, poll-driven reactor over a handful of connections.
///
/// This is the cooperative driver named in §4.E: a caller embeds
/// `run_once`/`run` in its own loop (or a GLib-style main loop, a game
/// loop, anything single-threaded) rather than handing control to a
/// dedicated executor thread.
pub struct RunLoop {
    registrations: Vec<Registration>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self { registrations: Vec::new() }
    }

    /// Watch `connection`'s transport descriptor for readability.
    pub fn register(&mut self, connection: Arc<Connection>) {
        let fd = connection.raw_fd();
        self.registrations.push(Registration { fd, connection });
    }

    pub fn unregister(&mut self, connection: &Arc<Connection>) {
        self.registrations.retain(|r| !Arc::ptr_eq(&r.connection, connection));
    }

    /// Block for up to `timeout` waiting for any registered connection to
    /// become readable, then drain every connection that was ready.
    /// Returns the number of connections drained.
    pub fn run_once(&self, timeout: Duration) -> Result<usize> {
        if self.registrations.is_empty() {
            std::thread::sleep(timeout);
            return Ok(0);
        }

        let ready = poll_readable(&self.registrations, timeout)?;
        for &index in &ready {
            let connection = &self.registrations[index].connection;
            connection.read_available()?;
            loop {
                match connection.dispatch()? {
                    DispatchStatus::DataRemains => continue,
                    DispatchStatus::Complete | DispatchStatus::NeedMemory => break,
                }
            }
        }
        Ok(ready.len())
    }

    /// Run forever, one `run_once` iteration at a time.
    pub fn run(&self, poll_timeout: Duration) -> Result<()> {
        loop {
            self.run_once(poll_timeout)?;
        }
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "libc")]
fn poll_readable(registrations: &[Registration], timeout: Duration) -> Result<Vec<usize>> {
    let mut fds: Vec<libc::pollfd> = registrations
        .iter()
        .map(|r| libc::pollfd { fd: r.fd, events: libc::POLLIN, revents: 0 })
        .collect();

    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(fds
        .iter()
        .enumerate()
        .filter(|(_, pfd)| pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .map(|(i, _)| i)
        .collect())
}

#[cfg(not(feature = "libc"))]
fn poll_readable(_registrations: &[Registration], _timeout: Duration) -> Result<Vec<usize>> {
    Err(ErrorKind::Fatal("the cooperative run-loop driver requires the \"libc\" feature").at())
}
