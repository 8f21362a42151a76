//! Pluggable byte transport underneath a [`Connection`](crate::Connection)
//! (§6.3 of the design, narrowed from a C-ABI boundary down to a plain
//! trait object: one first-party implementation, [`UnixTransport`], moves
//! bytes over a Unix domain socket; a mock for tests, or a binding to a
//! real system `libdbus`, only needs to implement this trait).

use std::env;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixStream;

use crate::error::{ErrorKind, Result};
use crate::sasl;

const ENV_SESSION_BUS: &str = "DBUS_SESSION_BUS_ADDRESS";
const ENV_SYSTEM_BUS: &str = "DBUS_SYSTEM_BUS_ADDRESS";
const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

/// A byte-oriented connection to a bus, beneath the message-framing layer
/// (§6.3's "Transport interface", reduced to what a connection actually
/// needs: raw bytes in, raw bytes out, and a way to toggle nonblocking
/// mode once the SASL handshake on it is done).
pub trait Transport: Read + Write + AsRawFd + Send {
    /// Switch the transport in or out of nonblocking mode, the way a
    /// connection needs once it hands off to a dispatch driver's event
    /// loop.
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
}

/// A transport over a Unix domain socket — the only kind of D-Bus address
/// this crate resolves itself (§1 explicitly excludes cross-machine
/// transports).
///
/// Connecting performs the SASL `EXTERNAL` handshake synchronously before
/// returning, the way `libdbus`-backed bindings authenticate before
/// handing the socket to the nonblocking message layer.
pub struct UnixTransport {
    stream: UnixStream,
}

impl UnixTransport {
    /// Connect to the session bus named by `DBUS_SESSION_BUS_ADDRESS`.
    pub fn session_bus() -> Result<Self> {
        Self::from_env(ENV_SESSION_BUS, None)
    }

    /// Connect to the system bus named by `DBUS_SYSTEM_BUS_ADDRESS`, or
    /// the well-known system socket path if that variable is unset.
    pub fn system_bus() -> Result<Self> {
        Self::from_env(ENV_SYSTEM_BUS, Some(DEFAULT_SYSTEM_BUS))
    }

    /// Connect to an explicit D-Bus address string, e.g.
    /// `unix:path=/run/user/1000/bus`.
    pub fn connect_address(address: &str) -> Result<Self> {
        Self::connect(OsStr::new(address))
    }

    fn from_env(var: &str, default: Option<&str>) -> Result<Self> {
        let value;
        let address: &OsStr = match env::var_os(var) {
            Some(v) => {
                value = v;
                value.as_os_str()
            }
            None => match default {
                Some(default) => OsStr::new(default),
                None => return Err(ErrorKind::MissingBus.at()),
            },
        };
        Self::connect(address)
    }

    fn connect(address: &OsStr) -> Result<Self> {
        let path = parse_unix_path(address.as_bytes())?;
        let mut stream = UnixStream::connect(OsStr::from_bytes(&path))?;
        let uid = current_uid()?;
        sasl::authenticate_external(&mut stream, uid)?;
        Ok(Self { stream })
    }
}

impl Read for UnixTransport {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for UnixTransport {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl AsRawFd for UnixTransport {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Transport for UnixTransport {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.stream.set_nonblocking(nonblocking)
    }
}

/// A raw, unauthenticated transport over any [`UnixStream`], most useful
/// paired with [`UnixStream::pair`] for tests that want a `Connection`
/// without a live bus: unlike [`UnixTransport::connect_address`], this
/// skips the SASL handshake entirely, so the peer end is expected to speak
/// the message framing directly.
impl Transport for UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }
}

/// Parse the `unix:path=<path>` form of the D-Bus address grammar (the
/// abstract-namespace `unix:abstract=` form needs a socket address this
/// crate doesn't build yet, so it is rejected rather than silently
/// mishandled).
fn parse_unix_path(address: &[u8]) -> Result<Vec<u8>> {
    for entry in address.split(|&b| b == b';') {
        let Some(rest) = entry.strip_prefix(b"unix:") else {
            continue;
        };
        for kv in rest.split(|&b| b == b',') {
            if let Some(path) = kv.strip_prefix(b"path=") {
                return Ok(path.to_vec());
            }
        }
    }
    Err(ErrorKind::InvalidAddress.at())
}

#[cfg(feature = "libc")]
fn current_uid() -> Result<u32> {
    Ok(unsafe { libc::getuid() })
}

#[cfg(not(feature = "libc"))]
fn current_uid() -> Result<u32> {
    Err(ErrorKind::Fatal("uid lookup requires the \"libc\" feature").at())
}

#[cfg(test)]
mod tests {
    use super::parse_unix_path;

    #[test]
    fn parses_path_address() {
        let parsed = parse_unix_path(b"unix:path=/run/user/1000/bus").unwrap();
        assert_eq!(parsed, b"/run/user/1000/bus");
    }

    #[test]
    fn parses_path_among_other_keys() {
        let parsed = parse_unix_path(b"unix:guid=abc,path=/tmp/bus").unwrap();
        assert_eq!(parsed, b"/tmp/bus");
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(parse_unix_path(b"tcp:host=localhost,port=1234").is_err());
    }
}
