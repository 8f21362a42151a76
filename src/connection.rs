//! A live connection to a D-Bus bus (§4.D).
//!
//! `Connection` owns the transport, the inbound queue, the pending-call
//! table, and the handler registry; it never drives an event loop
//! itself — that's a dispatch driver's job (§4.E), built on `dispatch()`
//! and `read_available()`, which the drivers in [`crate::dispatch`] call
//! directly off the raw transport descriptor.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{ErrorKind, Result};
use crate::message::{Message, MessageKind};
use crate::names::{BusName, MemberName, OwnedBusName};
use crate::object_path::{ObjectPath, OwnedObjectPath};
use crate::pending_call::{new_pending_call, PendingCall, PendingCallSlot};
use crate::transport::{Transport, UnixTransport};

/// How long to wait for a method call's reply (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTimeout {
    UseDefault,
    Infinite,
    Milliseconds(u32),
}

impl CallTimeout {
    fn resolve(self, default: Duration) -> Duration {
        match self {
            CallTimeout::UseDefault => default,
            CallTimeout::Infinite => Duration::from_millis(0x7FFF_FFFF),
            CallTimeout::Milliseconds(ms) => Duration::from_millis(ms as u64),
        }
    }
}

/// Which bus to connect to (§6.2).
#[derive(Debug, Clone)]
pub enum BusKind {
    Session,
    System,
    Address(String),
}

/// Where `ConnectionBuilder::connect` gets its transport from: a bus address
/// to resolve, or an already-established one handed in directly (tests, or
/// an alternate `Transport` impl — the boundary is a trait for exactly this
/// reason).
enum TransportSource {
    Bus(BusKind),
    Custom(Box<dyn Transport>),
}

/// The result of processing at most one inbound message (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    DataRemains,
    Complete,
    NeedMemory,
}

/// How a registered filter or path handler disposes of a message (§4.D
/// "Handler chain semantics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    Handled,
    NotYet,
    NeedMemory,
}

type Filter = Arc<dyn Fn(&Message) -> HandlerResult + Send + Sync>;
type PathHandler = Arc<dyn Fn(&Message) -> HandlerResult + Send + Sync>;

/// Per-connection size/count limits (§6.2).
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_message_size: u32,
    pub max_message_fds: u32,
    pub max_received_size: u32,
    pub max_received_fds: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_size: crate::buf::MAX_BODY_LENGTH,
            max_message_fds: 1024,
            max_received_size: crate::buf::MAX_BODY_LENGTH,
            max_received_fds: 1024,
        }
    }
}

/// Builds a [`Connection`] (§6.2's configurable connection parameters).
pub struct ConnectionBuilder {
    source: TransportSource,
    private: bool,
    limits: Limits,
    default_timeout: Duration,
}

impl ConnectionBuilder {
    pub fn session() -> Self {
        Self::new(TransportSource::Bus(BusKind::Session))
    }

    pub fn system() -> Self {
        Self::new(TransportSource::Bus(BusKind::System))
    }

    pub fn address(address: impl Into<String>) -> Self {
        Self::new(TransportSource::Bus(BusKind::Address(address.into())))
    }

    /// Build a connection directly over an already-established transport,
    /// skipping bus address resolution entirely. Meant for a mock transport
    /// in tests (e.g. one half of a `std::os::unix::net::UnixStream::pair()`)
    /// or a non-Unix `Transport` impl; real applications want `session()`,
    /// `system()`, or `address()` instead.
    pub fn transport(transport: impl Transport + 'static) -> Self {
        Self::new(TransportSource::Custom(Box::new(transport)))
    }

    fn new(source: TransportSource) -> Self {
        Self {
            source,
            private: false,
            limits: Limits::default(),
            default_timeout: Duration::from_secs(25),
        }
    }

    /// Mark this connection as private: it owns its transport exclusively
    /// and `close()` is valid on it (§4.D: shared connections are
    /// reference-counted and must not be closed).
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Connect and perform the `Hello` handshake (§4.D `register()`,
    /// "automatic for shared" connections).
    pub fn connect(self) -> Result<Connection> {
        let transport: Box<dyn Transport> = match self.source {
            TransportSource::Bus(BusKind::Session) => Box::new(UnixTransport::session_bus()?),
            TransportSource::Bus(BusKind::System) => Box::new(UnixTransport::system_bus()?),
            TransportSource::Bus(BusKind::Address(address)) => {
                Box::new(UnixTransport::connect_address(&address)?)
            }
            TransportSource::Custom(transport) => transport,
        };
        let mut connection = Connection::new(transport, self.private, self.limits, self.default_timeout);
        if !self.private {
            connection.register()?;
        }
        Ok(connection)
    }
}

struct HandlerRegistry {
    filters: Vec<Filter>,
    path_handlers: HashMap<OwnedObjectPath, Vec<PathHandler>>,
}

/// A live D-Bus connection (§4.D).
pub struct Connection {
    transport: Mutex<Box<dyn Transport>>,
    next_serial: AtomicU32,
    inbound: Mutex<VecDeque<Message>>,
    pending: Mutex<HashMap<u32, PendingCallSlot>>,
    handlers: Mutex<HandlerRegistry>,
    unique_name: Mutex<Option<OwnedBusName>>,
    private: bool,
    limits: Limits,
    default_timeout: Duration,
    closed: Mutex<bool>,
}

impl Connection {
    fn new(transport: Box<dyn Transport>, private: bool, limits: Limits, default_timeout: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            next_serial: AtomicU32::new(1),
            inbound: Mutex::new(VecDeque::new()),
            pending: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HandlerRegistry {
                filters: Vec::new(),
                path_handlers: HashMap::new(),
            }),
            unique_name: Mutex::new(None),
            private,
            limits,
            default_timeout,
            closed: Mutex::new(false),
        }
    }

    /// Perform the `Hello` handshake, recording the unique bus name the
    /// daemon assigned this connection.
    pub fn register(&mut self) -> Result<()> {
        let path = ObjectPath::new("/org/freedesktop/DBus").unwrap();
        let member = MemberName::new("Hello").unwrap();
        let interface = crate::names::InterfaceName::new("org.freedesktop.DBus").unwrap();
        let destination = BusName::new("org.freedesktop.DBus").unwrap();
        let message = Message::method_call(path, member)
            .interface(interface)
            .destination(destination)
            .build(self.allocate_serial())?;
        let reply = self.send_with_reply_blocking(message, CallTimeout::UseDefault)?;
        let name: String = reply.read()?;
        *self.unique_name.lock().unwrap() = Some(OwnedBusName::new(name)?);
        Ok(())
    }

    pub fn unique_name(&self) -> Option<OwnedBusName> {
        self.unique_name.lock().unwrap().clone()
    }

    fn allocate_serial(&self) -> u32 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Close a private connection (§4.D: invalid on a shared one).
    pub fn close(&self) -> Result<()> {
        if !self.private {
            return Err(ErrorKind::Fatal("close() is only valid on a private connection").at());
        }
        *self.closed.lock().unwrap() = true;
        self.fail_all_pending();
        Ok(())
    }

    fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        for (_, slot) in pending.drain() {
            slot.resolve(Err(ErrorKind::Disconnected.at()));
        }
    }

    /// Enqueue `message` for transmission, stamping it with a fresh
    /// serial, and return that serial.
    pub fn send(&self, mut message: Message) -> Result<u32> {
        let serial = self.allocate_serial();
        message.set_serial(serial);
        self.write_message(&message)?;
        Ok(serial)
    }

    fn write_message(&self, message: &Message) -> Result<()> {
        let bytes = message.encode();
        if bytes.len() as u32 > self.limits.max_message_size {
            return Err(ErrorKind::OutOfMemory.at());
        }
        let mut transport = self.transport.lock().unwrap();
        transport.write_all(&bytes)?;
        Ok(())
    }

    /// Send `message`, returning a [`PendingCall`] for its reply
    /// (§4.D).
    pub fn send_with_reply(&self, mut message: Message, timeout: CallTimeout) -> Result<PendingCall> {
        let serial = self.allocate_serial();
        message.set_serial(serial);
        // `Infinite` means exactly that: no deadline at all, not merely a
        // very long one, so a call explicitly marked infinite never gets
        // swept out from under a caller who intends to wait forever.
        let deadline = match timeout {
            CallTimeout::Infinite => None,
            other => Some(Instant::now() + other.resolve(self.default_timeout)),
        };
        let (call, slot) = new_pending_call(serial, deadline);
        self.pending.lock().unwrap().insert(serial, slot);
        if let Err(e) = self.write_message(&message) {
            if let Some(slot) = self.pending.lock().unwrap().remove(&serial) {
                slot.resolve(Err(ErrorKind::OutOfMemory.at()));
            }
            return Err(e);
        }
        Ok(call)
    }

    /// Send `message` and block until its reply arrives or `timeout`
    /// elapses, pumping inbound I/O itself (§4.D).
    pub fn send_with_reply_blocking(&self, message: Message, timeout: CallTimeout) -> Result<Message> {
        let call = self.send_with_reply(message, timeout)?;
        let deadline = timeout.resolve(self.default_timeout);
        let start = std::time::Instant::now();
        loop {
            if let Some(result) = call.try_take() {
                return result;
            }
            self.pump_one_blocking(deadline.saturating_sub(start.elapsed()))?;
        }
    }

    /// Read exactly one message off the transport (blocking) and route
    /// it, used by the blocking call path until its own reply shows up.
    fn pump_one_blocking(&self, remaining: Duration) -> Result<()> {
        if remaining.is_zero() {
            return Err(ErrorKind::NoReply.at());
        }
        let message = self.read_one_message()?;
        self.route_inbound(message);
        Ok(())
    }

    fn read_one_message(&self) -> Result<Message> {
        let mut transport = self.transport.lock().unwrap();
        let mut header = [0u8; 16];
        transport.read_exact(&mut header)?;
        let body_length = u32::from_ne_bytes([header[4], header[5], header[6], header[7]]);
        if body_length > self.limits.max_received_size {
            return Err(ErrorKind::OutOfMemory.at());
        }
        // Read incrementally until a full message decodes; the fixed
        // header doesn't expose the header-fields array length directly,
        // so this grows the buffer by one frame at a time rather than
        // trying to precompute the split.
        let mut buf = header.to_vec();
        loop {
            match Message::decode(&buf) {
                Ok((message, _consumed)) => return Ok(message),
                Err(_) => {
                    let mut chunk = [0u8; 256];
                    let n = transport.read(&mut chunk)?;
                    if n == 0 {
                        return Err(ErrorKind::Disconnected.at());
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    /// Route one already-received message to the pending-call table or
    /// the handler registry, the way `dispatch()` does for queued
    /// messages (§4.D).
    fn route_inbound(&self, message: Message) {
        if let Some(reply_serial) = message.reply_serial() {
            if let Some(slot) = self.pending.lock().unwrap().remove(&reply_serial) {
                if !slot.is_cancelled() {
                    let result = match message.kind() {
                        MessageKind::Error { error_name, .. } => {
                            let text: String = message.read().unwrap_or_default();
                            Err(crate::Error::remote(error_name.as_str(), text))
                        }
                        _ => Ok(message),
                    };
                    slot.resolve(result);
                }
                return;
            }
        }
        self.inbound.lock().unwrap().push_back(message);
    }

    /// Process at most one inbound message already sitting in the queue
    /// (§4.D).
    pub fn dispatch(&self) -> Result<DispatchStatus> {
        self.expire_pending_calls();
        let message = self.inbound.lock().unwrap().pop_front();
        let Some(message) = message else {
            return Ok(DispatchStatus::Complete);
        };
        self.dispatch_one(&message);
        let remains = !self.inbound.lock().unwrap().is_empty();
        Ok(if remains { DispatchStatus::DataRemains } else { DispatchStatus::Complete })
    }

    /// Pull any bytes the transport has ready into the inbound queue,
    /// without blocking on a reply. Used by dispatch drivers when a
    /// watch fires.
    pub fn read_available(&self) -> Result<()> {
        self.expire_pending_calls();
        loop {
            match self.read_one_message() {
                Ok(message) => self.route_inbound(message),
                Err(e) if e.would_block() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Reap pending calls whose deadline passed without anyone ever
    /// polling them through `try_take`/`is_ready`, so a call nobody's
    /// watching still resolves (to a timeout) and its slot doesn't leak
    /// in `self.pending` forever.
    fn expire_pending_calls(&self) {
        self.pending.lock().unwrap().retain(|_, slot| !slot.expire_if_due());
    }

    /// Run the filter chain, then the path-handler chain, against
    /// `message`. The chains are cloned out from under `self.handlers`
    /// before any callback runs, so a handler that itself calls
    /// `add_filter`/`add_path_handler` (e.g. an `ObjectServer` method that
    /// registers a new object) doesn't re-lock the same non-reentrant
    /// mutex and deadlock.
    fn dispatch_one(&self, message: &Message) {
        let filters: Vec<Filter> = self.handlers.lock().unwrap().filters.clone();
        for filter in &filters {
            match filter(message) {
                HandlerResult::Handled | HandlerResult::NeedMemory => return,
                HandlerResult::NotYet => {}
            }
        }
        if let Some(path) = message.path() {
            let chain = self.handlers.lock().unwrap().path_handlers.get(path).cloned();
            if let Some(chain) = chain {
                for handler in &chain {
                    match handler(message) {
                        HandlerResult::Handled | HandlerResult::NeedMemory => return,
                        HandlerResult::NotYet => {}
                    }
                }
            }
        }
    }

    /// Register a filter that runs on every inbound message, before any
    /// path handler (§4.D).
    pub fn add_filter(&self, filter: impl Fn(&Message) -> HandlerResult + Send + Sync + 'static) {
        self.handlers.lock().unwrap().filters.push(Arc::new(filter));
    }

    /// Register a handler for `path`, appended after any already
    /// registered there (§4.D "run in insertion order").
    pub fn add_path_handler(
        &self,
        path: &ObjectPath,
        handler: impl Fn(&Message) -> HandlerResult + Send + Sync + 'static,
    ) {
        self.handlers
            .lock()
            .unwrap()
            .path_handlers
            .entry(path.to_owned())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Toggle the underlying transport's blocking mode. An event-loop-based
    /// dispatch driver (§4.E) needs this before registering the connection's
    /// descriptor with its reactor, since it reads based on readiness rather
    /// than blocking for a whole message at a time.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.transport.lock().unwrap().set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Drain the outbound queue. This implementation writes synchronously
    /// on `send`, so flushing only has to make sure any buffered writer
    /// state reaches the socket.
    pub fn flush(&self) -> Result<()> {
        self.transport.lock().unwrap().flush()?;
        Ok(())
    }

    pub(crate) fn raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;
        self.transport.lock().unwrap().as_raw_fd()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("unique_name", &self.unique_name.lock().unwrap().as_ref().map(|n| n.as_str().to_owned()))
            .field("private", &self.private)
            .finish()
    }
}

/// Shared ownership of a connection, the form handed to a proxy,
/// skeleton, or dispatch driver (§5 "user-visible objects that hold a
/// connection reference are declared shareable across threads").
pub type SharedConnection = Arc<Connection>;

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::names::MemberName;
    use crate::object_path::ObjectPath;

    use super::*;

    fn private_connection() -> Connection {
        let (a, _b) = UnixStream::pair().unwrap();
        crate::ConnectionBuilder::transport(a).private().connect().unwrap()
    }

    #[test]
    fn a_handler_may_register_another_handler_without_deadlocking() {
        let connection = private_connection();
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let message = Message::method_call(path, member).build(1).unwrap();
        connection.inbound.lock().unwrap().push_back(message);

        // Exercise the reentrant path: a filter that calls back into
        // `add_path_handler` on the same connection it's dispatching for,
        // the way an `ObjectServer` method handler installing a new object
        // on the fly would. Before `dispatch_one` stopped holding the
        // `handlers` lock across callback invocation, this deadlocked.
        let nested_ran = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(connection);
        let shared_for_filter = shared.clone();
        let nested_ran_filter = nested_ran.clone();
        shared.add_filter(move |_message| {
            shared_for_filter.add_path_handler(path, |_| HandlerResult::Handled);
            nested_ran_filter.store(true, Ordering::SeqCst);
            HandlerResult::NotYet
        });

        let status = shared.dispatch().unwrap();
        assert_eq!(status, DispatchStatus::Complete);
        assert!(nested_ran.load(Ordering::SeqCst));
        assert!(shared.handlers.lock().unwrap().path_handlers.contains_key(path));
    }

    #[test]
    fn async_call_times_out_even_if_never_polled_directly() {
        let connection = private_connection();
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let message = Message::method_call(path, member).build(1).unwrap();

        let call = connection.send_with_reply(message, CallTimeout::Milliseconds(0)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        // Nobody ever calls `call.try_take()` here; the connection's own
        // dispatch sweep is what reaps it.
        assert_eq!(connection.dispatch().unwrap(), DispatchStatus::Complete);
        assert!(!connection.pending.lock().unwrap().contains_key(&call.serial()));
        assert!(call.try_take().unwrap().is_err());
    }

    #[test]
    fn infinite_call_timeout_never_expires_on_its_own() {
        let connection = private_connection();
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let message = Message::method_call(path, member).build(1).unwrap();

        let call = connection.send_with_reply(message, CallTimeout::Infinite).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        connection.dispatch().unwrap();
        assert!(connection.pending.lock().unwrap().contains_key(&call.serial()));
        assert!(!call.is_ready());
    }
}
