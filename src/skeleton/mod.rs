//! The server facade: export methods, signals, and properties at an
//! object path, the reverse of [`crate::proxy`] (§4.G).
//!
//! Registering anything at a path lazily installs the standard
//! `org.freedesktop.DBus.Peer`/`Introspectable`/`Properties` interfaces on
//! it, once, the first time that path is touched.

mod introspect;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::arg::{Arg, BodyReader, BodyWriter, ReadArg, Variant};
use crate::connection::{Connection, HandlerResult};
use crate::error::{ErrorKind, Result};
use crate::message::{Message, MessageKind};
use crate::names::{ErrorName, InterfaceName, MemberName};
use crate::object_path::{ObjectPath, OwnedObjectPath};
use crate::protocol::{Flags, MessageType};
use crate::signature::{OwnedSignature, Signature};

type PropertyGetter = Box<dyn Fn(&mut BodyWriter) -> Result<()> + Send + Sync>;
type PropertySetter = Box<dyn Fn(&mut BodyReader<'_>) -> Result<()> + Send + Sync>;

struct PropertyEntry {
    get: PropertyGetter,
    set: Option<PropertySetter>,
    signature: OwnedSignature,
}

#[derive(Default)]
struct InterfaceEntry {
    methods: Vec<String>,
    signals: Vec<String>,
    properties: HashMap<String, PropertyEntry>,
}

#[derive(Default)]
struct PathState {
    interfaces: HashMap<String, InterfaceEntry>,
}

/// A registry of locally implemented objects, shared by every path
/// handler it installs on `connection` (§4.G).
///
/// Registration methods (`method`, `signal`, `property`) are additive and
/// idempotent per call: each call installs one more path handler, so
/// registering the same member twice means two handlers race for the
/// same message (the first one to claim it via `Handled` wins, per the
/// handler-chain rule in §4.D).
pub struct ObjectServer {
    connection: Arc<Connection>,
    paths: Mutex<HashMap<OwnedObjectPath, Arc<Mutex<PathState>>>>,
    standard_installed: Mutex<HashSet<OwnedObjectPath>>,
}

impl ObjectServer {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            paths: Mutex::new(HashMap::new()),
            standard_installed: Mutex::new(HashSet::new()),
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn path_state(&self, path: &ObjectPath) -> Arc<Mutex<PathState>> {
        self.paths
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(PathState::default())))
            .clone()
    }

    /// Install a method handler at `path` (§4.G `method.delegate(f)`).
    ///
    /// `Args` is decoded from the call's body the same way [`Methods::call`]
    /// encodes it: a single value, `()` for no arguments. On success `f`'s
    /// result is sent back as the method-return body; on failure, `f` is
    /// expected to have raised a `Remote(name, text)` error, which becomes
    /// the error reply's name and text verbatim.
    ///
    /// [`Methods::call`]: crate::proxy::Methods::call
    pub fn method<Args, Ret, F>(
        &self,
        path: &ObjectPath,
        interface: &InterfaceName,
        member: &MemberName,
        f: F,
    ) -> Result<()>
    where
        Args: Arg + for<'de> ReadArg<'de>,
        Ret: Arg,
        F: Fn(Args) -> Result<Ret> + Send + Sync + 'static,
    {
        self.ensure_standard_interfaces(path);
        {
            let state = self.path_state(path);
            let mut state = state.lock().unwrap();
            state
                .interfaces
                .entry(interface.as_str().to_owned())
                .or_default()
                .methods
                .push(member.as_str().to_owned());
        }

        let interface = interface.to_owned();
        let member = member.to_owned();
        let connection = self.connection.clone();
        self.connection.add_path_handler(path, move |message: &Message| {
            if message.message_type() != MessageType::METHOD_CALL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) || message.member() != Some(member.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            let args = match message.read::<Args>() {
                Ok(args) => args,
                Err(_) => return reply_error(&connection, message, ErrorKind::InvalidArgs.at()),
            };
            match f(args) {
                Ok(ret) => {
                    let reply = Message::method_return(message).arg(&ret).build(0);
                    match reply.and_then(|m| connection.send(m)) {
                        Ok(_) => HandlerResult::Handled,
                        Err(_) => HandlerResult::NeedMemory,
                    }
                }
                Err(e) => reply_error(&connection, message, e),
            }
        });
        Ok(())
    }

    /// Install a handler at `path` that decodes and invokes `f` on every
    /// matching signal (§4.G `signal.connect(consumed, f)`).
    ///
    /// When `consumed` is `false`, the handler always reports `not-yet`
    /// after running `f`, so later handlers at the same path (other
    /// subscribers) still see the signal.
    pub fn signal<T, F>(
        &self,
        path: &ObjectPath,
        interface: &InterfaceName,
        member: &MemberName,
        consumed: bool,
        f: F,
    ) -> Result<()>
    where
        T: for<'de> ReadArg<'de>,
        F: Fn(T) + Send + Sync + 'static,
    {
        {
            let state = self.path_state(path);
            let mut state = state.lock().unwrap();
            state
                .interfaces
                .entry(interface.as_str().to_owned())
                .or_default()
                .signals
                .push(member.as_str().to_owned());
        }

        let interface = interface.to_owned();
        let member = member.to_owned();
        self.connection.add_path_handler(path, move |message: &Message| {
            if message.message_type() != MessageType::SIGNAL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) || message.member() != Some(member.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match message.read::<T>() {
                Ok(value) => {
                    f(value);
                    if consumed { HandlerResult::Handled } else { HandlerResult::NotYet }
                }
                Err(_) => HandlerResult::NeedMemory,
            }
        });
        Ok(())
    }

    /// Register a property with the shared per-path `Properties`
    /// interface (§4.G `property.delegate(get, set?)`). `set`'s absence
    /// makes the property read-only; a rejected `set` should return
    /// `PropertyReadOnly` or `InvalidArgs`.
    ///
    /// A successful `set` emits `PropertiesChanged` for this single
    /// property, so [`Properties::watch_changes`] on a remote peer
    /// observes it.
    ///
    /// [`Properties::watch_changes`]: crate::proxy::Properties::watch_changes
    pub fn property<T, G, S>(
        &self,
        path: &ObjectPath,
        interface: &InterfaceName,
        member: &MemberName,
        get: G,
        set: Option<S>,
    ) -> Result<()>
    where
        T: Arg + for<'de> ReadArg<'de> + 'static,
        G: Fn() -> Result<T> + Send + Sync + 'static,
        S: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_standard_interfaces(path);
        let signature = T::static_signature()
            .map(|s| s.to_owned())
            .unwrap_or_else(|| Signature::VARIANT.to_owned());
        let entry = PropertyEntry {
            get: make_getter(get),
            set: set.map(make_setter),
            signature,
        };

        let state = self.path_state(path);
        let mut state = state.lock().unwrap();
        state
            .interfaces
            .entry(interface.as_str().to_owned())
            .or_default()
            .properties
            .insert(member.as_str().to_owned(), entry);
        Ok(())
    }

    fn ensure_standard_interfaces(&self, path: &ObjectPath) {
        {
            let mut installed = self.standard_installed.lock().unwrap();
            if !installed.insert(path.to_owned()) {
                return;
            }
        }
        self.install_peer(path);
        self.install_introspectable(path);
        self.install_properties(path);
    }

    fn install_peer(&self, path: &ObjectPath) {
        let connection = self.connection.clone();
        let interface = InterfaceName::new("org.freedesktop.DBus.Peer").unwrap().to_owned();
        self.connection.add_path_handler(path, move |message: &Message| {
            if message.message_type() != MessageType::METHOD_CALL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match message.member().map(MemberName::as_str) {
                Some("Ping") => match Message::method_return(message).build(0).and_then(|m| connection.send(m)) {
                    Ok(_) => HandlerResult::Handled,
                    Err(_) => HandlerResult::NeedMemory,
                },
                Some("GetMachineId") => {
                    let id = machine_id();
                    match Message::method_return(message).arg(&id).build(0).and_then(|m| connection.send(m)) {
                        Ok(_) => HandlerResult::Handled,
                        Err(_) => HandlerResult::NeedMemory,
                    }
                }
                _ => HandlerResult::NotYet,
            }
        });
    }

    fn install_introspectable(&self, path: &ObjectPath) {
        let connection = self.connection.clone();
        let state = self.path_state(path);
        let interface = InterfaceName::new("org.freedesktop.DBus.Introspectable").unwrap().to_owned();
        self.connection.add_path_handler(path, move |message: &Message| {
            if message.message_type() != MessageType::METHOD_CALL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            if message.member().map(MemberName::as_str) != Some("Introspect") {
                return HandlerResult::NotYet;
            }
            let xml = introspect::render(&state.lock().unwrap());
            match Message::method_return(message).arg(&xml).build(0).and_then(|m| connection.send(m)) {
                Ok(_) => HandlerResult::Handled,
                Err(_) => HandlerResult::NeedMemory,
            }
        });
    }

    fn install_properties(&self, path: &ObjectPath) {
        let connection = self.connection.clone();
        let state = self.path_state(path);
        let path_owned = path.to_owned();
        let interface = InterfaceName::new("org.freedesktop.DBus.Properties").unwrap().to_owned();
        self.connection.add_path_handler(path, move |message: &Message| {
            if message.message_type() != MessageType::METHOD_CALL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match message.member().map(MemberName::as_str) {
                Some("Get") => handle_get(&connection, &state, message),
                Some("Set") => handle_set(&connection, &state, message, path_owned.as_path()),
                Some("GetAll") => handle_get_all(&connection, &state, message),
                _ => HandlerResult::NotYet,
            }
        });
    }
}

fn make_getter<T>(get: impl Fn() -> Result<T> + Send + Sync + 'static) -> PropertyGetter
where
    T: Arg + 'static,
{
    Box::new(move |writer: &mut BodyWriter| {
        let value = get()?;
        let sig = value.signature().into_owned();
        // Bypass the signature tracker: the caller is responsible for
        // this closure's one `v` code, whether that's the sole top-level
        // argument (`Get`) or one dict-entry value among several
        // (`GetAll`), exactly as `Value`'s own variant arm does in
        // `arg/dynamic.rs`.
        writer.writer.write_signature_bytes(sig.as_bytes());
        writer.write_data_only(&value)
    })
}

fn make_setter<T>(set: impl Fn(T) -> Result<()> + Send + Sync + 'static) -> PropertySetter
where
    T: Arg + for<'de> ReadArg<'de> + 'static,
{
    Box::new(move |reader: &mut BodyReader<'_>| {
        let Variant(value) = Variant::<T>::read(reader)?;
        set(value)
    })
}

fn read_two_strings(reader: &mut BodyReader<'_>) -> Result<(String, String)> {
    let a = String::read(reader)?;
    let b = String::read(reader)?;
    Ok((a, b))
}

fn write_all_properties(writer: &mut BodyWriter, iface: &InterfaceEntry) -> Result<()> {
    let elem_sig = Signature::new(b"{sv}")?.to_owned();
    let mark = writer.open_array(elem_sig.as_signature())?;
    for (name, entry) in &iface.properties {
        writer.align_data(8);
        if let Err(e) = writer.write_data_only(name) {
            writer.abandon(mark);
            return Err(e);
        }
        if let Err(e) = (entry.get)(writer) {
            writer.abandon(mark);
            return Err(e);
        }
    }
    writer.close_array(mark)
}

fn handle_get(connection: &Arc<Connection>, state: &Arc<Mutex<PathState>>, message: &Message) -> HandlerResult {
    let mut reader = message.reader();
    let (target_interface, name) = match read_two_strings(&mut reader) {
        Ok(v) => v,
        Err(_) => return reply_error(connection, message, ErrorKind::InvalidArgs.at()),
    };

    let guard = state.lock().unwrap();
    let Some(entry) = guard.interfaces.get(&target_interface).and_then(|i| i.properties.get(&name)) else {
        drop(guard);
        return reply_error(connection, message, ErrorKind::UnknownProperty.at());
    };

    let mut writer = BodyWriter::new();
    writer.push_basic_code(b'v');
    let result = (entry.get)(&mut writer);
    drop(guard);
    if let Err(e) = result {
        return reply_error(connection, message, e);
    }

    let reply = Message::from_parts(
        MessageKind::MethodReturn { reply_serial: message.serial() },
        0,
        Flags::EMPTY,
        None,
        message.sender().map(|s| s.to_owned()),
        writer,
    );
    match reply.and_then(|m| connection.send(m)) {
        Ok(_) => HandlerResult::Handled,
        Err(_) => HandlerResult::NeedMemory,
    }
}

fn handle_set(
    connection: &Arc<Connection>,
    state: &Arc<Mutex<PathState>>,
    message: &Message,
    path: &ObjectPath,
) -> HandlerResult {
    let mut reader = message.reader();
    let (target_interface, name) = match read_two_strings(&mut reader) {
        Ok(v) => v,
        Err(_) => return reply_error(connection, message, ErrorKind::InvalidArgs.at()),
    };

    let guard = state.lock().unwrap();
    let Some(entry) = guard.interfaces.get(&target_interface).and_then(|i| i.properties.get(&name)) else {
        drop(guard);
        return reply_error(connection, message, ErrorKind::UnknownProperty.at());
    };
    let Some(setter) = entry.set.as_ref() else {
        drop(guard);
        return reply_error(connection, message, ErrorKind::PropertyReadOnly.at());
    };

    let result = setter(&mut reader);
    if result.is_ok() {
        let _ = emit_properties_changed(connection, path, &target_interface, &name, entry);
    }
    drop(guard);

    match result {
        Ok(()) => match Message::method_return(message).build(0).and_then(|m| connection.send(m)) {
            Ok(_) => HandlerResult::Handled,
            Err(_) => HandlerResult::NeedMemory,
        },
        Err(e) => reply_error(connection, message, e),
    }
}

fn handle_get_all(connection: &Arc<Connection>, state: &Arc<Mutex<PathState>>, message: &Message) -> HandlerResult {
    let mut reader = message.reader();
    let target_interface = match String::read(&mut reader) {
        Ok(v) => v,
        Err(_) => return reply_error(connection, message, ErrorKind::InvalidArgs.at()),
    };

    let guard = state.lock().unwrap();
    let Some(iface) = guard.interfaces.get(&target_interface) else {
        drop(guard);
        return reply_error(connection, message, ErrorKind::UnknownInterface.at());
    };

    let mut writer = BodyWriter::new();
    let result = write_all_properties(&mut writer, iface);
    drop(guard);
    if let Err(e) = result {
        return reply_error(connection, message, e);
    }

    let reply = Message::from_parts(
        MessageKind::MethodReturn { reply_serial: message.serial() },
        0,
        Flags::EMPTY,
        None,
        message.sender().map(|s| s.to_owned()),
        writer,
    );
    match reply.and_then(|m| connection.send(m)) {
        Ok(_) => HandlerResult::Handled,
        Err(_) => HandlerResult::NeedMemory,
    }
}

/// Emit `PropertiesChanged(interface, {name: value}, [])` for one
/// just-written property.
fn emit_properties_changed(
    connection: &Arc<Connection>,
    path: &ObjectPath,
    interface: &str,
    name: &str,
    entry: &PropertyEntry,
) -> Result<()> {
    let mut writer = BodyWriter::new();
    writer.write_str(interface);

    let elem_sig = Signature::new(b"{sv}")?.to_owned();
    let mark = writer.open_array(elem_sig.as_signature())?;
    writer.align_data(8);
    if let Err(e) = writer.write_data_only(&name.to_owned()) {
        writer.abandon(mark);
        return Err(e);
    }
    if let Err(e) = (entry.get)(&mut writer) {
        writer.abandon(mark);
        return Err(e);
    }
    writer.close_array(mark)?;

    let invalidated: Vec<String> = Vec::new();
    invalidated.write(&mut writer)?;

    let properties_interface = InterfaceName::new("org.freedesktop.DBus.Properties")?;
    let changed_member = MemberName::new("PropertiesChanged")?;
    let message = Message::from_parts(
        MessageKind::Signal {
            path: path.to_owned(),
            interface: properties_interface.to_owned(),
            member: changed_member.to_owned(),
        },
        0,
        Flags::EMPTY,
        None,
        None,
        writer,
    )?;
    connection.send(message)?;
    Ok(())
}

fn reply_error(connection: &Arc<Connection>, call: &Message, error: crate::Error) -> HandlerResult {
    let name = match ErrorName::new(error.error_name()) {
        Ok(n) => n,
        Err(_) => return HandlerResult::NeedMemory,
    };
    let text = error.to_string();
    let reply = Message::error_reply(call, name).arg(&text).build(0);
    match reply.and_then(|m| connection.send(m)) {
        Ok(_) => HandlerResult::Handled,
        Err(_) => HandlerResult::NeedMemory,
    }
}

fn machine_id() -> String {
    std::fs::read_to_string("/etc/machine-id")
        .map(|s| s.trim().to_owned())
        .unwrap_or_else(|_| "0".repeat(32))
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;
    use crate::proxy::properties::read_variant_map;

    use super::*;

    #[test]
    fn getter_writes_a_standalone_variant_reply() {
        let getter = make_getter(|| Ok(42i32));
        let mut writer = BodyWriter::new();
        writer.push_basic_code(b'v');
        getter(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "v");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        let Variant(value) = Variant::<i32>::read(&mut reader).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn setter_reads_back_a_variant_argument() {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let setter = make_setter(move |value: i32| {
            *recorder.lock().unwrap() = Some(value);
            Ok(())
        });

        let mut writer = BodyWriter::new();
        Variant(7i32).write(&mut writer).unwrap();
        let (bytes, _sig) = writer.into_body().unwrap();
        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        setter(&mut reader).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(7));
    }

    #[test]
    fn write_all_properties_produces_a_string_variant_dict() {
        let mut iface = InterfaceEntry::default();
        iface.properties.insert(
            "Name".to_owned(),
            PropertyEntry {
                get: make_getter(|| Ok(String::from("widget"))),
                set: None,
                signature: Signature::new(b"s").unwrap().to_owned(),
            },
        );

        let mut writer = BodyWriter::new();
        write_all_properties(&mut writer, &iface).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "a{sv}");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        let map = read_variant_map(&mut reader).unwrap();
        match map.get("Name") {
            Some(crate::arg::Value::String(s)) => assert_eq!(s, "widget"),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn introspection_xml_lists_methods_signals_and_properties() {
        let mut state = PathState::default();
        let mut iface = InterfaceEntry::default();
        iface.methods.push("Double".to_owned());
        iface.signals.push("Pinged".to_owned());
        iface.properties.insert(
            "Name".to_owned(),
            PropertyEntry {
                get: make_getter(|| Ok(String::from("widget"))),
                set: None,
                signature: Signature::new(b"s").unwrap().to_owned(),
            },
        );
        state.interfaces.insert("com.example.Widget".to_owned(), iface);

        let xml = introspect::render(&state);
        assert!(xml.contains("<interface name=\"com.example.Widget\">"));
        assert!(xml.contains("<method name=\"Double\"/>"));
        assert!(xml.contains("<signal name=\"Pinged\"/>"));
        assert!(xml.contains("<property name=\"Name\" type=\"s\" access=\"read\"/>"));
    }

    fn private_connection() -> Arc<Connection> {
        let (a, _b) = std::os::unix::net::UnixStream::pair().unwrap();
        Arc::new(crate::ConnectionBuilder::transport(a).private().connect().unwrap())
    }

    #[test]
    fn registering_a_signal_through_the_real_api_shows_up_in_introspection() {
        let object_server = ObjectServer::new(private_connection());
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let interface = InterfaceName::new("com.example.Widget").unwrap();
        let member = MemberName::new("Pinged").unwrap();

        object_server.signal::<(), _>(path, interface, member, false, |_| {}).unwrap();

        let state = object_server.path_state(path);
        let xml = introspect::render(&state.lock().unwrap());
        assert!(xml.contains("<signal name=\"Pinged\"/>"));
    }
}
