//! A fixed proxy pointing at the bus daemon itself (§4.I): the standard
//! `org.freedesktop.DBus` methods and signals every connection can reach
//! regardless of what else is registered.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arg::{BodyReader, ReadArg, Value};
use crate::connection::{Connection, HandlerResult};
use crate::error::Result;
use crate::match_rule::MatchRule;
use crate::message::Message;
use crate::names::{BusName, InterfaceName, MemberName};
use crate::object_path::ObjectPath;
use crate::protocol::MessageType;
use crate::proxy::properties::read_variant_map;
use crate::proxy::{Methods, Proxy, Signals};

fn bus_destination() -> &'static BusName {
    BusName::new("org.freedesktop.DBus").unwrap()
}

fn bus_path() -> &'static ObjectPath {
    ObjectPath::new("/org/freedesktop/DBus").unwrap()
}

fn bus_interface() -> &'static InterfaceName {
    InterfaceName::new("org.freedesktop.DBus").unwrap()
}

/// The bus daemon's own object, reached the same way as any other
/// [`Proxy`] target — it just happens to sit at a name, path, and
/// interface fixed by the protocol rather than chosen by the caller.
pub struct Bus {
    proxy: Proxy,
}

impl Bus {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            proxy: Proxy::new(connection, bus_destination(), bus_path()),
        }
    }

    fn methods(&self) -> Methods<'_> {
        self.proxy.methods(bus_interface())
    }

    fn signals(&self) -> Signals<'_> {
        self.proxy.signals(bus_interface())
    }

    /// The first call any connection makes: registers a unique name and
    /// returns it.
    pub fn hello(&self) -> Result<String> {
        self.methods().call(MemberName::new("Hello")?, ())
    }

    pub fn request_name(&self, name: &BusName, flags: u32) -> Result<u32> {
        let message = self
            .methods()
            .message(MemberName::new("RequestName")?)
            .arg(&name.as_str())
            .arg(&flags)
            .build(0)?;
        self.methods().call_built(message)
    }

    pub fn release_name(&self, name: &BusName) -> Result<u32> {
        self.methods().call(MemberName::new("ReleaseName")?, name.as_str())
    }

    pub fn list_names(&self) -> Result<Vec<String>> {
        self.methods().call(MemberName::new("ListNames")?, ())
    }

    pub fn list_activatable_names(&self) -> Result<Vec<String>> {
        self.methods().call(MemberName::new("ListActivatableNames")?, ())
    }

    /// Forward an encoded rule to the bus daemon (§4.H: the rule only
    /// tells the daemon what to deliver, it never filters locally).
    pub fn add_match(&self, rule: &MatchRule) -> Result<()> {
        self.methods().call(MemberName::new("AddMatch")?, rule.encode())
    }

    pub fn remove_match(&self, rule: &MatchRule) -> Result<()> {
        self.methods().call(MemberName::new("RemoveMatch")?, rule.encode())
    }

    pub fn name_has_owner(&self, name: &BusName) -> Result<bool> {
        self.methods().call(MemberName::new("NameHasOwner")?, name.as_str())
    }

    pub fn get_name_owner(&self, name: &BusName) -> Result<String> {
        self.methods().call(MemberName::new("GetNameOwner")?, name.as_str())
    }

    pub fn start_service_by_name(&self, name: &BusName, flags: u32) -> Result<u32> {
        let message = self
            .methods()
            .message(MemberName::new("StartServiceByName")?)
            .arg(&name.as_str())
            .arg(&flags)
            .build(0)?;
        self.methods().call_built(message)
    }

    pub fn update_activation_environment(&self, env: HashMap<String, String>) -> Result<()> {
        self.methods().call(MemberName::new("UpdateActivationEnvironment")?, env)
    }

    pub fn list_queued_owners(&self, name: &BusName) -> Result<Vec<String>> {
        self.methods().call(MemberName::new("ListQueuedOwners")?, name.as_str())
    }

    pub fn get_connection_unix_user(&self, name: &BusName) -> Result<u32> {
        self.methods().call(MemberName::new("GetConnectionUnixUser")?, name.as_str())
    }

    pub fn get_connection_unix_process_id(&self, name: &BusName) -> Result<u32> {
        self.methods().call(MemberName::new("GetConnectionUnixProcessID")?, name.as_str())
    }

    pub fn get_adt_audit_session_data(&self, name: &BusName) -> Result<Vec<u8>> {
        self.methods().call(MemberName::new("GetAdtAuditSessionData")?, name.as_str())
    }

    pub fn get_connection_selinux_security_context(&self, name: &BusName) -> Result<Vec<u8>> {
        self.methods()
            .call(MemberName::new("GetConnectionSELinuxSecurityContext")?, name.as_str())
    }

    pub fn get_id(&self) -> Result<String> {
        self.methods().call(MemberName::new("GetId")?, ())
    }

    /// The connection's credentials as a name → dynamic value map (`a{sv}`,
    /// decoded the same way [`crate::proxy::Properties::get_all`] decodes
    /// its reply, since neither is a statically-typed payload).
    pub fn get_connection_credentials(&self, name: &BusName) -> Result<HashMap<String, Value>> {
        let message = self
            .methods()
            .message(MemberName::new("GetConnectionCredentials")?)
            .arg(&name.as_str())
            .build(0)?;
        let reply = self
            .proxy
            .connection()
            .send_with_reply_blocking(message, self.proxy.timeout())?;
        let mut reader = reply.reader();
        read_variant_map(&mut reader)
    }

    /// Subscribe to `NameLost`: fired at this connection when a name it
    /// held is released or stolen.
    pub fn on_name_lost<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.signals().connect(MemberName::new("NameLost")?, callback)
    }

    /// Subscribe to `NameAcquired`: fired at this connection when a name
    /// request succeeds.
    pub fn on_name_acquired<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.signals().connect(MemberName::new("NameAcquired")?, callback)
    }

    /// Subscribe to `ActivatableServicesChanged`, which carries no
    /// arguments.
    pub fn on_activatable_services_changed<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.signals()
            .connect(MemberName::new("ActivatableServicesChanged")?, move |(): ()| callback())
    }

    /// Subscribe to `NameOwnerChanged(name, old_owner, new_owner)`. Its
    /// three flat top-level strings aren't a nested struct, so this
    /// installs its own path handler directly rather than going through
    /// [`Signals::connect`]'s single-value decode (the same reasoning
    /// [`crate::proxy::Properties::watch_changes`] already applies to
    /// `PropertiesChanged`).
    pub fn on_name_owner_changed<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(String, String, String) + Send + 'static,
    {
        let interface = bus_interface().to_owned();
        let member = MemberName::new("NameOwnerChanged")?.to_owned();
        self.proxy.connection().add_path_handler(self.proxy.path(), move |message: &Message| {
            if message.message_type() != MessageType::SIGNAL {
                return HandlerResult::NotYet;
            }
            if message.interface() != Some(interface.as_borrowed()) || message.member() != Some(member.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match read_three_strings(message) {
                Ok((name, old_owner, new_owner)) => {
                    callback(name, old_owner, new_owner);
                    HandlerResult::Handled
                }
                Err(_) => HandlerResult::NeedMemory,
            }
        });
        Ok(())
    }
}

fn read_three_strings(message: &Message) -> Result<(String, String, String)> {
    let mut reader = message.reader();
    let a = read_string(&mut reader)?;
    let b = read_string(&mut reader)?;
    let c = read_string(&mut reader)?;
    Ok((a, b, c))
}

fn read_string(reader: &mut BodyReader<'_>) -> Result<String> {
    String::read(reader)
}
