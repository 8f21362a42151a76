//! The properties view of a [`Proxy`] (§4.F): `Get`/`Set`/`GetAll` against
//! the standard `org.freedesktop.DBus.Properties` interface, plus
//! `PropertiesChanged` subscription.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::arg::{Arg, BodyReader, ReadArg, Value, Variant};
use crate::connection::HandlerResult;
use crate::error::{ErrorKind, Result};
use crate::message::Message;
use crate::names::{InterfaceName, MemberName, OwnedInterfaceName};

use super::{properties_interface, Proxy};

pub struct Properties<'p> {
    proxy: &'p Proxy,
    interface: OwnedInterfaceName,
}

impl<'p> Properties<'p> {
    pub(crate) fn new(proxy: &'p Proxy, interface: OwnedInterfaceName) -> Self {
        Self { proxy, interface }
    }

    pub fn interface(&self) -> &InterfaceName {
        self.interface.as_borrowed()
    }

    /// Read one property's value, decoded as `T` (§4.F "get/set delegate
    /// to the D-Bus `Properties` standard interface ... using a Variant
    /// wrapper").
    pub fn get<T>(&self, name: &MemberName) -> Result<T>
    where
        T: for<'de> ReadArg<'de>,
    {
        let member = MemberName::new("Get").unwrap();
        let properties = properties_interface();
        let message = Message::method_call(self.proxy.path(), member)
            .interface(properties.as_borrowed())
            .destination(self.proxy.destination())
            .arg(&self.interface.as_str())
            .arg(&name.as_str())
            .build(0)?;
        let reply = self
            .proxy
            .connection()
            .send_with_reply_blocking(message, self.proxy.timeout())?;
        let Variant(value): Variant<T> = reply.read()?;
        Ok(value)
    }

    /// Write one property's value. The destination may reject with
    /// `PropertyReadOnly` or `InvalidArgs` (§4.F).
    pub fn set<T: Arg>(&self, name: &MemberName, value: T) -> Result<()> {
        let member = MemberName::new("Set").unwrap();
        let properties = properties_interface();
        let message = Message::method_call(self.proxy.path(), member)
            .interface(properties.as_borrowed())
            .destination(self.proxy.destination())
            .arg(&self.interface.as_str())
            .arg(&name.as_str())
            .arg(&Variant(value))
            .build(0)?;
        self.proxy
            .connection()
            .send_with_reply_blocking(message, self.proxy.timeout())?;
        Ok(())
    }

    /// Read every property on this interface as a name → dynamic value
    /// map.
    pub fn get_all(&self) -> Result<HashMap<String, Value>> {
        let member = MemberName::new("GetAll").unwrap();
        let properties = properties_interface();
        let message = Message::method_call(self.proxy.path(), member)
            .interface(properties.as_borrowed())
            .destination(self.proxy.destination())
            .arg(&self.interface.as_str())
            .build(0)?;
        let reply = self
            .proxy
            .connection()
            .send_with_reply_blocking(message, self.proxy.timeout())?;
        let mut reader = reply.reader();
        read_variant_map(&mut reader)
    }

    /// Subscribe to `PropertiesChanged` for this interface. `on_changed`
    /// receives the changed properties (decoded as dynamic values) and
    /// the names whose values were invalidated and must be re-fetched
    /// (§4.F "decodes `(interface, changed:map<name,variant>,
    /// invalidated:list<name>)`, filters by interface").
    pub fn watch_changes<F>(&self, on_changed: F) -> Result<()>
    where
        F: FnMut(&HashMap<String, Value>, &[String]) + Send + 'static,
    {
        let interface = self.interface.clone();
        let properties = properties_interface();
        let member = MemberName::new("PropertiesChanged").unwrap().to_owned();
        let handler = Mutex::new(on_changed);
        self.proxy.connection().add_path_handler(self.proxy.path(), move |message: &Message| {
            if message.interface() != Some(properties.as_borrowed()) || message.member() != Some(member.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match read_properties_changed(message) {
                Ok((changed_interface, changed, invalidated)) => {
                    if changed_interface != interface.as_str() {
                        return HandlerResult::NotYet;
                    }
                    (handler.lock().unwrap())(&changed, &invalidated);
                    HandlerResult::Handled
                }
                Err(_) => HandlerResult::NeedMemory,
            }
        });
        Ok(())
    }
}

/// Decode a message body whose top-level shape is `sv`* as a name → value
/// map. Deliberately doesn't go through the generic tuple `ReadArg` path
/// (which models a nested struct): `a{sv}` bodies here are either the sole
/// top-level argument (`GetAll`'s reply) or one of several siblings
/// (`PropertiesChanged`'s second argument), so the array is read directly
/// off the cursor the way [`super::signals`] and `message/wire.rs` already
/// hand-decode header fields for the same structural reason.
pub(crate) fn read_variant_map(reader: &mut BodyReader<'_>) -> Result<HashMap<String, Value>> {
    let (len, _) = reader.open_array()?;
    reader.open_struct()?;
    let start = reader.position();
    let end = start + len as usize;

    let mut out = HashMap::new();
    while reader.position() < end {
        reader.open_dict_entry()?;
        let key = reader.read_str()?.to_owned();
        let sig = reader.read_variant_signature()?;
        let value = Value::read_with_signature(reader, sig.as_signature())?;
        out.insert(key, value);
    }
    if reader.position() != end {
        return Err(ErrorKind::TypeMismatch.at());
    }
    Ok(out)
}

/// Decode a `PropertiesChanged(s,a{sv},as)` body, reading each of its
/// three top-level arguments in sequence.
fn read_properties_changed(message: &Message) -> Result<(String, HashMap<String, Value>, Vec<String>)> {
    let mut reader = message.reader();
    let interface = String::read(&mut reader)?;
    let changed = read_variant_map(&mut reader)?;
    let invalidated = Vec::<String>::read(&mut reader)?;
    Ok((interface, changed, invalidated))
}

/// Shared by the skeleton side: the standard error raised for a get/set
/// against a property nobody registered.
pub(crate) fn unknown_property() -> crate::Error {
    ErrorKind::UnknownProperty.at()
}
