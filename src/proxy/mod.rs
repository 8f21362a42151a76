//! The client facade: call methods, emit/connect signals, and get/set
//! properties on a remote object (§4.F).

mod methods;
pub(crate) mod properties;
mod signals;

pub use methods::Methods;
pub use properties::Properties;
pub use signals::Signals;

use std::sync::Arc;

use crate::connection::{CallTimeout, Connection};
use crate::names::{BusName, InterfaceName, OwnedBusName, OwnedInterfaceName};
use crate::object_path::{ObjectPath, OwnedObjectPath};

/// A client-side handle to a single remote object on a single
/// destination, bound to one connection (§4.F).
///
/// A `Proxy` by itself only remembers *where* a call goes; the actual
/// method/signal/property operations live on the three views returned by
/// [`Proxy::methods`], [`Proxy::signals`], and [`Proxy::properties`], each
/// scoped to one interface at a time.
#[derive(Clone)]
pub struct Proxy {
    connection: Arc<Connection>,
    destination: OwnedBusName,
    path: OwnedObjectPath,
    timeout: CallTimeout,
}

impl Proxy {
    pub fn new(connection: Arc<Connection>, destination: &BusName, path: &ObjectPath) -> Self {
        Self {
            connection,
            destination: destination.to_owned(),
            path: path.to_owned(),
            timeout: CallTimeout::UseDefault,
        }
    }

    pub fn with_timeout(mut self, timeout: CallTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn destination(&self) -> &BusName {
        &self.destination
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// The methods view for `interface` on this object.
    pub fn methods(&self, interface: &InterfaceName) -> Methods<'_> {
        Methods::new(self, interface.to_owned())
    }

    /// The signals view for `interface` on this object.
    pub fn signals(&self, interface: &InterfaceName) -> Signals<'_> {
        Signals::new(self, interface.to_owned())
    }

    /// The `org.freedesktop.DBus.Properties` view for `interface` on this
    /// object.
    pub fn properties(&self, interface: &InterfaceName) -> Properties<'_> {
        Properties::new(self, interface.to_owned())
    }

    pub(crate) fn timeout(&self) -> CallTimeout {
        self.timeout
    }
}

pub(crate) fn properties_interface() -> OwnedInterfaceName {
    InterfaceName::new("org.freedesktop.DBus.Properties").unwrap().to_owned()
}
