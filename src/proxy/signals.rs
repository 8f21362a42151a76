//! The signals view of a [`Proxy`] (§4.F): fire-and-forget emission, plus
//! connecting a typed handler at the proxy's own path.

use std::sync::Mutex;

use crate::arg::{Arg, ReadArg};
use crate::connection::HandlerResult;
use crate::error::Result;
use crate::message::Message;
use crate::names::{InterfaceName, MemberName, OwnedInterfaceName, OwnedMemberName};

use super::Proxy;

pub struct Signals<'p> {
    proxy: &'p Proxy,
    interface: OwnedInterfaceName,
}

impl<'p> Signals<'p> {
    pub(crate) fn new(proxy: &'p Proxy, interface: OwnedInterfaceName) -> Self {
        Self { proxy, interface }
    }

    pub fn interface(&self) -> &InterfaceName {
        self.interface.as_borrowed()
    }

    /// Emit `member` as a signal from the proxy's path, fire-and-forget
    /// (§4.F "sends fire-and-forget").
    pub fn emit<Args: Arg>(&self, member: &MemberName, args: Args) -> Result<()> {
        let message = Message::signal(self.proxy.path(), self.interface.as_borrowed(), member)
            .arg(&args)
            .build(0)?;
        self.proxy.connection().send(message)?;
        Ok(())
    }

    /// Install a handler at the proxy's path that matches this interface
    /// and `member`, decodes the signal payload as `T`, and invokes
    /// `callback` (§4.F "matches interface+member and decodes the typed
    /// signal payload").
    ///
    /// The handler claims (`Handled`) every signal matching interface and
    /// member so a later handler registered at the same path doesn't see
    /// it twice; anything else passes through as `NotYet`.
    pub fn connect<T, F>(&self, member: &MemberName, callback: F) -> Result<()>
    where
        T: for<'de> ReadArg<'de>,
        F: FnMut(T) + Send + 'static,
    {
        let interface = self.interface.clone();
        let member: OwnedMemberName = member.to_owned();
        let callback = Mutex::new(callback);
        self.proxy.connection().add_path_handler(self.proxy.path(), move |message: &Message| {
            if message.interface() != Some(interface.as_borrowed()) || message.member() != Some(member.as_borrowed()) {
                return HandlerResult::NotYet;
            }
            match message.read::<T>() {
                Ok(value) => {
                    (callback.lock().unwrap())(value);
                    HandlerResult::Handled
                }
                Err(_) => HandlerResult::NeedMemory,
            }
        });
        Ok(())
    }
}
