use crate::arg::{Arg, BodyWriter};
use crate::error::Result;
use crate::names::{BusName, ErrorName, InterfaceName, MemberName, OwnedBusName};
use crate::object_path::ObjectPath;
use crate::protocol::Flags;

use super::{Message, MessageKind};

/// Incrementally composes a [`Message`], the way a caller builds up a
/// method call's arguments before handing it to a connection to send.
///
/// Argument types are appended in order with [`MessageBuilder::arg`]; the
/// body's signature is derived entirely from what gets written, there is
/// no separate place to get out of sync with it.
pub struct MessageBuilder {
    kind: MessageKind,
    flags: Flags,
    destination: Option<OwnedBusName>,
    sender: Option<OwnedBusName>,
    writer: BodyWriter,
    error: Option<crate::Error>,
}

impl MessageBuilder {
    fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            flags: Flags::EMPTY,
            destination: None,
            sender: None,
            writer: BodyWriter::new(),
            error: None,
        }
    }

    pub fn method_call(path: &ObjectPath, member: &MemberName) -> Self {
        Self::new(MessageKind::MethodCall {
            path: path.to_owned(),
            interface: None,
            member: member.to_owned(),
        })
    }

    pub fn signal(path: &ObjectPath, interface: &InterfaceName, member: &MemberName) -> Self {
        Self::new(MessageKind::Signal {
            path: path.to_owned(),
            interface: interface.to_owned(),
            member: member.to_owned(),
        })
    }

    pub fn method_return(reply_serial: u32) -> Self {
        Self::new(MessageKind::MethodReturn { reply_serial })
    }

    pub fn error_reply(reply_serial: u32, error_name: &ErrorName) -> Self {
        Self::new(MessageKind::Error {
            reply_serial,
            error_name: error_name.to_owned(),
        })
    }

    /// Set the target interface of a method call (optional on the wire,
    /// but required in practice whenever a destination implements more
    /// than one interface with the same method name).
    pub fn interface(mut self, interface: &InterfaceName) -> Self {
        if let MessageKind::MethodCall { interface: slot, .. } = &mut self.kind {
            *slot = Some(interface.to_owned());
        }
        self
    }

    pub fn destination(mut self, name: &BusName) -> Self {
        self.destination = Some(name.to_owned());
        self
    }

    pub(crate) fn sender(mut self, name: &BusName) -> Self {
        self.sender = Some(name.to_owned());
        self
    }

    pub fn no_reply_expected(mut self) -> Self {
        self.flags = self.flags | Flags::NO_REPLY_EXPECTED;
        self
    }

    pub fn no_auto_start(mut self) -> Self {
        self.flags = self.flags | Flags::NO_AUTO_START;
        self
    }

    pub fn allow_interactive_authorization(mut self) -> Self {
        self.flags = self.flags | Flags::ALLOW_INTERACTIVE_AUTHORIZATION;
        self
    }

    /// Append one more argument to the body. Errors (e.g. a mismatched
    /// array element signature) are deferred to [`Self::build`] so calls
    /// can still be chained fluently.
    pub fn arg<T: Arg + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_none() {
            if let Err(e) = value.write(&mut self.writer) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn build(self, serial: u32) -> Result<Message> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Message::from_parts(
            self.kind,
            serial,
            self.flags,
            self.sender,
            self.destination,
            self.writer,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::names::{BusName, MemberName};
    use crate::object_path::ObjectPath;

    use super::*;

    #[test]
    fn method_call_with_no_args_has_empty_signature() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let message = MessageBuilder::method_call(path, member).build(1).unwrap();
        assert_eq!(message.body_signature().as_str(), "");
    }

    #[test]
    fn arg_appends_to_the_body_signature() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Double").unwrap();
        let message = MessageBuilder::method_call(path, member)
            .arg(&21i32)
            .build(1)
            .unwrap();
        assert_eq!(message.body_signature().as_str(), "i");
    }

    #[test]
    fn destination_and_no_reply_expected_flag_are_recorded() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let destination = BusName::new("com.example.Target").unwrap();
        let message = MessageBuilder::method_call(path, member)
            .destination(destination)
            .no_reply_expected()
            .build(1)
            .unwrap();
        assert_eq!(message.destination().unwrap().as_str(), "com.example.Target");
        assert!(message.no_reply_expected());
    }
}
