//! The owned, inspectable unit of D-Bus communication (§3/§4.B).
//!
//! A [`Message`] owns every byte it references (no borrow of a shared
//! receive buffer survives past decoding), so it can be moved across
//! threads, queued, and handed to more than one handler without the
//! lifetime gymnastics a zero-copy `Message<'a>` would otherwise force on
//! every API that touches one.

mod builder;
mod wire;

pub use self::builder::MessageBuilder;

use std::fmt;

use crate::arg::{BodyReader, BodyWriter, ReadArg};
use crate::error::Result;
use crate::names::{BusName, ErrorName, InterfaceName, MemberName, OwnedBusName, OwnedErrorName, OwnedInterfaceName, OwnedMemberName};
use crate::object_path::{ObjectPath, OwnedObjectPath};
use crate::protocol::{Endianness, Flags, MessageType};
use crate::signature::{OwnedSignature, Signature};

/// The kind-specific fields of a [`Message`] (§4.B).
#[derive(Debug, Clone)]
pub enum MessageKind {
    MethodCall {
        path: OwnedObjectPath,
        interface: Option<OwnedInterfaceName>,
        member: OwnedMemberName,
    },
    MethodReturn {
        reply_serial: u32,
    },
    Error {
        reply_serial: u32,
        error_name: OwnedErrorName,
    },
    Signal {
        path: OwnedObjectPath,
        interface: OwnedInterfaceName,
        member: OwnedMemberName,
    },
}

impl MessageKind {
    pub(crate) fn message_type(&self) -> MessageType {
        match self {
            MessageKind::MethodCall { .. } => MessageType::METHOD_CALL,
            MessageKind::MethodReturn { .. } => MessageType::METHOD_RETURN,
            MessageKind::Error { .. } => MessageType::ERROR,
            MessageKind::Signal { .. } => MessageType::SIGNAL,
        }
    }
}

/// A fully owned D-Bus message: a method call, return, error, or signal.
#[derive(Clone)]
pub struct Message {
    pub(crate) kind: MessageKind,
    pub(crate) serial: u32,
    pub(crate) flags: Flags,
    pub(crate) sender: Option<OwnedBusName>,
    pub(crate) destination: Option<OwnedBusName>,
    pub(crate) body: Vec<u8>,
    pub(crate) body_signature: OwnedSignature,
    pub(crate) endianness: Endianness,
}

impl Message {
    /// Start building a method call to `member` on `path`.
    pub fn method_call(path: &ObjectPath, member: &MemberName) -> MessageBuilder {
        MessageBuilder::method_call(path, member)
    }

    /// Start building a signal emission.
    pub fn signal(path: &ObjectPath, interface: &InterfaceName, member: &MemberName) -> MessageBuilder {
        MessageBuilder::signal(path, interface, member)
    }

    /// Start building the successful reply to `call`.
    pub fn method_return(call: &Message) -> MessageBuilder {
        MessageBuilder::method_return(call.serial)
    }

    /// Start building an error reply to `call`.
    pub fn error_reply(call: &Message, error_name: &ErrorName) -> MessageBuilder {
        MessageBuilder::error_reply(call.serial, error_name)
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn message_type(&self) -> MessageType {
        self.kind.message_type()
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Overwrite the serial a connection stamps a message with right
    /// before sending it (§4.D: the connection, not the builder, is the
    /// allocator of record for serials actually placed on the wire).
    pub(crate) fn set_serial(&mut self, serial: u32) {
        self.serial = serial;
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn path(&self) -> Option<&ObjectPath> {
        match &self.kind {
            MessageKind::MethodCall { path, .. } | MessageKind::Signal { path, .. } => {
                Some(path.as_path())
            }
            _ => None,
        }
    }

    pub fn interface(&self) -> Option<&InterfaceName> {
        match &self.kind {
            MessageKind::MethodCall { interface, .. } => interface.as_deref(),
            MessageKind::Signal { interface, .. } => Some(interface.as_borrowed()),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&MemberName> {
        match &self.kind {
            MessageKind::MethodCall { member, .. } | MessageKind::Signal { member, .. } => {
                Some(member.as_borrowed())
            }
            _ => None,
        }
    }

    pub fn error_name(&self) -> Option<&ErrorName> {
        match &self.kind {
            MessageKind::Error { error_name, .. } => Some(error_name.as_borrowed()),
            _ => None,
        }
    }

    pub fn reply_serial(&self) -> Option<u32> {
        match &self.kind {
            MessageKind::MethodReturn { reply_serial } | MessageKind::Error { reply_serial, .. } => {
                Some(*reply_serial)
            }
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&BusName> {
        self.sender.as_deref()
    }

    pub fn destination(&self) -> Option<&BusName> {
        self.destination.as_deref()
    }

    pub fn body_signature(&self) -> &Signature {
        self.body_signature.as_signature()
    }

    pub fn no_reply_expected(&self) -> bool {
        self.flags & Flags::NO_REPLY_EXPECTED
    }

    /// A cursor over the message body for manual, streaming decoding.
    pub fn reader(&self) -> BodyReader<'_> {
        BodyReader::new(&self.body, self.endianness)
    }

    /// Decode the whole body as a single argument (or a tuple of them).
    pub fn read<'de, T>(&'de self) -> Result<T>
    where
        T: ReadArg<'de>,
    {
        let mut reader = self.reader();
        T::read(&mut reader)
    }

    pub(crate) fn from_parts(
        kind: MessageKind,
        serial: u32,
        flags: Flags,
        sender: Option<OwnedBusName>,
        destination: Option<OwnedBusName>,
        writer: BodyWriter,
    ) -> Result<Self> {
        let (body, body_signature) = writer.into_body()?;
        Ok(Self {
            kind,
            serial,
            flags,
            sender,
            destination,
            body,
            body_signature,
            endianness: Endianness::NATIVE,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::names::{ErrorName, MemberName};
    use crate::object_path::ObjectPath;

    use super::*;

    #[test]
    fn method_call_accessors_report_their_fields() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let message = Message::method_call(path, member).build(1).unwrap();

        assert_eq!(message.message_type(), MessageType::METHOD_CALL);
        assert_eq!(message.path().unwrap().as_str(), "/com/example/Widget");
        assert_eq!(message.member().unwrap().as_str(), "Ping");
        assert!(message.interface().is_none());
        assert!(message.error_name().is_none());
        assert!(message.reply_serial().is_none());
    }

    #[test]
    fn error_reply_reports_its_error_name_and_reply_serial() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let call = Message::method_call(path, member).build(4).unwrap();

        let error_name = ErrorName::new("com.example.Error.Failed").unwrap();
        let reply = Message::error_reply(&call, error_name).build(8).unwrap();

        assert_eq!(reply.message_type(), MessageType::ERROR);
        assert_eq!(reply.reply_serial(), Some(4));
        assert_eq!(reply.error_name().unwrap().as_str(), "com.example.Error.Failed");
    }

    #[test]
    fn reader_decodes_the_body_written_by_the_builder() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Double").unwrap();
        let message = Message::method_call(path, member).arg(&21i32).build(1).unwrap();

        let mut reader = message.reader();
        let value = i32::read(&mut reader).unwrap();
        assert_eq!(value, 21);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("serial", &self.serial)
            .field("flags", &self.flags)
            .field("sender", &self.sender.as_ref().map(|s| s.as_str()))
            .field("destination", &self.destination.as_ref().map(|s| s.as_str()))
            .field("body_signature", &self.body_signature)
            .finish()
    }
}
