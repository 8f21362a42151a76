//! Encoding a [`Message`] to its wire form and decoding it back (§3, §4.B).
//!
//! The header-fields array (`a(yv)`) is spliced into the *same* cursor as
//! the fixed header rather than built independently, because it starts at
//! absolute offset 12 — not a multiple of 8 — so its internal padding has
//! to be computed against the true start of the message. The body, by
//! contrast, always starts at an offset that is a multiple of 8 (the
//! header-fields array is padded to 8 before it), so it's built and read
//! in its own cursor starting at local offset 0 without losing alignment
//! correctness.

use crate::arg::{Arg, BodyReader, BodyWriter, Value};
use crate::buf::{Reader, Writer};
use crate::error::{ErrorKind, Result};
use crate::names::{OwnedBusName, OwnedErrorName, OwnedInterfaceName, OwnedMemberName};
use crate::object_path::OwnedObjectPath;
use crate::protocol::{Endianness, Flags, HeaderField, MessageType, PROTOCOL_VERSION};
use crate::signature::OwnedSignature;

use super::{Message, MessageKind};

impl Message {
    /// Serialize this message to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let fields = self.header_fields();

        let mut w = Writer::new();
        w.write_u8(Endianness::NATIVE.0);
        w.write_u8(self.kind.message_type().0);
        w.write_u8(self.flags.0);
        w.write_u8(PROTOCOL_VERSION);
        w.write_u32(self.body.len() as u32);
        w.write_u32(self.serial);

        let mut body_writer = BodyWriter::from_writer(w);
        fields
            .write(&mut body_writer)
            .expect("header fields are always well-formed");
        let mut w = body_writer.into_writer();
        w.align(8);
        w.write_bytes(&self.body);
        w.into_bytes()
    }

    /// Parse one complete message from the front of `bytes`, returning it
    /// together with the number of bytes consumed. A caller reading off a
    /// stream should peek the fixed header first to learn how many bytes
    /// to wait for before calling this.
    pub fn decode(bytes: &[u8]) -> Result<(Message, usize)> {
        if bytes.len() < 16 {
            return Err(ErrorKind::BufferUnderflow.at());
        }
        let endianness = match bytes[0] {
            b if b == Endianness::LITTLE.0 => Endianness::LITTLE,
            b if b == Endianness::BIG.0 => Endianness::BIG,
            _ => return Err(ErrorKind::TypeMismatch.at()),
        };

        let mut r = Reader::new(bytes, endianness);
        let _ = r.read_u8()?;
        let message_type = r.read_u8()?;
        let flags = Flags(r.read_u8()?);
        let version = r.read_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(ErrorKind::TypeMismatch.at());
        }
        let body_length = r.read_u32()?;
        let serial = r.read_u32()?;

        let mut body_reader = BodyReader::from_reader(r);
        let fields = read_header_fields(&mut body_reader)?;
        let mut r = body_reader.into_reader();
        r.align(8)?;

        let header_len = r.position();
        let body_end = header_len + body_length as usize;
        if bytes.len() < body_end {
            return Err(ErrorKind::BufferUnderflow.at());
        }
        let body = bytes[header_len..body_end].to_vec();

        let kind = build_kind(message_type, &fields)?;
        let body_signature = take_signature(&fields)?;
        let sender = take_bus_name(&fields, HeaderField::SENDER.0)?;
        let destination = take_bus_name(&fields, HeaderField::DESTINATION.0)?;

        Ok((
            Message {
                kind,
                serial,
                flags,
                sender,
                destination,
                body,
                body_signature,
                endianness,
            },
            body_end,
        ))
    }

    fn header_fields(&self) -> Vec<(u8, Value)> {
        let mut fields = Vec::new();
        match &self.kind {
            MessageKind::MethodCall {
                path,
                interface,
                member,
            } => {
                fields.push((HeaderField::PATH.0, Value::ObjectPath(path.clone())));
                if let Some(interface) = interface {
                    fields.push((
                        HeaderField::INTERFACE.0,
                        Value::String(interface.as_str().to_owned()),
                    ));
                }
                fields.push((
                    HeaderField::MEMBER.0,
                    Value::String(member.as_str().to_owned()),
                ));
            }
            MessageKind::MethodReturn { reply_serial } => {
                fields.push((HeaderField::REPLY_SERIAL.0, Value::UInt32(*reply_serial)));
            }
            MessageKind::Error {
                reply_serial,
                error_name,
            } => {
                fields.push((HeaderField::REPLY_SERIAL.0, Value::UInt32(*reply_serial)));
                fields.push((
                    HeaderField::ERROR_NAME.0,
                    Value::String(error_name.as_str().to_owned()),
                ));
            }
            MessageKind::Signal {
                path,
                interface,
                member,
            } => {
                fields.push((HeaderField::PATH.0, Value::ObjectPath(path.clone())));
                fields.push((
                    HeaderField::INTERFACE.0,
                    Value::String(interface.as_str().to_owned()),
                ));
                fields.push((
                    HeaderField::MEMBER.0,
                    Value::String(member.as_str().to_owned()),
                ));
            }
        }
        if let Some(destination) = &self.destination {
            fields.push((
                HeaderField::DESTINATION.0,
                Value::String(destination.as_str().to_owned()),
            ));
        }
        if let Some(sender) = &self.sender {
            fields.push((
                HeaderField::SENDER.0,
                Value::String(sender.as_str().to_owned()),
            ));
        }
        if !self.body.is_empty() {
            fields.push((
                HeaderField::SIGNATURE.0,
                Value::Signature(self.body_signature.clone()),
            ));
        }
        fields
    }
}

/// Read the `a(yv)` header-fields array. Each entry is a `(yv)` struct;
/// `Value`'s generic `ReadArg` always rejects (a dynamic value can only be
/// read given an externally-known signature), so entries are decoded by
/// hand here rather than through the generic `Vec<(u8, Value)>` reader,
/// the same way `dict.rs` hand-aligns its entries instead of relying on a
/// static element signature that a tuple can't provide.
fn read_header_fields(reader: &mut BodyReader<'_>) -> Result<Vec<(u8, Value)>> {
    let (len, _) = reader.open_array()?;
    reader.open_struct()?;
    let start = reader.position();
    let end = start + len as usize;

    let mut fields = Vec::new();
    while reader.position() < end {
        reader.open_struct()?;
        let code = reader.read_u8()?;
        let inner_sig = reader.read_variant_signature()?;
        let value = Value::read_with_signature(reader, inner_sig.as_signature())?;
        fields.push((code, value));
    }
    if reader.position() != end {
        return Err(ErrorKind::TypeMismatch.at());
    }
    Ok(fields)
}

fn find_field(fields: &[(u8, Value)], code: u8) -> Option<&Value> {
    fields.iter().find(|(c, _)| *c == code).map(|(_, v)| v)
}

fn take_string(fields: &[(u8, Value)], code: u8) -> Result<Option<String>> {
    match find_field(fields, code) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ErrorKind::TypeMismatch.at()),
        None => Ok(None),
    }
}

fn take_bus_name(fields: &[(u8, Value)], code: u8) -> Result<Option<OwnedBusName>> {
    match take_string(fields, code)? {
        Some(s) => Ok(Some(OwnedBusName::new(s)?)),
        None => Ok(None),
    }
}

fn take_signature(fields: &[(u8, Value)]) -> Result<OwnedSignature> {
    match find_field(fields, HeaderField::SIGNATURE.0) {
        Some(Value::Signature(sig)) => Ok(sig.clone()),
        Some(_) => Err(ErrorKind::TypeMismatch.at()),
        None => Ok(OwnedSignature::new(Vec::new())?),
    }
}

fn build_kind(message_type: u8, fields: &[(u8, Value)]) -> Result<MessageKind> {
    let path = |fields: &[(u8, Value)]| -> Result<OwnedObjectPath> {
        match find_field(fields, HeaderField::PATH.0) {
            Some(Value::ObjectPath(p)) => Ok(p.clone()),
            _ => Err(ErrorKind::InvalidArgs.at()),
        }
    };
    let member = |fields: &[(u8, Value)]| -> Result<OwnedMemberName> {
        match take_string(fields, HeaderField::MEMBER.0)? {
            Some(s) => Ok(OwnedMemberName::new(s)?),
            None => Err(ErrorKind::InvalidArgs.at()),
        }
    };
    let interface = |fields: &[(u8, Value)]| -> Result<Option<OwnedInterfaceName>> {
        match take_string(fields, HeaderField::INTERFACE.0)? {
            Some(s) => Ok(Some(OwnedInterfaceName::new(s)?)),
            None => Ok(None),
        }
    };
    let reply_serial = |fields: &[(u8, Value)]| -> Result<u32> {
        match find_field(fields, HeaderField::REPLY_SERIAL.0) {
            Some(Value::UInt32(v)) => Ok(*v),
            _ => Err(ErrorKind::InvalidArgs.at()),
        }
    };

    match message_type {
        t if t == MessageType::METHOD_CALL.0 => Ok(MessageKind::MethodCall {
            path: path(fields)?,
            interface: interface(fields)?,
            member: member(fields)?,
        }),
        t if t == MessageType::METHOD_RETURN.0 => Ok(MessageKind::MethodReturn {
            reply_serial: reply_serial(fields)?,
        }),
        t if t == MessageType::ERROR.0 => {
            let error_name = match take_string(fields, HeaderField::ERROR_NAME.0)? {
                Some(s) => OwnedErrorName::new(s)?,
                None => return Err(ErrorKind::InvalidArgs.at()),
            };
            Ok(MessageKind::Error {
                reply_serial: reply_serial(fields)?,
                error_name,
            })
        }
        t if t == MessageType::SIGNAL.0 => {
            let interface = match interface(fields)? {
                Some(i) => i,
                None => return Err(ErrorKind::InvalidArgs.at()),
            };
            Ok(MessageKind::Signal {
                path: path(fields)?,
                interface,
                member: member(fields)?,
            })
        }
        _ => Err(ErrorKind::TypeMismatch.at()),
    }
}

#[cfg(test)]
mod tests {
    use crate::names::{BusName, InterfaceName, MemberName};
    use crate::object_path::ObjectPath;

    use super::*;

    #[test]
    fn method_call_survives_an_encode_decode_round_trip() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let interface = InterfaceName::new("com.example.Widget").unwrap();
        let member = MemberName::new("Double").unwrap();
        let destination = BusName::new("com.example.Target").unwrap();

        let message = Message::method_call(path, member)
            .interface(interface)
            .destination(destination)
            .arg(&21i32)
            .build(7)
            .unwrap();

        let encoded = message.encode();
        let (decoded, consumed) = Message::decode(&encoded).unwrap();

        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.serial(), 7);
        assert_eq!(decoded.path().unwrap().as_str(), "/com/example/Widget");
        assert_eq!(decoded.interface().unwrap().as_str(), "com.example.Widget");
        assert_eq!(decoded.member().unwrap().as_str(), "Double");
        assert_eq!(decoded.destination().unwrap().as_str(), "com.example.Target");
        let value: i32 = decoded.read().unwrap();
        assert_eq!(value, 21);
    }

    #[test]
    fn signal_preserves_interface_and_member() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let interface = InterfaceName::new("com.example.Widget").unwrap();
        let member = MemberName::new("Pinged").unwrap();

        let message = Message::signal(path, interface, member).build(3).unwrap();
        let encoded = message.encode();
        let (decoded, _) = Message::decode(&encoded).unwrap();

        assert_eq!(decoded.interface().unwrap().as_str(), "com.example.Widget");
        assert_eq!(decoded.member().unwrap().as_str(), "Pinged");
    }

    #[test]
    fn method_return_carries_the_reply_serial() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let member = MemberName::new("Ping").unwrap();
        let call = Message::method_call(path, member).build(5).unwrap();

        let reply = Message::method_return(&call).build(9).unwrap();
        let encoded = reply.encode();
        let (decoded, _) = Message::decode(&encoded).unwrap();

        assert_eq!(decoded.reply_serial(), Some(5));
    }

    #[test]
    fn decode_rejects_a_truncated_header() {
        assert!(Message::decode(&[0x6c, 0x01, 0x00, 0x01]).is_err());
    }
}
