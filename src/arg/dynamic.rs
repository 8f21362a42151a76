use std::borrow::Cow;

use crate::error::{ErrorKind, Result};
use crate::object_path::OwnedObjectPath;
use crate::signature::{OwnedSignature, Signature, SignatureBuilder};

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

/// A runtime-typed D-Bus value (Design Note §9: a closed sum type rather
/// than an open/dynamically-dispatched erased variant). Used for generic
/// bus clients (property bags, `org.freedesktop.DBus` introspection
/// results) that accept or return arbitrary variant contents.
///
/// Marshals identically to a statically-typed [`super::Variant<T>`] at the
/// argument position it appears in: wire code `v`, signature plus value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    ObjectPath(OwnedObjectPath),
    Signature(OwnedSignature),
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Variant(Box<Value>),
    UnixFd(u32),
}

impl Sealed for Value {}

impl Value {
    /// The signature this value produces, computed from its actual shape
    /// (there is no static signature for a dynamic value — see
    /// [`Arg::static_signature`]'s default).
    fn compute_signature(&self) -> OwnedSignature {
        let mut b = SignatureBuilder::new();
        self.build_signature(&mut b);
        b.finish().expect("dynamic value signature is well-formed")
    }

    fn build_signature(&self, b: &mut SignatureBuilder) {
        match self {
            Value::Byte(_) => {
                b.push(b'y');
            }
            Value::Boolean(_) => {
                b.push(b'b');
            }
            Value::Int16(_) => {
                b.push(b'n');
            }
            Value::UInt16(_) => {
                b.push(b'q');
            }
            Value::Int32(_) => {
                b.push(b'i');
            }
            Value::UInt32(_) => {
                b.push(b'u');
            }
            Value::Int64(_) => {
                b.push(b'x');
            }
            Value::UInt64(_) => {
                b.push(b't');
            }
            Value::Double(_) => {
                b.push(b'd');
            }
            Value::String(_) => {
                b.push(b's');
            }
            Value::ObjectPath(_) => {
                b.push(b'o');
            }
            Value::Signature(_) => {
                b.push(b'g');
            }
            Value::UnixFd(_) => {
                b.push(b'h');
            }
            Value::Variant(_) => {
                b.push(b'v');
            }
            Value::Array(items) => {
                b.push(b'a');
                match items.first() {
                    Some(first) => first.build_signature(b),
                    None => b.push(b'y'),
                }
            }
            Value::Dict(entries) => {
                b.push(b'a');
                b.push(b'{');
                match entries.first() {
                    Some((k, v)) => {
                        k.build_signature(b);
                        v.build_signature(b);
                    }
                    None => {
                        b.push(b'y');
                        b.push(b'y');
                    }
                }
                b.push(b'}');
            }
            Value::Struct(fields) => {
                b.push(b'(');
                for field in fields {
                    field.build_signature(b);
                }
                b.push(b')');
            }
        }
    }

    fn write_data(&self, writer: &mut BodyWriter) -> Result<()> {
        match self {
            Value::Byte(v) => writer.writer.write_u8(*v),
            Value::Boolean(v) => writer.writer.write_u32(*v as u32),
            Value::Int16(v) => writer.writer.write_i16(*v),
            Value::UInt16(v) => writer.writer.write_u16(*v),
            Value::Int32(v) => writer.writer.write_i32(*v),
            Value::UInt32(v) => writer.writer.write_u32(*v),
            Value::Int64(v) => writer.writer.write_i64(*v),
            Value::UInt64(v) => writer.writer.write_u64(*v),
            Value::Double(v) => writer.writer.write_f64(*v),
            Value::String(v) => writer.writer.write_string(v),
            Value::ObjectPath(v) => writer.writer.write_string(v.as_str()),
            Value::Signature(v) => writer.writer.write_signature_bytes(v.as_bytes()),
            Value::UnixFd(v) => writer.writer.write_u32(*v),
            Value::Variant(inner) => {
                let inner_sig = inner.compute_signature();
                writer.writer.write_signature_bytes(inner_sig.as_bytes());
                inner.write_data(writer)?;
            }
            Value::Array(items) => {
                let elem_sig = match items.first() {
                    Some(first) => first.compute_signature(),
                    None => OwnedSignature::new(b"y".to_vec())?,
                };
                let mark = writer.open_array(elem_sig.as_signature())?;
                for item in items {
                    if item.compute_signature().as_signature() != elem_sig.as_signature() {
                        writer.abandon(mark);
                        return Err(ErrorKind::InvalidArgs.at());
                    }
                    if let Err(e) = writer.write_data_only(item) {
                        writer.abandon(mark);
                        return Err(e);
                    }
                }
                writer.close_array(mark)?;
            }
            Value::Dict(entries) => {
                let (key_sig, value_sig) = match entries.first() {
                    Some((k, v)) => (k.compute_signature(), v.compute_signature()),
                    None => (
                        OwnedSignature::new(b"y".to_vec())?,
                        OwnedSignature::new(b"y".to_vec())?,
                    ),
                };
                let mut elem_bytes = vec![b'{'];
                elem_bytes.extend_from_slice(key_sig.as_bytes());
                elem_bytes.extend_from_slice(value_sig.as_bytes());
                elem_bytes.push(b'}');
                let elem_sig = OwnedSignature::new(elem_bytes)?;

                let mark = writer.open_array(elem_sig.as_signature())?;
                for (k, v) in entries {
                    if k.compute_signature().as_signature() != key_sig.as_signature()
                        || v.compute_signature().as_signature() != value_sig.as_signature()
                    {
                        writer.abandon(mark);
                        return Err(ErrorKind::InvalidArgs.at());
                    }
                    writer.align_data(8);
                    if let Err(e) = writer.write_data_only(k).and_then(|_| writer.write_data_only(v)) {
                        writer.abandon(mark);
                        return Err(e);
                    }
                }
                writer.close_array(mark)?;
            }
            Value::Struct(fields) => {
                let mark = writer.open_struct();
                for field in fields {
                    if let Err(e) = field.write_data(writer) {
                        writer.abandon(mark);
                        return Err(e);
                    }
                }
                writer.close_struct(mark);
            }
        }
        Ok(())
    }
}

impl Arg for Value {
    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Owned(self.compute_signature().to_owned())
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        self.write_data(writer)
    }
}

impl<'de> ReadArg<'de> for Value {
    fn read(_reader: &mut BodyReader<'de>) -> Result<Self> {
        // Not reachable through the generic path: a dynamic value can
        // only be decoded once its shape is known, e.g. from a variant's
        // embedded signature. See `read_with_signature`, which is what
        // `Variant<Value>` and property-bag call sites actually use.
        Err(ErrorKind::TypeMismatch.at())
    }
}

impl Value {
    /// Read a value whose shape is given by `sig`, the way a variant's
    /// embedded signature or a property's declared type drives decoding.
    pub fn read_with_signature(reader: &mut BodyReader<'_>, sig: &Signature) -> Result<Value> {
        let code = sig.as_bytes().first().copied().unwrap_or(0);
        match code {
            b'y' => Ok(Value::Byte(reader.read_u8()?)),
            b'b' => Ok(Value::Boolean(reader.read_bool()?)),
            b'n' => Ok(Value::Int16(reader.read_i16()?)),
            b'q' => Ok(Value::UInt16(reader.read_u16()?)),
            b'i' => Ok(Value::Int32(reader.read_i32()?)),
            b'u' => Ok(Value::UInt32(reader.read_u32()?)),
            b'x' => Ok(Value::Int64(reader.read_i64()?)),
            b't' => Ok(Value::UInt64(reader.read_u64()?)),
            b'd' => Ok(Value::Double(reader.read_f64()?)),
            b's' => Ok(Value::String(reader.read_str()?.to_owned())),
            b'o' => Ok(Value::ObjectPath(OwnedObjectPath::new(
                reader.read_str()?.to_owned(),
            )?)),
            b'g' => Ok(Value::Signature(reader.read_signature_value()?)),
            b'h' => Ok(Value::UnixFd(reader.read_unix_fd_index()?)),
            b'v' => {
                let inner_sig = reader.read_variant_signature()?;
                let inner = Value::read_with_signature(reader, inner_sig.as_signature())?;
                Ok(Value::Variant(Box::new(inner)))
            }
            b'a' => {
                let elem_sig = sig
                    .array_element()
                    .ok_or_else(|| ErrorKind::TypeMismatch.at())?;
                if elem_sig.as_bytes().first() == Some(&b'{') {
                    let inner = &elem_sig.as_bytes()[1..elem_sig.as_bytes().len() - 1];
                    let inner_sig = Signature::new(inner)?;
                    let mut field_iter = inner_sig.iter();
                    let key_sig = field_iter.next().ok_or_else(|| ErrorKind::TypeMismatch.at())?;
                    let value_sig = field_iter.next().ok_or_else(|| ErrorKind::TypeMismatch.at())?;

                    let (len, _) = reader.open_array()?;
                    reader.open_struct()?;
                    let start = reader.position();
                    let end = start + len as usize;
                    let mut entries = Vec::new();
                    while reader.position() < end {
                        reader.open_dict_entry()?;
                        let k = Value::read_with_signature(reader, key_sig)?;
                        let v = Value::read_with_signature(reader, value_sig)?;
                        entries.push((k, v));
                    }
                    if reader.position() != end {
                        return Err(ErrorKind::TypeMismatch.at());
                    }
                    Ok(Value::Dict(entries))
                } else {
                    let (len, _) = reader.open_array()?;
                    reader.align_for(elem_sig)?;
                    let start = reader.position();
                    let end = start + len as usize;
                    let mut items = Vec::new();
                    while reader.position() < end {
                        items.push(Value::read_with_signature(reader, elem_sig)?);
                    }
                    if reader.position() != end {
                        return Err(ErrorKind::TypeMismatch.at());
                    }
                    Ok(Value::Array(items))
                }
            }
            b'(' => {
                let inner = &sig.as_bytes()[1..sig.as_bytes().len() - 1];
                let inner_sig = Signature::new(inner)?;
                reader.open_struct()?;
                let mut fields = Vec::new();
                for field_sig in inner_sig.iter() {
                    fields.push(Value::read_with_signature(reader, field_sig)?);
                }
                Ok(Value::Struct(fields))
            }
            _ => Err(ErrorKind::TypeMismatch.at()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;
    use crate::signature::Signature;

    use super::*;

    fn round_trip(value: Value) -> Value {
        let sig = value.signature().into_owned();
        let mut writer = BodyWriter::new();
        value.write(&mut writer).unwrap();
        let (bytes, _) = writer.into_body().unwrap();
        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        Value::read_with_signature(&mut reader, sig.as_signature()).unwrap()
    }

    #[test]
    fn basic_scalars_round_trip() {
        assert_eq!(round_trip(Value::Int32(-7)), Value::Int32(-7));
        assert_eq!(round_trip(Value::String("hi".to_owned())), Value::String("hi".to_owned()));
        assert_eq!(round_trip(Value::Boolean(true)), Value::Boolean(true));
    }

    #[test]
    fn array_round_trips() {
        let array = Value::Array(vec![Value::Int32(1), Value::Int32(2)]);
        assert_eq!(array.signature().as_str(), "ai");
        assert_eq!(round_trip(array.clone()), array);
    }

    #[test]
    fn dict_round_trips() {
        let dict = Value::Dict(vec![(Value::String("k".to_owned()), Value::Int32(1))]);
        assert_eq!(dict.signature().as_str(), "a{si}");
        assert_eq!(round_trip(dict.clone()), dict);
    }

    #[test]
    fn nested_variant_round_trips() {
        let variant = Value::Variant(Box::new(Value::Byte(9)));
        assert_eq!(variant.signature().as_str(), "v");
        assert_eq!(round_trip(variant.clone()), variant);
    }

    #[test]
    fn generic_read_is_unreachable() {
        let mut writer = BodyWriter::new();
        Value::Int32(1).write(&mut writer).unwrap();
        let (bytes, _) = writer.into_body().unwrap();
        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert!(Value::read(&mut reader).is_err());
    }

    #[test]
    fn read_with_signature_rejects_an_empty_signature() {
        let mut reader = BodyReader::new(&[], Endianness::NATIVE);
        assert!(Value::read_with_signature(&mut reader, Signature::EMPTY).is_err());
    }
}
