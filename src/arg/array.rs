use std::borrow::Cow;

use crate::error::{ErrorKind, Result};
use crate::signature::{Signature, SignatureBuilder};

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

impl<T> Sealed for Vec<T> where T: Sealed {}

impl<T> Arg for Vec<T>
where
    T: Arg,
{
    fn static_signature() -> Option<&'static Signature>
    where
        Self: Sized,
    {
        // An array's static signature needs a `'static` element signature,
        // which only exists for element types with one of their own; a
        // `Vec<Value>` (dynamic elements) has no static signature.
        None
    }

    /// The empty array uses the element type's static signature; a
    /// non-empty array uses its first element's runtime signature. A
    /// mismatch between the first and later elements' signatures is
    /// caught at write time (`InvalidSignature`), not here.
    fn signature(&self) -> Cow<'_, Signature> {
        let elem = match self.first() {
            Some(first) => first.signature(),
            None => match T::static_signature() {
                Some(sig) => Cow::Borrowed(sig),
                None => Cow::Borrowed(Signature::EMPTY),
            },
        };

        let mut builder = SignatureBuilder::new();
        builder.push(b'a');
        builder.extend_from_signature(&elem);
        // `finish()` only fails if the composed bytes are themselves
        // malformed, which cannot happen for `a` + a valid complete type.
        Cow::Owned(
            builder
                .finish()
                .expect("array signature is always well-formed"),
        )
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        let elem_sig = match self.first() {
            Some(first) => first.signature().into_owned(),
            None => match T::static_signature() {
                Some(sig) => sig.to_owned(),
                None => return Err(ErrorKind::InvalidArgs.at()),
            },
        };

        let mark = writer.open_array(elem_sig.as_signature())?;
        for item in self {
            let item_sig = item.signature();
            if item_sig.as_ref() != elem_sig.as_signature() {
                writer.abandon(mark);
                return Err(ErrorKind::InvalidArgs.at());
            }
            if let Err(e) = writer.write_data_only(item) {
                writer.abandon(mark);
                return Err(e);
            }
        }
        writer.close_array(mark)
    }
}

impl<'de, T> ReadArg<'de> for Vec<T>
where
    T: Arg + ReadArg<'de>,
{
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        let (len, _) = reader.open_array()?;
        // The padding between the length prefix and the first element is
        // aligned to the element type and is *not* counted in `len`; only
        // the bytes from here on (including inter-element padding) are.
        if let Some(sig) = T::static_signature() {
            reader.align_for(sig)?;
        }
        let start = reader.position();
        let end = start + len as usize;

        let mut out = Vec::new();
        while reader.position() < end {
            out.push(T::read(reader)?);
        }
        if reader.position() != end {
            return Err(ErrorKind::TypeMismatch.at());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn empty_array_uses_the_element_static_signature() {
        let empty: Vec<i32> = Vec::new();
        assert_eq!(empty.signature().as_str(), "ai");
    }

    #[test]
    fn non_empty_array_round_trips() {
        let values = vec![1i32, 2, 3];
        let mut writer = BodyWriter::new();
        values.write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "ai");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(Vec::<i32>::read(&mut reader).unwrap(), values);
    }

    #[test]
    fn array_of_strings_round_trips() {
        let values = vec!["a".to_owned(), "bb".to_owned(), "ccc".to_owned()];
        let mut writer = BodyWriter::new();
        values.write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "as");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(Vec::<String>::read(&mut reader).unwrap(), values);
    }
}
