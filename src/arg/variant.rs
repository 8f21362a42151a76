use std::borrow::Cow;

use crate::error::{ErrorKind, Result};
use crate::signature::Signature;

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

/// A statically-typed variant: wraps a value of known Rust type `T` but
/// marshals as D-Bus's `v`, carrying its own embedded signature on the
/// wire (§4.C). Distinct from the dynamic [`super::Value`], which is also
/// wire-compatible with `v` but erases `T` at the Rust type level too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant<T>(pub T);

impl<T> Sealed for Variant<T> where T: Sealed {}

impl<T> Arg for Variant<T>
where
    T: Arg,
{
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::VARIANT)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::VARIANT)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        let inner_sig = self.0.signature().into_owned();
        writer.open_variant(inner_sig.as_signature())?;
        writer.write_data_only(&self.0)
    }
}

impl<'de, T> ReadArg<'de> for Variant<T>
where
    T: Arg + ReadArg<'de>,
{
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        let inner_sig = reader.read_variant_signature()?;
        if let Some(expected) = T::static_signature() {
            if inner_sig.as_signature() != expected {
                return Err(ErrorKind::TypeMismatch.at());
            }
        }
        Ok(Variant(T::read(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn variant_signature_is_always_v() {
        assert_eq!(Variant(7i32).signature().as_str(), "v");
        assert_eq!(Variant::<i32>::static_signature().unwrap().as_str(), "v");
    }

    #[test]
    fn variant_round_trips_its_inner_value() {
        let mut writer = BodyWriter::new();
        Variant(42i32).write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "v");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        let Variant(value) = Variant::<i32>::read(&mut reader).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn rejects_a_mismatched_inner_type() {
        let mut writer = BodyWriter::new();
        Variant("not an int").write(&mut writer).unwrap();
        let (bytes, _sig) = writer.into_body().unwrap();

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert!(Variant::<i32>::read(&mut reader).is_err());
    }
}
