use std::borrow::Cow;

use crate::error::Result;
use crate::signature::Signature;

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

macro_rules! fixed_arg {
    ($ty:ty, $sig:expr, $write:ident, $read:ident) => {
        impl Sealed for $ty {}

        impl Arg for $ty {
            fn static_signature() -> Option<&'static Signature> {
                Some($sig)
            }

            fn signature(&self) -> Cow<'_, Signature> {
                Cow::Borrowed($sig)
            }

            fn write(&self, writer: &mut BodyWriter) -> Result<()> {
                writer.$write(*self);
                Ok(())
            }
        }

        impl<'de> ReadArg<'de> for $ty {
            fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
                reader.$read()
            }
        }
    };
}

fixed_arg!(u8, Signature::BYTE, write_u8, read_u8);
fixed_arg!(bool, Signature::BOOLEAN, write_bool, read_bool);
fixed_arg!(i16, Signature::INT16, write_i16, read_i16);
fixed_arg!(u16, Signature::UINT16, write_u16, read_u16);
fixed_arg!(i32, Signature::INT32, write_i32, read_i32);
fixed_arg!(u32, Signature::UINT32, write_u32, read_u32);
fixed_arg!(i64, Signature::INT64, write_i64, read_i64);
fixed_arg!(u64, Signature::UINT64, write_u64, read_u64);
fixed_arg!(f64, Signature::DOUBLE, write_f64, read_f64);

impl Sealed for str {}

impl Arg for str {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::STRING)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::STRING)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_str(self);
        Ok(())
    }
}

impl Sealed for String {}

impl Arg for String {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::STRING)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::STRING)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_str(self);
        Ok(())
    }
}

impl<'de> ReadArg<'de> for &'de str {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        reader.read_str()
    }
}

impl<'de> ReadArg<'de> for String {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        Ok(reader.read_str()?.to_owned())
    }
}

impl<T: ?Sized> Sealed for &T where T: Sealed {}

impl<T: ?Sized> Arg for &T
where
    T: Arg,
{
    fn static_signature() -> Option<&'static Signature>
    where
        Self: Sized,
    {
        T::static_signature()
    }

    fn signature(&self) -> Cow<'_, Signature> {
        (**self).signature()
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        (**self).write(writer)
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    fn round_trip<T>(value: T) -> T
    where
        T: Arg + for<'de> ReadArg<'de>,
    {
        let mut writer = BodyWriter::new();
        value.write(&mut writer).unwrap();
        let (bytes, _sig) = writer.into_body().unwrap();
        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        T::read(&mut reader).unwrap()
    }

    #[test]
    fn fixed_width_integers_round_trip() {
        assert_eq!(round_trip(7u8), 7u8);
        assert_eq!(round_trip(-7i16), -7i16);
        assert_eq!(round_trip(7u16), 7u16);
        assert_eq!(round_trip(-70000i32), -70000i32);
        assert_eq!(round_trip(70000u32), 70000u32);
        assert_eq!(round_trip(-1i64), -1i64);
        assert_eq!(round_trip(u64::MAX), u64::MAX);
        assert_eq!(round_trip(1.5f64), 1.5f64);
    }

    #[test]
    fn bool_round_trips_and_rejects_other_values() {
        assert!(round_trip(true));
        assert!(!round_trip(false));

        let mut writer = BodyWriter::new();
        writer.write_u32(2);
        let (bytes, _) = writer.into_body().unwrap();
        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert!(reader.read_bool().is_err());
    }

    #[test]
    fn static_signature_matches_actual_signature() {
        assert_eq!(u8::static_signature().unwrap().as_str(), "y");
        assert_eq!(f64::static_signature().unwrap().as_str(), "d");
        assert_eq!(7u8.signature().as_str(), "y");
    }

    #[test]
    fn string_and_str_round_trip() {
        let mut writer = BodyWriter::new();
        "hello".write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "s");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(<&str>::read(&mut reader).unwrap(), "hello");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(String::read(&mut reader).unwrap(), "hello");
    }
}
