use std::borrow::Cow;

use crate::error::Result;
use crate::macros::repeat;
use crate::signature::{Signature, SignatureBuilder};

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

impl Sealed for () {}

/// The empty argument list: writes nothing and contributes nothing to the
/// signature. Distinct from a zero-field struct, which D-Bus's grammar
/// doesn't allow — `()` models a method call or reply with no body at all.
impl Arg for () {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::EMPTY)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::EMPTY)
    }

    fn write(&self, _writer: &mut BodyWriter) -> Result<()> {
        Ok(())
    }
}

impl<'de> ReadArg<'de> for () {
    fn read(_reader: &mut BodyReader<'de>) -> Result<Self> {
        Ok(())
    }
}

/// Generates the `Arg`/`ReadArg`/`Sealed` impls for one tuple arity, given
/// its type parameters and their tuple-field indices in lockstep.
macro_rules! impl_tuple_n {
    ($($T:ident),+; $($idx:tt),+) => {
        impl<$($T),+> Sealed for ($($T,)+) where $($T: Sealed),+ {}

        impl<$($T),+> Arg for ($($T,)+)
        where
            $($T: Arg),+
        {
            fn static_signature() -> Option<&'static Signature>
            where
                Self: Sized,
            {
                // A tuple's static signature only exists if every field has
                // one; composing it requires allocation, which a `&'static`
                // return can't do, so tuples fall back to `signature()`.
                None
            }

            fn signature(&self) -> Cow<'_, Signature> {
                let mut builder = SignatureBuilder::new();
                builder.push(b'(');
                $(builder.extend_from_signature(&self.$idx.signature());)+
                builder.push(b')');
                Cow::Owned(
                    builder
                        .finish()
                        .expect("tuple signature is always well-formed"),
                )
            }

            fn write(&self, writer: &mut BodyWriter) -> Result<()> {
                let mark = writer.open_struct();
                $(
                    if let Err(e) = self.$idx.write(writer) {
                        writer.abandon(mark);
                        return Err(e);
                    }
                )+
                writer.close_struct(mark);
                Ok(())
            }
        }

        impl<'de, $($T),+> ReadArg<'de> for ($($T,)+)
        where
            $($T: ReadArg<'de>),+
        {
            fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
                reader.open_struct()?;
                Ok(($($T::read(reader)?,)+))
            }
        }
    };
}

macro_rules! tuple_impl {
    ($A:ident) => {
        impl_tuple_n!($A; 0);
    };
    ($A:ident, $B:ident) => {
        impl_tuple_n!($A, $B; 0, 1);
    };
    ($A:ident, $B:ident, $C:ident) => {
        impl_tuple_n!($A, $B, $C; 0, 1, 2);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident) => {
        impl_tuple_n!($A, $B, $C, $D; 0, 1, 2, 3);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E; 0, 1, 2, 3, 4);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F; 0, 1, 2, 3, 4, 5);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G; 0, 1, 2, 3, 4, 5, 6);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident, $H:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G, $H; 0, 1, 2, 3, 4, 5, 6, 7);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident, $H:ident, $I:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G, $H, $I; 0, 1, 2, 3, 4, 5, 6, 7, 8);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident, $H:ident, $I:ident, $J:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G, $H, $I, $J; 0, 1, 2, 3, 4, 5, 6, 7, 8, 9);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident, $H:ident, $I:ident, $J:ident, $K:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G, $H, $I, $J, $K; 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10);
    };
    ($A:ident, $B:ident, $C:ident, $D:ident, $E:ident, $F:ident, $G:ident, $H:ident, $I:ident, $J:ident, $K:ident, $L:ident) => {
        impl_tuple_n!($A, $B, $C, $D, $E, $F, $G, $H, $I, $J, $K, $L; 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11);
    };
}

repeat!(tuple_impl);

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn unit_has_empty_signature() {
        assert_eq!(().signature().as_bytes(), b"");
        assert_eq!(<()>::static_signature().unwrap().as_bytes(), b"");
    }

    #[test]
    fn unit_round_trips_as_empty_body() {
        let writer = BodyWriter::new();
        let (bytes, sig) = writer.into_body().unwrap();
        assert!(bytes.is_empty());
        assert_eq!(sig.as_bytes(), b"");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        <()>::read(&mut reader).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn tuple_writes_as_nested_struct_signature() {
        let value = (7i32, String::from("hi"));
        assert_eq!(value.signature().as_str(), "(is)");
    }

    #[test]
    fn tuple_round_trips_through_a_body() {
        let mut writer = BodyWriter::new();
        (7i32, String::from("hi")).write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "(is)");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        let (n, s): (i32, String) = ReadArg::read(&mut reader).unwrap();
        assert_eq!(n, 7);
        assert_eq!(s, "hi");
    }
}
