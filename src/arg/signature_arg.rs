use std::borrow::Cow;

use crate::error::Result;
use crate::signature::{OwnedSignature, Signature};

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

impl Sealed for Signature {}

impl Arg for Signature {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::SIGNATURE)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::SIGNATURE)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_signature_value(self);
        Ok(())
    }
}

impl Sealed for OwnedSignature {}

impl Arg for OwnedSignature {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::SIGNATURE)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::SIGNATURE)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_signature_value(self.as_signature());
        Ok(())
    }
}

impl<'de> ReadArg<'de> for OwnedSignature {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        reader.read_signature_value()
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn signature_round_trips_as_g() {
        let value = Signature::new(b"a{sv}").unwrap();
        let mut writer = BodyWriter::new();
        value.write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "g");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(OwnedSignature::read(&mut reader).unwrap().as_signature(), value);
    }
}
