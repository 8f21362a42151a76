use std::borrow::Cow;

use crate::error::Result;
use crate::object_path::{ObjectPath, OwnedObjectPath};
use crate::signature::Signature;

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

impl Sealed for ObjectPath {}

impl Arg for ObjectPath {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::OBJECT_PATH)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::OBJECT_PATH)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_object_path(self.as_str());
        Ok(())
    }
}

impl Sealed for OwnedObjectPath {}

impl Arg for OwnedObjectPath {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::OBJECT_PATH)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::OBJECT_PATH)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_object_path(self.as_str());
        Ok(())
    }
}

impl<'de> ReadArg<'de> for OwnedObjectPath {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        let s = reader.read_str()?;
        OwnedObjectPath::new(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn object_path_round_trips_as_o() {
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let mut writer = BodyWriter::new();
        path.write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "o");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(OwnedObjectPath::read(&mut reader).unwrap().as_path(), path);
    }
}
