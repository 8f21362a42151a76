use std::borrow::Cow;

use crate::error::Result;
use crate::signature::Signature;

use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

/// A borrowed index into a message's out-of-band file descriptor array
/// (§4.C "unix fd" handling). The wire value is just the index; the real
/// descriptor is carried alongside the message via `SCM_RIGHTS`, outside
/// the byte stream this crate marshals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixFd(pub u32);

impl Sealed for UnixFd {}

impl Arg for UnixFd {
    fn static_signature() -> Option<&'static Signature> {
        Some(Signature::UNIX_FD)
    }

    fn signature(&self) -> Cow<'_, Signature> {
        Cow::Borrowed(Signature::UNIX_FD)
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        writer.write_unix_fd(self.0);
        Ok(())
    }
}

impl<'de> ReadArg<'de> for UnixFd {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        Ok(UnixFd(reader.read_unix_fd_index()?))
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::Endianness;

    use super::*;

    #[test]
    fn unix_fd_index_round_trips() {
        let mut writer = BodyWriter::new();
        UnixFd(3).write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "h");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(UnixFd::read(&mut reader).unwrap(), UnixFd(3));
    }
}
