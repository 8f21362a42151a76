use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{ErrorKind, Result};
use crate::signature::{Signature, SignatureBuilder};

use super::cursor::leading_type;
use super::{Arg, BodyReader, BodyWriter, ReadArg, Sealed};

impl<K, V> Sealed for HashMap<K, V>
where
    K: Sealed,
    V: Sealed,
{
}

/// A dict-entry's key must be a basic type (§3); this is enforced here at
/// the point a concrete `K` is known, rather than in the raw signature
/// grammar checker, since only the typed layer can name `K`'s type.
fn require_basic_key(sig: &Signature) -> Result<()> {
    if leading_type(sig).is_basic() {
        Ok(())
    } else {
        Err(ErrorKind::InvalidArgs.at())
    }
}

impl<K, V> Arg for HashMap<K, V>
where
    K: Arg + Eq + Hash,
    V: Arg,
{
    fn static_signature() -> Option<&'static Signature>
    where
        Self: Sized,
    {
        None
    }

    fn signature(&self) -> Cow<'_, Signature> {
        let (key_sig, value_sig) = match self.iter().next() {
            Some((k, v)) => (k.signature(), v.signature()),
            None => (
                K::static_signature()
                    .map(Cow::Borrowed)
                    .unwrap_or(Cow::Borrowed(Signature::EMPTY)),
                V::static_signature()
                    .map(Cow::Borrowed)
                    .unwrap_or(Cow::Borrowed(Signature::EMPTY)),
            ),
        };

        let mut builder = SignatureBuilder::new();
        builder.push(b'a');
        builder.push(b'{');
        builder.extend_from_signature(&key_sig);
        builder.extend_from_signature(&value_sig);
        builder.push(b'}');
        Cow::Owned(
            builder
                .finish()
                .expect("dict signature is always well-formed"),
        )
    }

    fn write(&self, writer: &mut BodyWriter) -> Result<()> {
        let key_sig = match self.iter().next() {
            Some((k, _)) => k.signature().into_owned(),
            None => match K::static_signature() {
                Some(sig) => sig.to_owned(),
                None => return Err(ErrorKind::InvalidArgs.at()),
            },
        };
        require_basic_key(key_sig.as_signature())?;

        let value_sig = match self.iter().next() {
            Some((_, v)) => v.signature().into_owned(),
            None => match V::static_signature() {
                Some(sig) => sig.to_owned(),
                None => return Err(ErrorKind::InvalidArgs.at()),
            },
        };

        let mut elem_sig_bytes = Vec::with_capacity(2 + key_sig.as_bytes().len() + value_sig.as_bytes().len());
        elem_sig_bytes.push(b'{');
        elem_sig_bytes.extend_from_slice(key_sig.as_bytes());
        elem_sig_bytes.extend_from_slice(value_sig.as_bytes());
        elem_sig_bytes.push(b'}');
        let elem_sig = Signature::new(&elem_sig_bytes)?.to_owned();

        let mark = writer.open_array(elem_sig.as_signature())?;
        for (k, v) in self {
            if k.signature().as_ref() != key_sig.as_signature()
                || v.signature().as_ref() != value_sig.as_signature()
            {
                writer.abandon(mark);
                return Err(ErrorKind::InvalidArgs.at());
            }

            writer.align_data(8);
            if let Err(e) = writer
                .write_data_only(k)
                .and_then(|_| writer.write_data_only(v))
            {
                writer.abandon(mark);
                return Err(e);
            }
        }
        writer.close_array(mark)
    }
}

impl<'de, K, V> ReadArg<'de> for HashMap<K, V>
where
    K: Arg + ReadArg<'de> + Eq + Hash,
    V: Arg + ReadArg<'de>,
{
    fn read(reader: &mut BodyReader<'de>) -> Result<Self> {
        let (len, _) = reader.open_array()?;
        // The padding before the first dict-entry (8-byte aligned, same as
        // a struct) is not counted in `len`.
        reader.open_struct()?;
        let start = reader.position();
        let end = start + len as usize;

        let mut out = HashMap::new();
        while reader.position() < end {
            reader.open_dict_entry()?;
            let key = K::read(reader)?;
            let value = V::read(reader)?;
            out.insert(key, value);
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
    fn empty_dict_uses_static_signatures() {
        let empty: HashMap<String, i32> = HashMap::new();
        assert_eq!(empty.signature().as_str(), "a{si}");
    }

    #[test]
    fn dict_round_trips() {
        let mut map = HashMap::new();
        map.insert("a".to_owned(), 1i32);
        map.insert("b".to_owned(), 2i32);

        let mut writer = BodyWriter::new();
        map.write(&mut writer).unwrap();
        let (bytes, sig) = writer.into_body().unwrap();
        assert_eq!(sig.as_str(), "a{si}");

        let mut reader = BodyReader::new(&bytes, Endianness::NATIVE);
        assert_eq!(HashMap::<String, i32>::read(&mut reader).unwrap(), map);
    }

    #[test]
    fn rejects_a_non_basic_key() {
        let mut map: HashMap<Vec<i32>, i32> = HashMap::new();
        map.insert(vec![1], 2);
        let mut writer = BodyWriter::new();
        assert!(map.write(&mut writer).is_err());
    }
}
