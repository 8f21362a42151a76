use crate::buf::{Reader, Writer};
use crate::error::{ErrorKind, Result};
use crate::protocol::{Endianness, Type};
use crate::signature::{OwnedSignature, Signature, SignatureBuilder};

/// The single complete type's leading byte, which is also its alignment
/// driver for basic types and the structural codes for containers.
pub(crate) fn leading_type(sig: &Signature) -> Type {
    Type(*sig.as_bytes().first().unwrap_or(&0))
}

pub(crate) fn alignment_of(sig: &Signature) -> usize {
    leading_type(sig).alignment()
}

/// An append cursor over a message body (§3 `MessageIterator`, write mode).
///
/// A `BodyWriter` that opened a container must close or abandon it before
/// the body can be finalized; this is enforced by [`ContainerMark`] not
/// implementing `Drop`-based auto-close and by [`BodyWriter::into_body`]
/// only being callable once no mark is outstanding (tracked by the caller,
/// matching the teacher's style of pushing that discipline onto the typed
/// layer rather than the cursor itself).
pub struct BodyWriter {
    pub(crate) writer: Writer,
    sig: SignatureBuilder,
}

/// A marker returned by `open_*`, passed back to `close_*` or `abandon`.
pub(crate) struct ContainerMark {
    kind: MarkKind,
    pre_mark: usize,
    sig_mark: usize,
    len_at: Option<usize>,
    data_start: usize,
}

enum MarkKind {
    Array,
    Struct,
    DictEntry,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            sig: SignatureBuilder::new(),
        }
    }

    /// Wrap an existing byte buffer, continuing alignment from its current
    /// length. Used to splice the header-fields array directly into the
    /// same buffer as the fixed message header, so alignment is computed
    /// relative to the true start of the message rather than restarting at
    /// zero (the header-fields array itself carries no transmitted
    /// signature, so the parallel `SignatureBuilder` tracked here is never
    /// read back by the caller).
    pub(crate) fn from_writer(writer: Writer) -> Self {
        Self {
            writer,
            sig: SignatureBuilder::new(),
        }
    }

    pub(crate) fn into_writer(self) -> Writer {
        self.writer
    }

    /// The signature composed so far (not yet validated as a complete type
    /// sequence until [`Self::into_body`]).
    pub(crate) fn signature_bytes(&self) -> &[u8] {
        self.sig.as_bytes()
    }

    pub(crate) fn push_basic_code(&mut self, byte: u8) {
        self.sig.push(byte);
    }

    pub(crate) fn extend_signature(&mut self, sub: &Signature) {
        self.sig.extend_from_signature(sub);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.push_basic_code(b'y');
        self.writer.write_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.push_basic_code(b'b');
        self.writer.write_u32(v as u32);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.push_basic_code(b'n');
        self.writer.write_i16(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.push_basic_code(b'q');
        self.writer.write_u16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.push_basic_code(b'i');
        self.writer.write_i32(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.push_basic_code(b'u');
        self.writer.write_u32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.push_basic_code(b'x');
        self.writer.write_i64(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.push_basic_code(b't');
        self.writer.write_u64(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.push_basic_code(b'd');
        self.writer.write_f64(v);
    }

    pub fn write_str(&mut self, v: &str) {
        self.push_basic_code(b's');
        self.writer.write_string(v);
    }

    pub fn write_object_path(&mut self, v: &str) {
        self.push_basic_code(b'o');
        self.writer.write_string(v);
    }

    pub fn write_signature_value(&mut self, v: &Signature) {
        self.push_basic_code(b'g');
        self.writer.write_signature_bytes(v.as_bytes());
    }

    pub fn write_unix_fd(&mut self, index: u32) {
        self.push_basic_code(b'h');
        self.writer.write_u32(index);
    }

    /// Open a variant: writes its embedded signature, returns a mark so
    /// the caller can then write the inner value and close normally (a
    /// variant has no length prefix or trailing delimiter of its own).
    pub fn open_variant(&mut self, inner: &Signature) -> Result<()> {
        self.push_basic_code(b'v');
        self.writer.write_signature_bytes(inner.as_bytes());
        Ok(())
    }

    pub(crate) fn open_array(&mut self, elem_sig: &Signature) -> Result<ContainerMark> {
        let pre_mark = self.writer.len();
        let sig_mark = self.sig.len();
        self.sig.push(b'a');
        self.sig.extend_from_signature(elem_sig);

        self.writer.align(4);
        let len_at = self.writer.write_u32_placeholder();
        self.writer.align(alignment_of(elem_sig));
        let data_start = self.writer.len();

        Ok(ContainerMark {
            kind: MarkKind::Array,
            pre_mark,
            sig_mark,
            len_at: Some(len_at),
            data_start,
        })
    }

    pub(crate) fn close_array(&mut self, mark: ContainerMark) -> Result<()> {
        let len = (self.writer.len() - mark.data_start) as u32;
        if len > crate::buf::MAX_ARRAY_LENGTH {
            return Err(ErrorKind::OutOfMemory.at());
        }
        self.writer.patch_u32(mark.len_at.unwrap(), len);
        Ok(())
    }

    pub(crate) fn open_struct(&mut self) -> ContainerMark {
        let pre_mark = self.writer.len();
        let sig_mark = self.sig.len();
        self.sig.push(b'(');
        self.writer.align(8);
        let data_start = self.writer.len();
        ContainerMark {
            kind: MarkKind::Struct,
            pre_mark,
            sig_mark,
            len_at: None,
            data_start,
        }
    }

    pub(crate) fn close_struct(&mut self, _mark: ContainerMark) {
        self.sig.push(b')');
    }

    pub(crate) fn open_dict_entry(&mut self) -> ContainerMark {
        let pre_mark = self.writer.len();
        let sig_mark = self.sig.len();
        self.sig.push(b'{');
        self.writer.align(8);
        let data_start = self.writer.len();
        ContainerMark {
            kind: MarkKind::DictEntry,
            pre_mark,
            sig_mark,
            len_at: None,
            data_start,
        }
    }

    pub(crate) fn close_dict_entry(&mut self, _mark: ContainerMark) {
        self.sig.push(b'}');
    }

    /// Abandon a partially-built container: the parent message is left
    /// exactly as if `open_*` had never been called (§3 container
    /// discipline, §8 "container discipline" property).
    pub(crate) fn abandon(&mut self, mark: ContainerMark) {
        let _ = &mark.kind;
        self.writer.truncate(mark.pre_mark);
        self.sig.truncate(mark.sig_mark);
    }

    /// Align the data buffer only, without touching the running signature.
    /// Used between homogeneous array/dict-entry elements, whose shared
    /// element signature was already accounted for once by `open_array`.
    pub(crate) fn align_data(&mut self, align: usize) {
        self.writer.align(align);
    }

    /// Write `value`'s wire data without contributing to the running
    /// signature.
    ///
    /// Used by containers (array elements, dict-entry key/value, a
    /// variant's payload) whose own `open_*` call already accounted for
    /// the element type's signature exactly once; without this, writing
    /// N array elements would each re-push the element's type code and
    /// corrupt the composed signature.
    pub(crate) fn write_data_only<T: super::Arg + ?Sized>(&mut self, value: &T) -> Result<()> {
        let mark = self.sig.len();
        let result = value.write(self);
        self.sig.truncate(mark);
        result
    }

    /// Finish building, producing the raw body bytes and its signature.
    pub fn into_body(self) -> Result<(Vec<u8>, OwnedSignature)> {
        let sig = OwnedSignature::new(self.sig.as_bytes().to_vec())?;
        Ok((self.writer.into_bytes(), sig))
    }
}

impl Default for BodyWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A read cursor over a message body (§3 `MessageIterator`, read mode).
pub struct BodyReader<'a> {
    pub(crate) reader: Reader<'a>,
}

impl<'a> BodyReader<'a> {
    pub fn new(bytes: &'a [u8], endianness: Endianness) -> Self {
        Self {
            reader: Reader::new(bytes, endianness),
        }
    }

    /// Continue reading from an existing cursor, the mirror of
    /// [`BodyWriter::from_writer`] for decoding the header-fields array in
    /// place after the fixed header, so alignment stays relative to the
    /// true start of the message.
    pub(crate) fn from_reader(reader: Reader<'a>) -> Self {
        Self { reader }
    }

    pub(crate) fn into_reader(self) -> Reader<'a> {
        self.reader
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.reader.read_u8()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.reader.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ErrorKind::TypeMismatch.at()),
        }
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.reader.read_i16()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.reader.read_u16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.reader.read_i32()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.reader.read_u32()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.reader.read_i64()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.reader.read_u64()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.reader.read_f64()
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        self.reader.read_string()
    }

    pub fn read_signature_value(&mut self) -> Result<OwnedSignature> {
        let bytes = self.reader.read_signature_bytes()?;
        Ok(OwnedSignature::new(bytes.to_vec())?)
    }

    pub fn read_unix_fd_index(&mut self) -> Result<u32> {
        self.reader.read_u32()
    }

    /// Read the signature embedded in a variant, without yet reading its
    /// value.
    pub fn read_variant_signature(&mut self) -> Result<OwnedSignature> {
        self.read_signature_value()
    }

    pub(crate) fn open_array(&mut self) -> Result<(u32, usize)> {
        let len = self.reader.read_u32()?;
        if len > crate::buf::MAX_ARRAY_LENGTH {
            return Err(ErrorKind::TypeMismatch.at());
        }
        Ok((len, 0))
    }

    pub(crate) fn align_for(&mut self, sig: &Signature) -> Result<()> {
        self.reader.align(alignment_of(sig))
    }

    pub(crate) fn open_struct(&mut self) -> Result<()> {
        self.reader.align(8)
    }

    pub(crate) fn open_dict_entry(&mut self) -> Result<()> {
        self.reader.align(8)
    }

    pub(crate) fn position(&self) -> usize {
        self.reader.position()
    }

    pub(crate) fn endianness(&self) -> Endianness {
        self.reader.endianness()
    }
}
