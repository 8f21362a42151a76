use super::{OwnedSignature, Signature, SignatureError};

/// Incrementally composes a [`Signature`] out of type codes and
/// already-valid sub-signatures, the way [`crate::arg::Arg`] implementors
/// build up a static or runtime signature.
#[derive(Default)]
pub struct SignatureBuilder {
    bytes: Vec<u8>,
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single type code byte (used for basic types and the
    /// array/variant/struct/dict-entry delimiters).
    pub fn push(&mut self, byte: u8) -> bool {
        self.bytes.push(byte);
        true
    }

    /// Append the bytes of an already-valid signature, e.g. an element or
    /// field type's static signature.
    pub fn extend_from_signature(&mut self, signature: &Signature) -> bool {
        self.bytes.extend_from_slice(signature.as_bytes());
        true
    }

    /// Open a struct, invoke `f` to write its fields, and close it.
    pub fn with_struct(&mut self, f: impl FnOnce(&mut Self)) {
        self.bytes.push(b'(');
        f(self);
        self.bytes.push(b')');
    }

    /// Open a dict-entry, invoke `f` to write key then value, and close it.
    pub fn with_dict_entry(&mut self, f: impl FnOnce(&mut Self)) {
        self.bytes.push(b'{');
        f(self);
        self.bytes.push(b'}');
    }

    /// Prefix an array code before invoking `f` to write the element type.
    pub fn with_array(&mut self, f: impl FnOnce(&mut Self)) {
        self.bytes.push(b'a');
        f(self);
    }

    /// Validate and finish, producing an [`OwnedSignature`].
    pub fn finish(self) -> Result<OwnedSignature, SignatureError> {
        OwnedSignature::new(self.bytes)
    }

    /// Current raw bytes, for composing nested builders.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Roll back to a previously observed length, abandoning everything
    /// written since (mirrors [`crate::buf::Writer::truncate`] for the
    /// parallel byte buffer).
    pub(crate) fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}
