use std::fmt;
use std::str::from_utf8_unchecked;

use super::validate::{complete_type_len, validate};
use super::{OwnedSignature, SignatureError};

/// A borrowed D-Bus signature: a string over the signature alphabet.
///
/// Constructing one validates that the bytes form a sequence of complete
/// types (§3). `Signature` is an unsized, `repr(transparent)` wrapper
/// around `[u8]` so that `&Signature` is a thin pointer with the same
/// layout as `&str`/`&[u8]`.
#[derive(Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct Signature([u8]);

impl Signature {
    /// The empty signature, matching a unit-like message body.
    pub const EMPTY: &'static Signature = Signature::new_const(b"");

    pub const BYTE: &'static Signature = Signature::new_const(b"y");
    pub const BOOLEAN: &'static Signature = Signature::new_const(b"b");
    pub const INT16: &'static Signature = Signature::new_const(b"n");
    pub const UINT16: &'static Signature = Signature::new_const(b"q");
    pub const INT32: &'static Signature = Signature::new_const(b"i");
    pub const UINT32: &'static Signature = Signature::new_const(b"u");
    pub const INT64: &'static Signature = Signature::new_const(b"x");
    pub const UINT64: &'static Signature = Signature::new_const(b"t");
    pub const DOUBLE: &'static Signature = Signature::new_const(b"d");
    pub const STRING: &'static Signature = Signature::new_const(b"s");
    pub const OBJECT_PATH: &'static Signature = Signature::new_const(b"o");
    pub const SIGNATURE: &'static Signature = Signature::new_const(b"g");
    pub const UNIX_FD: &'static Signature = Signature::new_const(b"h");
    pub const VARIANT: &'static Signature = Signature::new_const(b"v");

    /// Validate and borrow `bytes` as a signature.
    pub fn new(bytes: &[u8]) -> Result<&Signature, SignatureError> {
        validate(bytes)?;
        // SAFETY: `Signature` is `repr(transparent)` over `[u8]`.
        Ok(unsafe { &*(bytes as *const [u8] as *const Signature) })
    }

    /// Borrow `bytes` as a signature without validating them.
    ///
    /// Used for the compile-time constants above and by code that has
    /// already established the bytes are well-formed (e.g. concatenating
    /// two already-valid signatures).
    pub const fn new_const(bytes: &[u8]) -> &'static Signature {
        // SAFETY: `Signature` is `repr(transparent)` over `[u8]`.
        unsafe { &*(bytes as *const [u8] as *const Signature) }
    }

    pub(crate) unsafe fn new_unchecked(bytes: &[u8]) -> &Signature {
        &*(bytes as *const [u8] as *const Signature)
    }

    /// Whether this is the empty signature.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The signature as a `str` (every byte is ASCII).
    pub fn as_str(&self) -> &str {
        // SAFETY: the signature alphabet is a subset of ASCII.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Iterate over the complete types that make up this signature.
    ///
    /// For a struct's field list or a message body's top-level signature
    /// this yields one sub-signature per field/argument.
    pub fn iter(&self) -> CompleteTypeIter<'_> {
        CompleteTypeIter { rest: &self.0 }
    }

    /// Clone into an owned signature.
    pub fn to_owned(&self) -> OwnedSignature {
        OwnedSignature::from_signature(self)
    }

    /// If this is an array signature `a<elem>`, the element's signature.
    pub fn array_element(&self) -> Option<&Signature> {
        if self.0.first() != Some(&b'a') {
            return None;
        }
        Some(unsafe { Signature::new_unchecked(&self.0[1..]) })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", self.as_str())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToOwned for Signature {
    type Owned = OwnedSignature;

    fn to_owned(&self) -> OwnedSignature {
        Signature::to_owned(self)
    }
}

impl PartialEq<str> for Signature {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Signature {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Iterator over the complete types of a [`Signature`], produced by
/// [`Signature::iter`].
pub struct CompleteTypeIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for CompleteTypeIter<'a> {
    type Item = &'a Signature;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let len = complete_type_len(self.rest)?;
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Some(unsafe { Signature::new_unchecked(head) })
    }
}
