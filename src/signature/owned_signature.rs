use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{Signature, SignatureError};

/// An owned, heap-allocated [`Signature`].
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct OwnedSignature {
    bytes: Box<[u8]>,
}

impl OwnedSignature {
    /// Parse and own `bytes` as a signature.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SignatureError> {
        let bytes = bytes.into();
        Signature::new(&bytes)?;
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub(crate) fn from_signature(signature: &Signature) -> Self {
        Self {
            bytes: signature.as_bytes().to_vec().into_boxed_slice(),
        }
    }

    /// Borrow as a [`Signature`].
    pub fn as_signature(&self) -> &Signature {
        unsafe { Signature::new_unchecked(&self.bytes) }
    }
}

impl Deref for OwnedSignature {
    type Target = Signature;

    fn deref(&self) -> &Signature {
        self.as_signature()
    }
}

impl Borrow<Signature> for OwnedSignature {
    fn borrow(&self) -> &Signature {
        self.as_signature()
    }
}

impl fmt::Debug for OwnedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_signature(), f)
    }
}

impl fmt::Display for OwnedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_signature(), f)
    }
}

impl PartialEq<Signature> for OwnedSignature {
    fn eq(&self, other: &Signature) -> bool {
        self.as_signature() == other
    }
}
