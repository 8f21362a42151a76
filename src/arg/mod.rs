//! Marshaling: converting Rust values to and from D-Bus wire arguments
//! (§4.C of the design, the largest module by code and by subtle bugs).
//!
//! [`Arg`] covers types that know how to write themselves into a message
//! body and, for types whose shape is fixed at compile time, what their
//! signature is without looking at a value. [`ReadArg`] covers the other
//! direction. The split mirrors the fact that some shapes (a dynamic
//! [`Value`]) can only produce a signature once a concrete value exists.

mod array;
mod basic;
pub(crate) mod cursor;
mod dict;
mod dynamic;
mod object_path_arg;
mod signature_arg;
mod structs;
mod unix_fd;
mod variant;

pub use self::cursor::{BodyReader, BodyWriter};
pub use self::dynamic::Value;
pub use self::unix_fd::UnixFd;
pub use self::variant::Variant;

use std::borrow::Cow;

use crate::error::Result;
use crate::signature::Signature;

mod sealed {
    /// Closes [`super::Arg`]/[`super::ReadArg`] to types this crate knows
    /// how to lay out on the wire; downstream crates compose the provided
    /// building blocks (tuples, `Vec`, `HashMap`, [`super::Variant`],
    /// [`super::Value`]) instead of implementing the trait from scratch.
    pub trait Sealed {}
}

/// A value that can be written into a [`BodyWriter`].
///
/// Types whose wire shape never depends on the value being written (every
/// type except the dynamic [`Value`]) override [`Arg::static_signature`];
/// dynamic containers fall back to inspecting the value itself via
/// [`Arg::signature`].
pub trait Arg: sealed::Sealed {
    /// The signature this type always produces, if its shape is known
    /// without inspecting a value.
    fn static_signature() -> Option<&'static Signature>
    where
        Self: Sized,
    {
        None
    }

    /// The signature this particular value will produce on the wire.
    fn signature(&self) -> Cow<'_, Signature>;

    /// Append this value's wire representation to `writer`.
    fn write(&self, writer: &mut BodyWriter) -> Result<()>;
}

/// A value that can be read back out of a [`BodyReader`].
///
/// Split from [`Arg`] because some writable shapes (borrowed `&str`, for
/// instance) aren't the natural shape to read into; `ReadArg::Output`
/// lets a reader produce `String` while `&str` can still be written.
pub trait ReadArg<'de>: Sized {
    fn read(reader: &mut BodyReader<'de>) -> Result<Self>;
}

pub(crate) use sealed::Sealed;
