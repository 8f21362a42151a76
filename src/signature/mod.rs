//! Signature composition and parsing (§4.A).

pub use self::signature::{CompleteTypeIter, Signature};
#[allow(clippy::module_inception)]
mod signature;

pub use self::owned_signature::OwnedSignature;
mod owned_signature;

pub use self::builder::SignatureBuilder;
mod builder;

pub use self::error::SignatureError;
mod error;

pub(crate) mod validate;

#[cfg(test)]
mod tests;
