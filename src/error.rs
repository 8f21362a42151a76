use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;

use crate::signature::SignatureError;

/// Result alias using [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The closed set of error kinds this crate can produce (§7 of the design).
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    /// A reply-type error received from a peer, carrying the D-Bus error
    /// name and optional human-readable text.
    pub fn remote(name: impl Into<String>, text: impl Into<String>) -> Error {
        Self::new(ErrorKind::Remote(name.into(), text.into()))
    }

    /// Shorthand for a `org.freedesktop.DBus.Error.Failed` remote error.
    pub fn failed(text: impl Into<String>) -> Error {
        Self::remote("org.freedesktop.DBus.Error.Failed", text)
    }

    /// If this is a [`ErrorKind::Remote`] error, its `(name, text)` pair.
    pub fn as_remote(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::Remote(name, text) => Some((name, text)),
            _ => None,
        }
    }

    /// The D-Bus error name to use when this error is sent back to a peer
    /// as an error reply.
    pub(crate) fn error_name(&self) -> &str {
        match &self.kind {
            ErrorKind::Remote(name, _) => name,
            ErrorKind::PropertyReadOnly => "org.freedesktop.DBus.Error.PropertyReadOnly",
            ErrorKind::UnknownProperty => "org.freedesktop.DBus.Error.UnknownProperty",
            ErrorKind::UnknownMethod => "org.freedesktop.DBus.Error.UnknownMethod",
            ErrorKind::UnknownInterface => "org.freedesktop.DBus.Error.UnknownInterface",
            ErrorKind::UnknownObject => "org.freedesktop.DBus.Error.UnknownObject",
            ErrorKind::InvalidArgs => "org.freedesktop.DBus.Error.InvalidArgs",
            ErrorKind::NoReply => "org.freedesktop.DBus.Error.NoReply",
            ErrorKind::Disconnected => "org.freedesktop.DBus.Error.Disconnected",
            _ => "org.freedesktop.DBus.Error.Failed",
        }
    }

    #[inline]
    pub(crate) fn would_block(&self) -> bool {
        matches!(self.kind, ErrorKind::WouldBlock)
    }
}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(ErrorKind::InvalidSignature(error))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => Self::new(ErrorKind::WouldBlock),
            _ => Self::new(ErrorKind::Io(error)),
        }
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::new(ErrorKind::Utf8Error(error))
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(error) => error.fmt(f),
            ErrorKind::InvalidSignature(error) => error.fmt(f),
            ErrorKind::Utf8Error(error) => error.fmt(f),
            ErrorKind::WouldBlock => write!(f, "would block"),
            ErrorKind::OutOfMemory => write!(f, "out of memory"),
            ErrorKind::Disconnected => write!(f, "connection is closed or lost"),
            ErrorKind::NoReply => write!(f, "timed out waiting for a reply"),
            ErrorKind::TypeMismatch => write!(f, "unexpected wire type"),
            ErrorKind::PropertyReadOnly => write!(f, "property is read-only"),
            ErrorKind::UnknownProperty => write!(f, "unknown property"),
            ErrorKind::UnknownMethod => write!(f, "unknown method"),
            ErrorKind::UnknownInterface => write!(f, "unknown interface"),
            ErrorKind::UnknownObject => write!(f, "unknown object"),
            ErrorKind::InvalidArgs => write!(f, "argument shape rejected"),
            ErrorKind::Remote(name, text) => write!(f, "{name}: {text}"),
            ErrorKind::Fatal(message) => write!(f, "programming error: {message}"),
            ErrorKind::MissingBus => write!(f, "missing bus address"),
            ErrorKind::InvalidAddress => write!(f, "invalid d-bus address"),
            ErrorKind::InvalidSasl => write!(f, "invalid SASL message"),
            ErrorKind::BufferUnderflow => write!(f, "buffer underflow"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            ErrorKind::InvalidSignature(error) => Some(error),
            ErrorKind::Utf8Error(error) => Some(error),
            _ => None,
        }
    }
}

/// The closed error-kind set from spec §7. `Remote` carries an arbitrary
/// fully-qualified D-Bus error name together with optional text, and is how
/// unknown remote error names are preserved verbatim.
#[derive(Debug)]
pub(crate) enum ErrorKind {
    Io(io::Error),
    InvalidSignature(SignatureError),
    Utf8Error(Utf8Error),
    WouldBlock,
    OutOfMemory,
    Disconnected,
    NoReply,
    TypeMismatch,
    PropertyReadOnly,
    UnknownProperty,
    UnknownMethod,
    UnknownInterface,
    UnknownObject,
    InvalidArgs,
    Remote(String, String),
    /// A programming error: concurrent read/append cursors, asking a
    /// dynamic argument for a static type code, etc.
    Fatal(&'static str),
    MissingBus,
    InvalidAddress,
    InvalidSasl,
    BufferUnderflow,
}

impl ErrorKind {
    pub(crate) fn at(self) -> Error {
        Error::new(self)
    }
}
