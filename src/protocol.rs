//! Low level details of the D-Bus wire protocol: type codes, the fixed
//! message header, and the flag bits carried in it.
//!
//! This module only knows about bytes and layout. It has no opinion on
//! transports, connections, or handlers.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

use crate::macros::raw_enum;

raw_enum! {
    /// The endianness a message was encoded with.
    #[repr(u8)]
    pub enum Endianness {
        /// Little endian, the ASCII letter `l`.
        LITTLE = b'l',
        /// Big endian, the ASCII letter `B`.
        BIG = b'B',
    }
}

impl Endianness {
    /// The endianness native to this platform.
    #[cfg(target_endian = "little")]
    pub(crate) const NATIVE: Self = Self::LITTLE;
    #[cfg(target_endian = "big")]
    pub(crate) const NATIVE: Self = Self::BIG;
}

raw_enum! {
    /// The D-Bus message type, carried in the header's second byte.
    #[repr(u8)]
    pub enum MessageType {
        /// Not a valid message type.
        INVALID = 0,
        /// A method call, may prompt a reply.
        METHOD_CALL = 1,
        /// A method reply carrying return values.
        METHOD_RETURN = 2,
        /// An error reply.
        ERROR = 3,
        /// A signal emission.
        SIGNAL = 4,
    }
}

raw_enum! {
    /// The single-byte D-Bus argument type codes (§3, §4.A of the design).
    #[repr(u8)]
    pub enum Type {
        /// Not a valid type code; terminates signatures.
        INVALID = 0,
        BYTE = b'y',
        BOOLEAN = b'b',
        INT16 = b'n',
        UINT16 = b'q',
        INT32 = b'i',
        UINT32 = b'u',
        INT64 = b'x',
        UINT64 = b't',
        DOUBLE = b'd',
        STRING = b's',
        OBJECT_PATH = b'o',
        SIGNATURE = b'g',
        ARRAY = b'a',
        STRUCT = b'r',
        OPEN_PAREN = b'(',
        CLOSE_PAREN = b')',
        VARIANT = b'v',
        DICT_ENTRY = b'e',
        OPEN_BRACE = b'{',
        CLOSE_BRACE = b'}',
        UNIX_FD = b'h',
    }
}

impl Type {
    /// True for the fixed-shape scalar and string-like types.
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            Type::BYTE
                | Type::BOOLEAN
                | Type::INT16
                | Type::UINT16
                | Type::INT32
                | Type::UINT32
                | Type::INT64
                | Type::UINT64
                | Type::DOUBLE
                | Type::STRING
                | Type::OBJECT_PATH
                | Type::SIGNATURE
                | Type::UNIX_FD
        )
    }

    /// True for array, variant, struct, and dict-entry.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Type::ARRAY | Type::VARIANT | Type::STRUCT | Type::DICT_ENTRY
        )
    }

    /// The fixed size in bytes of a basic, non-string type, if statically
    /// known (strings and object paths are length-prefixed, not fixed-size).
    pub(crate) fn fixed_size(self) -> Option<usize> {
        Some(match self {
            Type::BYTE => 1,
            Type::BOOLEAN | Type::INT32 | Type::UINT32 | Type::UNIX_FD => 4,
            Type::INT16 | Type::UINT16 => 2,
            Type::INT64 | Type::UINT64 | Type::DOUBLE => 8,
            _ => return None,
        })
    }

    /// The alignment in bytes required before a value of this type.
    pub(crate) fn alignment(self) -> usize {
        match self {
            Type::BYTE | Type::SIGNATURE | Type::VARIANT => 1,
            Type::INT16 | Type::UINT16 => 2,
            Type::BOOLEAN
            | Type::INT32
            | Type::UINT32
            | Type::UNIX_FD
            | Type::ARRAY
            | Type::STRING
            | Type::OBJECT_PATH => 4,
            Type::INT64
            | Type::UINT64
            | Type::DOUBLE
            | Type::STRUCT
            | Type::OPEN_PAREN
            | Type::DICT_ENTRY
            | Type::OPEN_BRACE => 8,
            _ => 1,
        }
    }
}

raw_enum! {
    /// The header field codes carried alongside the fixed header.
    #[repr(u8)]
    pub(crate) enum HeaderField {
        INVALID = 0,
        PATH = 1,
        INTERFACE = 2,
        MEMBER = 3,
        ERROR_NAME = 4,
        REPLY_SERIAL = 5,
        DESTINATION = 6,
        SENDER = 7,
        SIGNATURE = 8,
        UNIX_FDS = 9,
    }
}

/// Flag bits carried in a message header.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Flags(pub(crate) u8);

impl Flags {
    /// No flags set.
    pub const EMPTY: Self = Self(0);
    /// The sender does not want a reply, even for a message type that could
    /// carry one.
    pub const NO_REPLY_EXPECTED: Self = Self(0x1);
    /// The bus must not auto-start an owner for the destination.
    pub const NO_AUTO_START: Self = Self(0x2);
    /// The sender is prepared to wait for interactive authorization.
    pub const ALLOW_INTERACTIVE_AUTHORIZATION: Self = Self(0x4);
}

impl BitOr for Flags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Flags {
    type Output = bool;
    #[inline]
    fn bitand(self, rhs: Self) -> bool {
        self.0 & rhs.0 != 0
    }
}

impl BitXor for Flags {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#x})", self.0)
    }
}

/// Current D-Bus protocol version supported by this crate.
pub(crate) const PROTOCOL_VERSION: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_with_bitor_and_test_with_bitand() {
        let combined = Flags::NO_REPLY_EXPECTED | Flags::NO_AUTO_START;
        assert!(combined & Flags::NO_REPLY_EXPECTED);
        assert!(combined & Flags::NO_AUTO_START);
        assert!(!(combined & Flags::ALLOW_INTERACTIVE_AUTHORIZATION));
    }

    #[test]
    fn empty_flags_match_nothing() {
        assert!(!(Flags::EMPTY & Flags::NO_REPLY_EXPECTED));
    }

    #[test]
    fn message_type_round_trips_through_its_raw_byte() {
        assert_eq!(MessageType::METHOD_CALL.0, 1);
        assert_eq!(MessageType::SIGNAL.0, 4);
    }
}
