//! Validated newtypes for the D-Bus name grammars: bus names, interface
//! names, member (method/signal/property) names, and error names (§3
//! supplemental: these are not spelled out as distinct [MODULE]s in the
//! distilled spec, but every operation that accepts a `&str` destination,
//! interface, or member name is, in the wire format, constrained to one of
//! these grammars, the way comparable D-Bus bindings validate eagerly
//! rather than deferring to a runtime protocol error).

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use crate::error::{Error, ErrorKind, Result};

macro_rules! validated_name {
    ($owned:ident, $borrowed:ident, $validate:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Hash, PartialEq, Eq)]
        #[repr(transparent)]
        pub struct $borrowed(str);

        impl $borrowed {
            pub fn new(s: &str) -> Result<&$borrowed> {
                $validate(s)?;
                Ok(unsafe { &*(s as *const str as *const $borrowed) })
            }

            pub(crate) unsafe fn new_unchecked(s: &str) -> &$borrowed {
                &*(s as *const str as *const $borrowed)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn to_owned(&self) -> $owned {
                $owned(self.0.to_owned())
            }
        }

        impl fmt::Debug for $borrowed {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($borrowed), &self.0)
            }
        }

        impl fmt::Display for $borrowed {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        #[doc = $doc]
        #[derive(Debug, Clone, Hash, PartialEq, Eq)]
        pub struct $owned(String);

        impl $owned {
            pub fn new(s: String) -> Result<Self> {
                $validate(&s)?;
                Ok(Self(s))
            }

            pub fn as_borrowed(&self) -> &$borrowed {
                unsafe { $borrowed::new_unchecked(&self.0) }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $owned {
            type Target = $borrowed;

            fn deref(&self) -> &$borrowed {
                self.as_borrowed()
            }
        }

        impl Borrow<$borrowed> for $owned {
            fn borrow(&self) -> &$borrowed {
                self.as_borrowed()
            }
        }

        impl fmt::Display for $owned {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self.as_borrowed(), f)
            }
        }

        impl TryFrom<String> for $owned {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $owned {
            type Error = Error;

            fn try_from(s: &str) -> Result<Self> {
                Self::new(s.to_owned())
            }
        }
    };
}

validated_name!(
    OwnedBusName,
    BusName,
    validate_bus_name,
    "A validated bus name: either unique (`:1.42`) or well-known \
     (`org.freedesktop.DBus`)."
);
validated_name!(
    OwnedInterfaceName,
    InterfaceName,
    validate_interface_name,
    "A validated interface name, e.g. `org.freedesktop.DBus.Properties`."
);
validated_name!(
    OwnedMemberName,
    MemberName,
    validate_member_name,
    "A validated method, signal, or property name, e.g. `GetAll`."
);
validated_name!(
    OwnedErrorName,
    ErrorName,
    validate_interface_name,
    "A validated D-Bus error name; shares the interface name grammar."
);

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Shared grammar for bus and interface names: dot-separated elements,
/// each starting with a letter or underscore (for bus names, a leading
/// digit is allowed in elements after the first, which this also permits
/// uniformly since the bus daemon itself is the strict enforcer).
fn validate_dotted(s: &str, min_elements: usize) -> Result<()> {
    if s.is_empty() || s.len() > 255 {
        return Err(ErrorKind::InvalidArgs.at());
    }
    let elements: Vec<&str> = s.split('.').collect();
    if elements.len() < min_elements {
        return Err(ErrorKind::InvalidArgs.at());
    }
    for element in elements {
        if element.is_empty() || !element.bytes().all(is_name_byte) {
            return Err(ErrorKind::InvalidArgs.at());
        }
        if element.as_bytes()[0].is_ascii_digit() {
            return Err(ErrorKind::InvalidArgs.at());
        }
    }
    Ok(())
}

fn validate_bus_name(s: &str) -> Result<()> {
    if let Some(unique) = s.strip_prefix(':') {
        if unique.is_empty() || s.len() > 255 {
            return Err(ErrorKind::InvalidArgs.at());
        }
        for element in unique.split('.') {
            if element.is_empty() || !element.bytes().all(is_name_byte) {
                return Err(ErrorKind::InvalidArgs.at());
            }
        }
        return Ok(());
    }
    validate_dotted(s, 2)
}

fn validate_interface_name(s: &str) -> Result<()> {
    validate_dotted(s, 2)
}

fn validate_member_name(s: &str) -> Result<()> {
    if s.is_empty() || s.len() > 255 {
        return Err(ErrorKind::InvalidArgs.at());
    }
    if s.as_bytes()[0].is_ascii_digit() {
        return Err(ErrorKind::InvalidArgs.at());
    }
    if !s.bytes().all(is_name_byte) {
        return Err(ErrorKind::InvalidArgs.at());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_known_and_unique_bus_names() {
        assert!(BusName::new("org.freedesktop.DBus").is_ok());
        assert!(BusName::new(":1.42").is_ok());
        assert!(BusName::new(":1.42.7").is_ok());
    }

    #[test]
    fn rejects_malformed_bus_names() {
        assert!(BusName::new("").is_err());
        assert!(BusName::new("singleelement").is_err());
        assert!(BusName::new(":").is_err());
        assert!(BusName::new("org.freedesktop.").is_err());
        assert!(BusName::new("org.2invalid.Leading").is_err());
    }

    #[test]
    fn accepts_and_rejects_interface_names() {
        assert!(InterfaceName::new("org.freedesktop.DBus.Properties").is_ok());
        assert!(InterfaceName::new("NoDot").is_err());
        assert!(InterfaceName::new("org..Empty").is_err());
    }

    #[test]
    fn accepts_and_rejects_member_names() {
        assert!(MemberName::new("GetAll").is_ok());
        assert!(MemberName::new("_leading_underscore").is_ok());
        assert!(MemberName::new("").is_err());
        assert!(MemberName::new("1LeadingDigit").is_err());
        assert!(MemberName::new("has-a-dash").is_err());
    }

    #[test]
    fn error_names_share_interface_grammar() {
        assert!(ErrorName::new("org.freedesktop.DBus.Error.Failed").is_ok());
        assert!(ErrorName::new("NoDot").is_err());
    }

    #[test]
    fn owned_name_round_trips_through_as_borrowed() {
        let owned = OwnedBusName::new("org.freedesktop.DBus".to_owned()).unwrap();
        assert_eq!(owned.as_borrowed(), BusName::new("org.freedesktop.DBus").unwrap());
        assert_eq!(owned.as_str(), "org.freedesktop.DBus");
    }

    #[test]
    fn try_from_validates() {
        assert!(OwnedMemberName::try_from("Ping").is_ok());
        assert!(OwnedMemberName::try_from("1Bad").is_err());
    }
}
