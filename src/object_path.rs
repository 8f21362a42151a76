//! Object path validation and the borrowed/owned path types (§3, supplemental
//! to the distilled spec: validated string newtypes grounded in the
//! `strings` conventions used by comparable D-Bus bindings).

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use crate::error::{Error, ErrorKind, Result};

/// A borrowed, validated D-Bus object path, e.g. `/org/freedesktop/DBus`.
#[derive(Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct ObjectPath(str);

impl ObjectPath {
    /// Validate and borrow `s` as an object path.
    pub fn new(s: &str) -> Result<&ObjectPath> {
        validate(s)?;
        // SAFETY: `ObjectPath` is `repr(transparent)` over `str`.
        Ok(unsafe { &*(s as *const str as *const ObjectPath) })
    }

    pub(crate) unsafe fn new_unchecked(s: &str) -> &ObjectPath {
        &*(s as *const str as *const ObjectPath)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_owned(&self) -> OwnedObjectPath {
        OwnedObjectPath(self.0.to_owned())
    }

    /// The parent path, e.g. `/org/freedesktop` for `/org/freedesktop/DBus`,
    /// or `None` for the root path `/`.
    pub fn parent(&self) -> Option<&ObjectPath> {
        if self.0 == "/" {
            return None;
        }
        let idx = self.0.rfind('/')?;
        let parent = if idx == 0 { "/" } else { &self.0[..idx] };
        Some(unsafe { ObjectPath::new_unchecked(parent) })
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({:?})", &self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An owned, validated D-Bus object path.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct OwnedObjectPath(String);

impl OwnedObjectPath {
    pub fn new(s: String) -> Result<Self> {
        validate(&s)?;
        Ok(Self(s))
    }

    pub fn as_path(&self) -> &ObjectPath {
        unsafe { ObjectPath::new_unchecked(&self.0) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for OwnedObjectPath {
    type Target = ObjectPath;

    fn deref(&self) -> &ObjectPath {
        self.as_path()
    }
}

impl Borrow<ObjectPath> for OwnedObjectPath {
    fn borrow(&self) -> &ObjectPath {
        self.as_path()
    }
}

impl fmt::Display for OwnedObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_path(), f)
    }
}

impl PartialEq<ObjectPath> for OwnedObjectPath {
    fn eq(&self, other: &ObjectPath) -> bool {
        self.as_path() == other
    }
}

impl TryFrom<String> for OwnedObjectPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for OwnedObjectPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s.to_owned())
    }
}

/// Object path grammar (D-Bus spec §Marshaling, "Valid Object Paths"): a
/// slash-separated sequence of elements each matching `[A-Za-z0-9_]+`, with
/// no trailing slash except for the root path `/` itself.
fn validate(s: &str) -> Result<()> {
    if !s.starts_with('/') {
        return Err(ErrorKind::InvalidArgs.at());
    }
    if s == "/" {
        return Ok(());
    }
    if s.ends_with('/') {
        return Err(ErrorKind::InvalidArgs.at());
    }
    for element in s[1..].split('/') {
        if element.is_empty()
            || !element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ErrorKind::InvalidArgs.at());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_root_and_nested_paths() {
        assert!(ObjectPath::new("/").is_ok());
        assert!(ObjectPath::new("/org/freedesktop/DBus").is_ok());
        assert!(ObjectPath::new("/a1/_b2").is_ok());
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(ObjectPath::new("").is_err());
        assert!(ObjectPath::new("no/leading/slash").is_err());
        assert!(ObjectPath::new("/trailing/").is_err());
        assert!(ObjectPath::new("/double//slash").is_err());
        assert!(ObjectPath::new("/has-a-dash").is_err());
    }

    #[test]
    fn parent_walks_up_to_root_then_none() {
        let path = ObjectPath::new("/org/freedesktop/DBus").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "/org/freedesktop");

        let grandparent = parent.parent().unwrap();
        assert_eq!(grandparent.as_str(), "/org");

        let root = grandparent.parent().unwrap();
        assert_eq!(root.as_str(), "/");
        assert!(root.parent().is_none());
    }

    #[test]
    fn owned_path_round_trips_through_as_path() {
        let owned = OwnedObjectPath::new("/com/example/Widget".to_owned()).unwrap();
        assert_eq!(owned.as_path(), ObjectPath::new("/com/example/Widget").unwrap());
        assert_eq!(owned.as_str(), "/com/example/Widget");
    }

    #[test]
    fn try_from_rejects_invalid_strings() {
        assert!(OwnedObjectPath::try_from("relative/path").is_err());
        assert!(OwnedObjectPath::try_from("/ok/path".to_owned()).is_ok());
    }
}
