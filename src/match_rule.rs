//! Match rules for subscribing to bus-delivered signals (§4.H).
//!
//! A rule only ever tells the bus daemon what to deliver; it never
//! filters locally (§4.H: "Match rules never filter client-side
//! dispatch"). Local filtering of what's delivered is the job of
//! `signal.connect`'s own interface/member matching.

use std::fmt;

use crate::names::{BusName, InterfaceName, MemberName};
use crate::object_path::ObjectPath;
use crate::protocol::MessageType;

/// One of the four message types a rule can restrict matches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMessageType {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

impl MatchMessageType {
    fn as_str(self) -> &'static str {
        match self {
            MatchMessageType::MethodCall => "method_call",
            MatchMessageType::MethodReturn => "method_return",
            MatchMessageType::Error => "error",
            MatchMessageType::Signal => "signal",
        }
    }

    pub(crate) fn matches(self, message_type: MessageType) -> bool {
        let expect = match self {
            MatchMessageType::MethodCall => MessageType::METHOD_CALL,
            MatchMessageType::MethodReturn => MessageType::METHOD_RETURN,
            MatchMessageType::Error => MessageType::ERROR,
            MatchMessageType::Signal => MessageType::SIGNAL,
        };
        message_type == expect
    }
}

/// A filter sent to `AddMatch`/`RemoveMatch`, built up fluently and
/// rendered to the bus daemon's `k='v',k='v',…` grammar.
#[derive(Debug, Clone, Default)]
pub struct MatchRule {
    message_type: Option<MatchMessageType>,
    sender: Option<String>,
    path: Option<String>,
    path_namespace: Option<String>,
    destination: Option<String>,
    interface: Option<String>,
    member: Option<String>,
    eavesdrop: Option<bool>,
}

impl MatchRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_type(mut self, message_type: MatchMessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    pub fn sender(mut self, sender: &BusName) -> Self {
        self.sender = Some(sender.as_str().to_owned());
        self
    }

    pub fn path(mut self, path: &ObjectPath) -> Self {
        self.path = Some(path.as_str().to_owned());
        self
    }

    /// Match any path that is `namespace` itself or nested under it.
    pub fn path_namespace(mut self, namespace: &ObjectPath) -> Self {
        self.path_namespace = Some(namespace.as_str().to_owned());
        self
    }

    pub fn destination(mut self, destination: &BusName) -> Self {
        self.destination = Some(destination.as_str().to_owned());
        self
    }

    pub fn interface(mut self, interface: &InterfaceName) -> Self {
        self.interface = Some(interface.as_str().to_owned());
        self
    }

    pub fn member(mut self, member: &MemberName) -> Self {
        self.member = Some(member.as_str().to_owned());
        self
    }

    pub fn eavesdrop(mut self, eavesdrop: bool) -> Self {
        self.eavesdrop = Some(eavesdrop);
        self
    }

    /// The interface this rule restricts matches to, if any — used by a
    /// connection's local signal dispatch to decide whether a rule's
    /// subscriber should even be offered a message (§4.H's no-local-filter
    /// guarantee governs the bus, not this optimization: a rule with no
    /// interface set is offered every signal regardless).
    pub(crate) fn local_interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub(crate) fn local_member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// Render the canonical `k='v',k='v',…` encoding sent to `AddMatch`.
    pub fn encode(&self) -> String {
        let mut parts = Vec::new();
        if let Some(message_type) = self.message_type {
            parts.push(format!("type='{}'", message_type.as_str()));
        }
        if let Some(sender) = &self.sender {
            parts.push(format!("sender='{sender}'"));
        }
        if let Some(path) = &self.path {
            parts.push(format!("path='{path}'"));
        }
        if let Some(path_namespace) = &self.path_namespace {
            parts.push(format!("path_namespace='{path_namespace}'"));
        }
        if let Some(destination) = &self.destination {
            parts.push(format!("destination='{destination}'"));
        }
        if let Some(interface) = &self.interface {
            parts.push(format!("interface='{interface}'"));
        }
        if let Some(member) = &self.member {
            parts.push(format!("member='{member}'"));
        }
        if let Some(eavesdrop) = self.eavesdrop {
            parts.push(format!("eavesdrop='{eavesdrop}'"));
        }
        parts.join(",")
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_empty_rule_as_empty_string() {
        assert_eq!(MatchRule::new().encode(), "");
    }

    #[test]
    fn encodes_signal_subscription() {
        let interface = InterfaceName::new("org.freedesktop.DBus").unwrap();
        let rule = MatchRule::new()
            .message_type(MatchMessageType::Signal)
            .interface(interface)
            .sender(BusName::new("org.freedesktop.DBus").unwrap());
        assert_eq!(
            rule.encode(),
            "type='signal',sender='org.freedesktop.DBus',interface='org.freedesktop.DBus'"
        );
    }

    #[test]
    fn encodes_path_namespace() {
        let rule = MatchRule::new().path_namespace(ObjectPath::new("/org/freedesktop").unwrap());
        assert_eq!(rule.encode(), "path_namespace='/org/freedesktop'");
    }
}
