//! Renders the introspection XML `org.freedesktop.DBus.Introspectable`
//! hands back, built from whatever's been registered at a path so far.

use std::fmt::Write as _;

use super::PathState;

const HEADER: &str = concat!(
    "<?xml version=\"1.0\"?>\n",
    "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n",
    " \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n",
);

pub(super) fn render(state: &PathState) -> String {
    let mut xml = String::from(HEADER);
    xml.push_str("<node>\n");

    let mut interfaces: Vec<&String> = state.interfaces.keys().collect();
    interfaces.sort();
    for name in interfaces {
        let iface = &state.interfaces[name];
        let _ = writeln!(xml, "  <interface name=\"{name}\">");
        for method in &iface.methods {
            let _ = writeln!(xml, "    <method name=\"{method}\"/>");
        }
        for signal in &iface.signals {
            let _ = writeln!(xml, "    <signal name=\"{signal}\"/>");
        }
        let mut properties: Vec<&String> = iface.properties.keys().collect();
        properties.sort();
        for name in properties {
            let entry = &iface.properties[name];
            let access = if entry.set.is_some() { "readwrite" } else { "read" };
            let sig = entry.signature.as_signature();
            let _ = writeln!(xml, "    <property name=\"{name}\" type=\"{sig}\" access=\"{access}\"/>");
        }
        xml.push_str("  </interface>\n");
    }

    xml.push_str("</node>\n");
    xml
}
