//! Exercises the `Bus` facade against a real bus daemon. Ignored by
//! default since it needs `DBUS_SESSION_BUS_ADDRESS` pointing at one;
//! run with `cargo test -- --ignored` under a session bus (e.g. inside
//! `dbus-run-session`).

use std::sync::Arc;

use rdbus::names::BusName;
use rdbus::{Bus, ConnectionBuilder};

fn connect() -> Arc<rdbus::Connection> {
    Arc::new(ConnectionBuilder::session().connect().expect("connect to session bus"))
}

#[test]
#[ignore]
fn list_names_includes_self() {
    let connection = connect();
    let own_name = connection.unique_name().expect("registered during connect");
    let bus = Bus::new(connection);

    let names = bus.list_names().unwrap();
    assert!(names.iter().any(|n| n == own_name.as_str()));
}

#[test]
#[ignore]
fn get_name_owner_resolves_the_bus_itself() {
    let connection = connect();
    let bus = Bus::new(connection);

    let owner = bus.get_name_owner(BusName::new("org.freedesktop.DBus").unwrap()).unwrap();
    assert_eq!(owner, "org.freedesktop.DBus");
}

#[test]
#[ignore]
fn request_and_release_a_name() {
    let connection = connect();
    let bus = Bus::new(connection);
    let name = BusName::new("com.example.RdbusTestOwner").unwrap();

    let request_result = bus.request_name(name, 0).unwrap();
    assert!(request_result == 1 || request_result == 4);

    let has_owner = bus.name_has_owner(name).unwrap();
    assert!(has_owner);

    bus.release_name(name).unwrap();
}
