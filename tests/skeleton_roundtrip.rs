//! Drives a `Proxy` against an `ObjectServer` entirely in-process over a
//! `UnixStream::pair()`, with no bus daemon involved: one thread plays the
//! server side of the connection, the test thread plays the client.

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rdbus::connection::DispatchStatus;
use rdbus::names::{BusName, InterfaceName, MemberName};
use rdbus::object_path::ObjectPath;
use rdbus::{ConnectionBuilder, ObjectServer, Proxy};

const INTERFACE: &str = "com.example.Widget";

fn spawn_server(server_stream: UnixStream) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let connection = Arc::new(
            ConnectionBuilder::transport(server_stream)
                .private()
                .connect()
                .expect("server connect"),
        );
        connection.set_nonblocking(true).expect("nonblocking");

        let server = ObjectServer::new(connection.clone());
        let path = ObjectPath::new("/com/example/Widget").unwrap();
        let interface = InterfaceName::new(INTERFACE).unwrap();

        server
            .method(path, interface, MemberName::new("Double").unwrap(), |n: i32| Ok(n * 2))
            .unwrap();

        server
            .property(
                path,
                interface,
                MemberName::new("Name").unwrap(),
                || Ok(String::from("widget")),
                Some(|_: String| Ok(())),
            )
            .unwrap();

        while !stop_flag.load(Ordering::Relaxed) {
            let _ = connection.read_available();
            loop {
                match connection.dispatch() {
                    Ok(DispatchStatus::DataRemains) => continue,
                    _ => break,
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
    });

    (stop, handle)
}

#[test]
fn method_call_round_trips_over_a_paired_transport() {
    let (client_stream, server_stream) = UnixStream::pair().unwrap();
    let (stop, handle) = spawn_server(server_stream);

    let connection = Arc::new(ConnectionBuilder::transport(client_stream).private().connect().unwrap());
    let proxy = Proxy::new(
        connection,
        BusName::new("com.example.DoesNotMatter").unwrap(),
        ObjectPath::new("/com/example/Widget").unwrap(),
    );

    let result: i32 = proxy
        .methods(InterfaceName::new(INTERFACE).unwrap())
        .call(MemberName::new("Double").unwrap(), 21i32)
        .unwrap();
    assert_eq!(result, 42);

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}

#[test]
fn property_get_and_set_round_trip_over_a_paired_transport() {
    let (client_stream, server_stream) = UnixStream::pair().unwrap();
    let (stop, handle) = spawn_server(server_stream);

    let connection = Arc::new(ConnectionBuilder::transport(client_stream).private().connect().unwrap());
    let proxy = Proxy::new(
        connection,
        BusName::new("com.example.DoesNotMatter").unwrap(),
        ObjectPath::new("/com/example/Widget").unwrap(),
    );
    let properties = proxy.properties(InterfaceName::new(INTERFACE).unwrap());

    let name: String = properties.get(MemberName::new("Name").unwrap()).unwrap();
    assert_eq!(name, "widget");

    properties.set(MemberName::new("Name").unwrap(), String::from("gadget")).unwrap();

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}

#[test]
fn signal_emitted_by_one_peer_is_observed_by_the_other() {
    let (a_stream, b_stream) = UnixStream::pair().unwrap();
    let a = Arc::new(ConnectionBuilder::transport(a_stream).private().connect().unwrap());
    let b = Arc::new(ConnectionBuilder::transport(b_stream).private().connect().unwrap());
    a.set_nonblocking(true).unwrap();

    let path = ObjectPath::new("/com/example/Widget").unwrap();
    let received = Arc::new(std::sync::Mutex::new(None));
    let recorder = received.clone();

    let a_proxy = Proxy::new(a.clone(), BusName::new("com.example.DoesNotMatter").unwrap(), path);
    a_proxy
        .signals(InterfaceName::new(INTERFACE).unwrap())
        .connect(MemberName::new("Pinged").unwrap(), move |text: String| {
            *recorder.lock().unwrap() = Some(text);
        })
        .unwrap();

    // `a` listens at `path`, but emission only needs a connection, not a
    // `Proxy` bound to the same address — any connection can send a signal.
    let b_proxy = Proxy::new(b.clone(), BusName::new("com.example.DoesNotMatter").unwrap(), path);
    b_proxy
        .signals(InterfaceName::new(INTERFACE).unwrap())
        .emit(MemberName::new("Pinged").unwrap(), String::from("hello"))
        .unwrap();

    for _ in 0..50 {
        a.read_available().unwrap();
        loop {
            match a.dispatch().unwrap() {
                DispatchStatus::DataRemains => continue,
                _ => break,
            }
        }
        if received.lock().unwrap().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(received.lock().unwrap().as_deref(), Some("hello"));
}
