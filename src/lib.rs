//! A statically-typed D-Bus client/server library.
//!
//! The wire protocol lives in [`protocol`] and [`signature`]; marshaling
//! Rust values onto and off of it lives in [`arg`]. [`message`] builds on
//! both to provide the owned, inspectable unit of communication that
//! [`connection`] sends and receives over a [`transport`]. [`proxy`] and
//! [`skeleton`] are the two higher-level faces most applications actually
//! use: calling methods on a remote object, and implementing one locally.

mod macros;

pub mod protocol;

pub mod error;
pub use error::{Error, Result};

pub mod signature;

mod buf;

pub mod arg;

pub mod object_path;
pub mod names;

pub mod message;
pub use message::{Message, MessageKind};

pub mod match_rule;
pub use match_rule::MatchRule;

mod sasl;
pub mod transport;
pub use transport::Transport;

pub mod connection;
pub use connection::{Connection, ConnectionBuilder};

pub mod pending_call;
pub use pending_call::PendingCall;

pub mod dispatch;

pub mod proxy;
pub use proxy::Proxy;

pub mod skeleton;
pub use skeleton::ObjectServer;

pub mod bus;
pub use bus::Bus;
