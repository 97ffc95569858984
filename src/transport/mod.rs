//! The `transport` module is responsible for handling network communication
//! with subscribers via WebSockets.
//!
//! It maps upgrade request paths to hubs and topics, runs the listener, and
//! drives each subscribed session: a writer task feeding queued events to the
//! socket and a read loop that only watches for the peer going away.

pub mod admission;
pub mod route;
pub mod session;
pub mod websocket;

pub use admission::{Admission, OpenAdmission};
pub use route::{Route, RouteError};
pub use websocket::{serve, start_websocket_server};

#[cfg(test)]
mod websocket_tests;
