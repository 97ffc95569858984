//! The `connection` module defines the representation of one live subscriber.
//!
//! It provides the `Connection` struct, which encapsulates the outbound side
//! of a single WebSocket session: a bounded channel drained by the session's
//! writer task, the session's lifecycle state, and the token that closes the
//! transport.

pub mod client;
pub use client::{Connection, ConnectionId, ConnectionState};
