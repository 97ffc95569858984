//! # HubSub
//!
//! `hubsub` is an in-memory topic hub that pushes server-side events to
//! WebSocket subscribers. Clients never publish: they open a socket on a
//! topic and receive every event the application emits for it until they go
//! away.
//!
//! Two independent hubs run side by side:
//!
//! - the workspace hub, keyed by workspace id, served on `/ws/{workspaceId}`
//! - the user hub, keyed by email address, served on `/ws/invitations/{email}`
//!
//! ## Core Modules
//!
//! - `hub`: topic keys, the connection registry, broadcast and teardown.
//! - `connection`: one live subscriber and its bounded outbound buffer.
//! - `events`: the JSON events producers emit on each hub.
//! - `transport`: the WebSocket listener, path routing and per-session tasks.
//! - `config`: layered settings from an optional file and the environment.
//! - `utils`: error types and logging setup.

pub mod config;
pub mod connection;
pub mod events;
pub mod hub;
pub mod transport;
pub mod utils;
