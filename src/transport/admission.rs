//! Subscription admission
//!
//! The upgrade endpoints do not authenticate callers: anyone who knows a
//! workspace id or an email address can follow its events. `Admission` is the
//! hook where an embedding application plugs its own check in. It runs inside
//! the handshake, so a refusal is a plain `403` and nothing is registered.

use tungstenite::handshake::server::Request;

use crate::transport::route::Route;

pub trait Admission: Send + Sync {
    fn admit(&self, route: &Route, request: &Request) -> bool;
}

/// Admits every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAdmission;

impl Admission for OpenAdmission {
    fn admit(&self, _route: &Route, _request: &Request) -> bool {
        true
    }
}
