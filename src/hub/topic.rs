//! Topic keys
//!
//! A topic is the key under which connections are grouped for broadcast. Each
//! hub serves exactly one namespace, and each namespace has its own key type,
//! so a workspace hub cannot be handed an email (or the other way round).

use std::fmt;
use std::hash::Hash;

use crate::utils::HubError;

/// A key identifying one broadcast scope inside a single namespace.
pub trait TopicKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// Human readable namespace name, used in logs and errors.
    const NAMESPACE: &'static str;

    /// Validate and normalize a raw topic string.
    fn parse(raw: &str) -> Result<Self, HubError>;

    fn as_str(&self) -> &str;
}

fn invalid<K: TopicKey>(value: &str, reason: &'static str) -> HubError {
    HubError::InvalidTopic {
        namespace: K::NAMESPACE,
        value: value.to_string(),
        reason,
    }
}

/// Topic of the workspace hub: the identifier of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceId(String);

impl TopicKey for WorkspaceId {
    const NAMESPACE: &'static str = "workspace";

    fn parse(raw: &str) -> Result<Self, HubError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(invalid::<Self>(raw, "must not be empty"));
        }
        if id.contains('/') {
            return Err(invalid::<Self>(raw, "must not contain '/'"));
        }
        Ok(Self(id.to_string()))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Topic of the user hub: the (lower-cased) email address of a person.
///
/// Addresses are matched case-insensitively: `Alice@Example.com` and
/// `alice@example.com` are one topic. Producers holding an address from a
/// request body or the database get the key through `UserEmail::parse`, the
/// same normalization the `/ws/invitations/{email}` route applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserEmail(String);

impl TopicKey for UserEmail {
    const NAMESPACE: &'static str = "user";

    fn parse(raw: &str) -> Result<Self, HubError> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return Err(invalid::<Self>(raw, "must not be empty"));
        }
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(email))
            }
            _ => Err(invalid::<Self>(raw, "must be a single address of the form local@domain")),
        }
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
