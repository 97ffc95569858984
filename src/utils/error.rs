//! The `error` module defines the error types used within the `hubsub` application.
//!
//! `HubError` covers everything that can go wrong while building topics,
//! subscribing connections, serializing events, loading configuration or
//! binding the listener.
//! `DeliveryError` is the per-connection write failure reported by the
//! broadcast path; it never propagates to the broadcasting caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid {namespace} topic {value:?}: {reason}")]
    InvalidTopic {
        namespace: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event payload has no string `type` discriminator")]
    MissingEventType,

    #[error("connection {0} was already subscribed or has been closed")]
    ConnectionInUse(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single connection could not take a broadcast message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound buffer is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}
