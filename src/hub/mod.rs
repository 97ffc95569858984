//! The `hub` module is the realtime fan-out core.
//!
//! A `Hub<K>` groups live connections by topic and broadcasts event messages
//! to them. It is generic over the topic namespace and instantiated twice: a
//! `WorkspaceHub` keyed by workspace id and a `UserHub` keyed by email.

pub mod engine;
pub mod message;
pub mod registry;
pub mod subscription;
pub mod topic;

pub use engine::{BroadcastReport, Hub, Hubs, UserHub, WorkspaceHub};
pub use message::Message;
pub use registry::Registry;
pub use subscription::SubscriptionHandle;
pub use topic::{TopicKey, UserEmail, WorkspaceId};
