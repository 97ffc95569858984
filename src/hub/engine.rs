//! Hub engine
//!
//! This module contains the in-memory hub responsible for:
//! - admitting connections under a topic and handing out subscription handles
//! - fanning a pre-serialized message out to every subscriber of a topic
//! - tearing connections down exactly once, whatever triggered it
//!
//! Concurrency and usage notes:
//! - Each hub owns one reader/writer lock around its registry. Broadcasts take
//!   the read lock just long enough to copy the topic's connections; subscribe
//!   and teardown take the write lock. No lock is held while delivering.
//! - Delivery is `try_send` into each connection's bounded buffer, so a
//!   broadcast never waits on a slow peer. A failed delivery tears that
//!   connection down after the loop and does not affect the others.
//! - `Hub` is a cheap handle around shared state; clone it into every request
//!   handler or session that needs it.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::HubSettings;
use crate::connection::{Connection, ConnectionId};
use crate::events::{UserEvent, WorkspaceEvent};
use crate::hub::message::Message;
use crate::hub::registry::Registry;
use crate::hub::subscription::SubscriptionHandle;
use crate::hub::topic::{TopicKey, UserEmail, WorkspaceId};
use crate::utils::HubError;

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct HubInner<K: TopicKey> {
    registry: RwLock<Registry<K>>,
    settings: HubSettings,
}

pub struct Hub<K: TopicKey> {
    inner: Arc<HubInner<K>>,
}

pub type WorkspaceHub = Hub<WorkspaceId>;
pub type UserHub = Hub<UserEmail>;

impl<K: TopicKey> Clone for Hub<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: TopicKey> fmt::Debug for Hub<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("Hub")
            .field("namespace", &K::NAMESPACE)
            .field("topics", &registry.topic_count())
            .field("connections", &registry.connection_count())
            .finish()
    }
}

impl<K: TopicKey> Hub<K> {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: RwLock::new(Registry::new()),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.inner.settings
    }

    /// Register a connection under `topic` and mark it open.
    ///
    /// A connection is subscribed at most once in its life: one that is
    /// already open elsewhere, or already closed, is refused.
    pub fn subscribe(
        &self,
        topic: K,
        connection: Arc<Connection>,
    ) -> Result<SubscriptionHandle<K>, HubError> {
        let subscribers = {
            let mut registry = self.inner.registry.write();
            if !connection.mark_open() {
                return Err(HubError::ConnectionInUse(connection.id));
            }
            registry.add(topic.clone(), connection.clone());
            registry.subscriber_count(&topic)
        };
        debug!(
            namespace = K::NAMESPACE,
            topic = %topic,
            conn_id = %connection.id,
            subscribers,
            "connection subscribed"
        );
        Ok(SubscriptionHandle::new(self.clone(), topic, connection))
    }

    /// Tear a connection down: registry removal, then transport close.
    ///
    /// Safe to call from any number of paths at once; only the first call
    /// does anything and returns `true`. A connection that is not registered
    /// under `topic` is left untouched.
    pub fn unsubscribe(&self, topic: &K, connection: &Connection) -> bool {
        {
            let mut registry = self.inner.registry.write();
            if !registry.contains(topic, &connection.id) || !connection.begin_close() {
                return false;
            }
            registry.remove(topic, &connection.id);
        }
        connection.finish_close();
        let connected_for_ms = (chrono::Utc::now() - connection.connected_at).num_milliseconds();
        debug!(
            namespace = K::NAMESPACE,
            topic = %topic,
            conn_id = %connection.id,
            connected_for_ms,
            dropped = connection.dropped_messages(),
            "connection torn down"
        );
        true
    }

    /// Deliver `message` to every connection currently subscribed to `topic`.
    ///
    /// Best effort: a topic without subscribers is a no-op, and connections
    /// that cannot take the message are torn down instead of being retried.
    /// Connections already closing are skipped and not counted.
    pub fn broadcast(&self, topic: &K, message: &Message) -> BroadcastReport {
        let recipients = self.inner.registry.read().snapshot(topic);
        if recipients.is_empty() {
            trace!(namespace = K::NAMESPACE, topic = %topic, kind = message.kind(), "no subscribers");
            return BroadcastReport::default();
        }

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for connection in recipients {
            match connection.try_deliver(message) {
                Ok(()) => report.delivered += 1,
                // another path is already tearing it down
                Err(_) if !connection.is_open() => {
                    trace!(topic = %topic, conn_id = %connection.id, "skipping closing connection");
                }
                Err(e) => {
                    warn!(
                        namespace = K::NAMESPACE,
                        topic = %topic,
                        conn_id = %connection.id,
                        kind = message.kind(),
                        error = %e,
                        "failed to deliver event"
                    );
                    report.failed += 1;
                    dead.push(connection);
                }
            }
        }

        for connection in dead {
            self.unsubscribe(topic, &connection);
        }

        debug!(
            namespace = K::NAMESPACE,
            topic = %topic,
            kind = message.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "broadcast event"
        );
        report
    }

    /// Serialize `event` once and broadcast it.
    pub fn publish<E: Serialize + ?Sized>(
        &self,
        topic: &K,
        event: &E,
    ) -> Result<BroadcastReport, HubError> {
        let message = Message::from_event(event).inspect_err(|e| {
            warn!(namespace = K::NAMESPACE, topic = %topic, error = %e, "dropping unserializable event");
        })?;
        Ok(self.broadcast(topic, &message))
    }

    /// Force every subscriber of `topic` to disconnect.
    pub fn close_topic(&self, topic: &K) -> usize {
        let connections = self.inner.registry.read().snapshot(topic);
        connections
            .iter()
            .filter(|connection| self.unsubscribe(topic, connection))
            .count()
    }

    /// Disconnect everything, e.g. on process shutdown.
    pub fn close_all(&self) -> usize {
        let entries = self.inner.registry.read().entries();
        entries
            .iter()
            .filter(|(topic, connection)| self.unsubscribe(topic, connection))
            .count()
    }

    pub fn contains(&self, topic: &K, id: &ConnectionId) -> bool {
        self.inner.registry.read().contains(topic, id)
    }

    pub fn subscriber_count(&self, topic: &K) -> usize {
        self.inner.registry.read().subscriber_count(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.inner.registry.read().topic_count()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.read().connection_count()
    }

    /// Whether admitting one more connection would exceed `max_connections`.
    pub fn is_full(&self) -> bool {
        self.connection_count() >= self.inner.settings.max_connections
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> parking_lot::RwLockReadGuard<'_, Registry<K>> {
        self.inner.registry.read()
    }
}

/// The two hubs of the process, bundled for injection into handlers.
#[derive(Debug, Clone)]
pub struct Hubs {
    pub workspaces: WorkspaceHub,
    pub users: UserHub,
}

impl Hubs {
    pub fn new(settings: &HubSettings) -> Self {
        Self {
            workspaces: Hub::new(settings.clone()),
            users: Hub::new(settings.clone()),
        }
    }

    /// Notify everyone viewing a workspace.
    pub fn notify_workspace(
        &self,
        workspace: &WorkspaceId,
        event: &WorkspaceEvent,
    ) -> Result<BroadcastReport, HubError> {
        self.workspaces.publish(workspace, event)
    }

    /// Notify every open session of one person.
    pub fn notify_user(
        &self,
        email: &UserEmail,
        event: &UserEvent,
    ) -> Result<BroadcastReport, HubError> {
        self.users.publish(email, event)
    }

    pub fn close_all(&self) -> usize {
        self.workspaces.close_all() + self.users.close_all()
    }
}
