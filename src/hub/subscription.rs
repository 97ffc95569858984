//! Subscription lifecycle
//!
//! `Hub::subscribe` hands back a `SubscriptionHandle`. Releasing or dropping
//! the handle runs the hub's teardown for that connection: registry removal,
//! then transport close. The same teardown is reachable from broadcast write
//! failures and forced closes; whichever path gets there first does the work
//! and every later call is a no-op.

use std::sync::Arc;

use crate::connection::Connection;
use crate::hub::engine::Hub;
use crate::hub::topic::TopicKey;

#[must_use = "dropping the handle unsubscribes the connection"]
#[derive(Debug)]
pub struct SubscriptionHandle<K: TopicKey> {
    hub: Hub<K>,
    topic: K,
    connection: Arc<Connection>,
}

impl<K: TopicKey> SubscriptionHandle<K> {
    pub(crate) fn new(hub: Hub<K>, topic: K, connection: Arc<Connection>) -> Self {
        Self {
            hub,
            topic,
            connection,
        }
    }

    pub fn topic(&self) -> &K {
        &self.topic
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Unsubscribe now. Returns `false` when another path already tore the
    /// connection down.
    pub fn release(self) -> bool {
        // Drop still runs afterwards and finds the connection closed.
        self.hub.unsubscribe(&self.topic, &self.connection)
    }
}

impl<K: TopicKey> Drop for SubscriptionHandle<K> {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.topic, &self.connection);
    }
}
