//! Connection registry
//!
//! Bookkeeping of which connections are subscribed to which topic. A topic
//! entry is created by the first `add` and removed together with its last
//! connection, so the map never holds an empty set.
//!
//! Concurrency note: the registry itself is not synchronized. `Hub` keeps it
//! behind a single reader/writer lock and is the only caller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId};
use crate::hub::topic::TopicKey;

#[derive(Debug)]
pub struct Registry<K: TopicKey> {
    topics: HashMap<K, HashMap<ConnectionId, Arc<Connection>>>,
}

impl<K: TopicKey> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TopicKey> Registry<K> {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    /// Add a connection under a topic. Adding the same connection twice is a
    /// no-op; returns whether it was newly inserted.
    pub fn add(&mut self, topic: K, connection: Arc<Connection>) -> bool {
        self.topics
            .entry(topic)
            .or_default()
            .insert(connection.id, connection)
            .is_none()
    }

    /// Remove a connection from a topic, dropping the topic once empty.
    /// Unknown topics or connections are ignored; returns whether anything
    /// was removed.
    pub fn remove(&mut self, topic: &K, id: &ConnectionId) -> bool {
        let Some(connections) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = connections.remove(id).is_some();
        if connections.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Owned copy of a topic's connections; later adds and removes do not
    /// show up in it.
    pub fn snapshot(&self, topic: &K) -> Vec<Arc<Connection>> {
        self.topics
            .get(topic)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every (topic, connection) pair currently registered.
    pub fn entries(&self) -> Vec<(K, Arc<Connection>)> {
        self.topics
            .iter()
            .flat_map(|(topic, connections)| {
                connections
                    .values()
                    .map(move |connection| (topic.clone(), connection.clone()))
            })
            .collect()
    }

    pub fn contains(&self, topic: &K, id: &ConnectionId) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|connections| connections.contains_key(id))
    }

    pub fn subscriber_count(&self, topic: &K) -> usize {
        self.topics.get(topic).map_or(0, HashMap::len)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn connection_count(&self) -> usize {
        self.topics.values().map(HashMap::len).sum()
    }

    #[cfg(test)]
    pub(crate) fn topics(&self) -> impl Iterator<Item = &K> {
        self.topics.keys()
    }

    /// True when some topic maps to an empty set; never expected to hold.
    #[cfg(test)]
    pub(crate) fn has_empty_topic(&self) -> bool {
        self.topics.values().any(HashMap::is_empty)
    }
}
