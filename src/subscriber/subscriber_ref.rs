use std::hash::Hash;

use crate::{
    server::RelayServer,
    subscriber::{SubscriberConfig, SubscriberKey},
    types::{HostId, PartitionId},
};

// SubscriberRef

/// Read-only view of one subscriber through the server.
pub struct SubscriberRef<'s, E: Copy + Eq + Hash> {
    server: &'s RelayServer<E>,
    key: SubscriberKey,
}

impl<'s, E: Copy + Eq + Hash> SubscriberRef<'s, E> {
    pub(crate) fn new(server: &'s RelayServer<E>, key: &SubscriberKey) -> Self {
        Self { server, key: *key }
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }

    /// Whether this slot is still a blueprint placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.server
            .registry()
            .slot(&self.key)
            .is_some_and(|slot| !slot.is_real())
    }

    pub fn entity(&self) -> Option<E> {
        self.server
            .registry()
            .record(&self.key)
            .map(|record| record.entity)
    }

    pub fn host(&self) -> Option<HostId> {
        self.server
            .registry()
            .record(&self.key)
            .map(|record| record.host)
    }

    /// Configured partitions, empty if the subscriber is unknown.
    pub fn partitions(&self) -> Vec<PartitionId> {
        self.server
            .registry()
            .config(&self.key)
            .map(|config| config.partitions().collect())
            .unwrap_or_default()
    }

    pub fn has_partition(&self, partition_id: &PartitionId) -> bool {
        self.server
            .registry()
            .config(&self.key)
            .is_some_and(|config| config.contains(partition_id))
    }

    pub fn hold_last_value(&self) -> bool {
        self.server
            .registry()
            .config(&self.key)
            .is_some_and(SubscriberConfig::hold_last_value)
    }
}

// SubscriberMut

/// Read/write view of one subscriber; the surface the configuration editor
/// works through. Only configuration is reachable from here, never the relay
/// entity handles.
pub struct SubscriberMut<'s, E: Copy + Eq + Hash> {
    server: &'s mut RelayServer<E>,
    key: SubscriberKey,
}

impl<'s, E: Copy + Eq + Hash> SubscriberMut<'s, E> {
    pub(crate) fn new(server: &'s mut RelayServer<E>, key: &SubscriberKey) -> Self {
        Self { server, key: *key }
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }

    pub fn partitions(&self) -> Vec<PartitionId> {
        self.server
            .registry()
            .config(&self.key)
            .map(|config| config.partitions().collect())
            .unwrap_or_default()
    }

    pub fn hold_last_value(&self) -> bool {
        self.server
            .registry()
            .config(&self.key)
            .is_some_and(SubscriberConfig::hold_last_value)
    }

    pub fn subscribe(&mut self, partition_id: PartitionId) -> &mut Self {
        self.server.registry_mut().add_partition(&self.key, partition_id);

        self
    }

    pub fn unsubscribe(&mut self, partition_id: &PartitionId) -> &mut Self {
        self.server.registry_mut().remove_partition(&self.key, partition_id);

        self
    }

    pub fn set_partitions(
        &mut self,
        partitions: impl IntoIterator<Item = PartitionId>,
    ) -> &mut Self {
        self.server.registry_mut().set_partitions(&self.key, partitions);

        self
    }

    pub fn set_hold_last_value(&mut self, hold: bool) -> &mut Self {
        self.server.registry_mut().set_hold_last_value(&self.key, hold);

        self
    }

    pub fn set_config(&mut self, config: SubscriberConfig) -> &mut Self {
        if let Some(existing) = self.server.registry_mut().config_mut(&self.key) {
            *existing = config;
        }

        self
    }
}
