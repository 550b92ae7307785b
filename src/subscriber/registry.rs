//! Subscriber registry: maps consumer identities to their configuration and
//! volatile handles.
//!
//! The one rule that matters here: re-registration is non-destructive. A
//! subscriber can be registered again for the same entity across save/load
//! edge cases or relocation-triggered re-linking, and that MUST NOT lose the
//! player's configuration; only the volatile entity/host handles refresh.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use crate::{
    big_map::BigMap,
    channel::ChannelPair,
    subscriber::{SubscriberConfig, SubscriberKey, SubscriberRecord, SubscriberSlot},
    types::{HostId, PartitionId},
};

pub struct SubscriberRegistry<E: Copy + Eq + Hash> {
    slots: BigMap<SubscriberKey, SubscriberSlot<E>>,
    entity_index: HashMap<E, SubscriberKey>,
}

impl<E: Copy + Eq + Hash> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self {
            slots: BigMap::new(),
            entity_index: HashMap::new(),
        }
    }

    pub fn key_of(&self, entity: &E) -> Option<SubscriberKey> {
        self.entity_index.get(entity).copied()
    }

    pub fn slot(&self, key: &SubscriberKey) -> Option<&SubscriberSlot<E>> {
        self.slots.get(key)
    }

    pub fn record(&self, key: &SubscriberKey) -> Option<&SubscriberRecord<E>> {
        self.slots.get(key).and_then(SubscriberSlot::as_real)
    }

    pub fn record_mut(&mut self, key: &SubscriberKey) -> Option<&mut SubscriberRecord<E>> {
        self.slots.get_mut(key).and_then(SubscriberSlot::as_real_mut)
    }

    /// Registers a live subscriber. A placeholder stashed for the same entity
    /// is promoted in place, keeping its stored configuration and its key;
    /// `default_config` only applies to entities never seen before. An entity
    /// that already has a live record falls back to a non-destructive
    /// [`SubscriberRegistry::refresh`], keeping its existing relay pair.
    pub fn register(
        &mut self,
        entity: E,
        host: HostId,
        relays: ChannelPair<E>,
        default_config: SubscriberConfig,
    ) -> SubscriberKey {
        if let Some(key) = self.key_of(&entity) {
            if let Some(slot) = self.slots.get_mut(&key) {
                if let SubscriberSlot::Placeholder(config) = slot {
                    let config = config.clone();
                    *slot = SubscriberSlot::Real(SubscriberRecord::new(entity, host, config, relays));
                    return key;
                }
                // Live record: preserve everything, refresh volatile handles.
                self.refresh(&key, entity, host);
                return key;
            }
        }

        let key = self
            .slots
            .insert(SubscriberSlot::Real(SubscriberRecord::new(
                entity,
                host,
                default_config,
                relays,
            )));
        self.entity_index.insert(entity, key);
        key
    }

    /// Non-destructive re-registration: refreshes the volatile entity/host
    /// handles, preserving configuration, held cache, and relay pair.
    pub fn refresh(&mut self, key: &SubscriberKey, entity: E, host: HostId) {
        let Some(record) = self.record_mut(key) else {
            return;
        };
        let old_entity = record.entity;
        record.entity = entity;
        record.host = host;

        if old_entity != entity {
            self.entity_index.remove(&old_entity);
            self.entity_index.insert(entity, *key);
        }
    }

    /// Removes a live record entirely. Called only on true destruction, not
    /// relocation. Returns the record so the caller can release its relay
    /// entities. No-op on placeholders and unknown entities.
    pub fn unregister(&mut self, entity: &E) -> Option<(SubscriberKey, SubscriberRecord<E>)> {
        let key = self.key_of(entity)?;
        if !self.slots.get(&key)?.is_real() {
            return None;
        }
        let slot = self.slots.remove(&key)?;
        self.entity_index.remove(entity);
        match slot {
            SubscriberSlot::Real(record) => Some((key, record)),
            SubscriberSlot::Placeholder(_) => None,
        }
    }

    /// Stores configuration for an entity that may not be real yet. A live
    /// record takes the configuration directly; anything else becomes (or
    /// overwrites) a placeholder.
    pub fn stash(&mut self, entity: E, config: SubscriberConfig) -> SubscriberKey {
        if let Some(key) = self.key_of(&entity) {
            if let Some(slot) = self.slots.get_mut(&key) {
                *slot.config_mut() = config;
                return key;
            }
        }
        let key = self.slots.insert(SubscriberSlot::Placeholder(config));
        self.entity_index.insert(entity, key);
        key
    }

    /// Drops a placeholder without touching live records (a ghost was mined
    /// before it became real).
    pub fn remove_placeholder(&mut self, entity: &E) {
        let Some(key) = self.key_of(entity) else {
            return;
        };
        if self.slots.get(&key).is_some_and(|slot| !slot.is_real()) {
            self.slots.remove(&key);
            self.entity_index.remove(entity);
        }
    }

    // Configuration, uniform over placeholders and live records.

    /// Configuration for a subscriber; queries racing ahead of registration
    /// read as empty, not as an error.
    pub fn config(&self, key: &SubscriberKey) -> Option<&SubscriberConfig> {
        self.slots.get(key).map(SubscriberSlot::config)
    }

    pub fn config_mut(&mut self, key: &SubscriberKey) -> Option<&mut SubscriberConfig> {
        self.slots.get_mut(key).map(SubscriberSlot::config_mut)
    }

    pub fn set_partitions(
        &mut self,
        key: &SubscriberKey,
        partitions: impl IntoIterator<Item = PartitionId>,
    ) {
        if let Some(config) = self.config_mut(key) {
            config.set_partitions(partitions);
        }
    }

    pub fn add_partition(&mut self, key: &SubscriberKey, partition_id: PartitionId) {
        if let Some(config) = self.config_mut(key) {
            config.add_partition(partition_id);
        }
    }

    pub fn remove_partition(&mut self, key: &SubscriberKey, partition_id: &PartitionId) {
        if let Some(config) = self.config_mut(key) {
            config.remove_partition(partition_id);
        }
    }

    pub fn set_hold_last_value(&mut self, key: &SubscriberKey, hold: bool) {
        if let Some(config) = self.config_mut(key) {
            config.set_hold_last_value(hold);
        }
    }

    // Iteration & stats

    pub fn real_keys(&self) -> Vec<SubscriberKey> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_real())
            .map(|(key, _)| key)
            .collect()
    }

    pub fn iter_real(&self) -> impl Iterator<Item = (SubscriberKey, &SubscriberRecord<E>)> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| slot.as_real().map(|record| (key, record)))
    }

    pub fn real_count(&self) -> usize {
        self.iter_real().count()
    }

    pub fn hosts(&self) -> HashSet<HostId> {
        self.iter_real().map(|(_, record)| record.host).collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts().len()
    }

    pub fn has_host_subscribers(&self, host_id: HostId) -> bool {
        self.iter_real().any(|(_, record)| record.host == host_id)
    }
}

impl<E: Copy + Eq + Hash> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relays(red: u32, green: u32) -> ChannelPair<u32> {
        ChannelPair::new(red, green)
    }

    #[test]
    fn register_applies_default_config_to_new_entities() {
        let mut registry: SubscriberRegistry<u32> = SubscriberRegistry::new();

        let default_config =
            SubscriberConfig::with_partitions([PartitionId(1), PartitionId(2)], true);
        let key = registry.register(10, HostId(1), relays(11, 12), default_config);

        let config = registry.config(&key).unwrap();
        assert!(config.contains(&PartitionId(1)));
        assert!(config.contains(&PartitionId(2)));
        assert!(config.hold_last_value());
    }

    #[test]
    fn re_registration_preserves_custom_configuration() {
        let mut registry: SubscriberRegistry<u32> = SubscriberRegistry::new();

        let key = registry.register(
            10,
            HostId(1),
            relays(11, 12),
            SubscriberConfig::new(false),
        );

        // player customizes
        registry.set_partitions(&key, [PartitionId(9)]);
        registry.set_hold_last_value(&key, true);

        // incidental re-registration with different defaults
        let again = registry.register(
            10,
            HostId(2),
            relays(13, 14),
            SubscriberConfig::with_partitions([PartitionId(1)], false),
        );

        assert_eq!(key, again);
        let config = registry.config(&key).unwrap();
        assert!(config.contains(&PartitionId(9)));
        assert!(!config.contains(&PartitionId(1)));
        assert!(config.hold_last_value());

        // volatile host handle did refresh
        assert_eq!(registry.record(&key).unwrap().host, HostId(2));
        // the original relay pair survives
        assert_eq!(registry.record(&key).unwrap().relays, relays(11, 12));
    }

    #[test]
    fn placeholder_promotes_with_stored_config() {
        let mut registry: SubscriberRegistry<u32> = SubscriberRegistry::new();

        let stashed = registry.stash(10, SubscriberConfig::with_partitions([PartitionId(5)], true));
        let key = registry.register(10, HostId(1), relays(11, 12), SubscriberConfig::new(false));

        assert_eq!(stashed, key);
        let record = registry.record(&key).unwrap();
        assert!(record.config.contains(&PartitionId(5)));
        assert!(record.config.hold_last_value());
    }

    #[test]
    fn unregister_removes_record_and_returns_it() {
        let mut registry: SubscriberRegistry<u32> = SubscriberRegistry::new();

        let key = registry.register(10, HostId(1), relays(11, 12), SubscriberConfig::new(false));
        let (removed_key, record) = registry.unregister(&10).unwrap();

        assert_eq!(key, removed_key);
        assert_eq!(record.entity, 10);
        assert!(registry.unregister(&10).is_none());
        assert!(registry.config(&key).is_none());
        assert_eq!(registry.real_count(), 0);
    }

    #[test]
    fn remove_placeholder_spares_live_records() {
        let mut registry: SubscriberRegistry<u32> = SubscriberRegistry::new();

        let key = registry.register(10, HostId(1), relays(11, 12), SubscriberConfig::new(false));
        registry.remove_placeholder(&10);
        assert!(registry.record(&key).is_some());

        registry.stash(20, SubscriberConfig::new(false));
        registry.remove_placeholder(&20);
        assert!(registry.key_of(&20).is_none());
    }
}
