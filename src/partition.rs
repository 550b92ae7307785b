//! Partition records and the directory that tracks producer membership.
//!
//! A partition is one broadcast domain (a surface). It is created lazily on
//! first registration and never destroyed; an emptied partition aggregates to
//! an empty signal set, which is indistinguishable from "no data" and is the
//! correct result. The directory's mutations are confined to its own maps; no
//! entity is created or destroyed here.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use crate::{
    big_map::{BigMap, BigMapKey},
    channel::{ChannelPair, WireChannel},
    server::RelayServer,
    signal::SignalSet,
    types::{PartitionId, Tick},
};

// ProducerKey
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct ProducerKey(u64);

impl BigMapKey for ProducerKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        ProducerKey(value)
    }
}

/// One registered producer: its entity handle, the partition it belongs to,
/// and its pair of private relay-output entities.
#[derive(Clone, Debug)]
pub struct ProducerRecord<E: Copy + Eq + Hash> {
    pub entity: E,
    pub partition: PartitionId,
    pub relays: ChannelPair<E>,
}

/// One broadcast domain: producer membership, per-channel relay-output sets,
/// and the per-channel aggregate cache the relay engine refreshes each
/// transmit pass.
pub struct Partition<E: Copy + Eq + Hash> {
    producers: HashSet<ProducerKey>,
    relay_outputs: ChannelPair<HashSet<E>>,
    aggregates: ChannelPair<SignalSet>,
    last_update: Option<Tick>,
}

impl<E: Copy + Eq + Hash> Partition<E> {
    fn new() -> Self {
        Self {
            producers: HashSet::new(),
            relay_outputs: ChannelPair::default(),
            aggregates: ChannelPair::default(),
            last_update: None,
        }
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn producer_keys(&self) -> impl Iterator<Item = &ProducerKey> {
        self.producers.iter()
    }

    pub fn relay_outputs(&self, channel: WireChannel) -> &HashSet<E> {
        self.relay_outputs.get(channel)
    }

    /// Aggregate cached by the most recent transmit pass.
    pub fn latest_aggregate(&self, channel: WireChannel) -> &SignalSet {
        self.aggregates.get(channel)
    }

    pub fn last_update(&self) -> Option<Tick> {
        self.last_update
    }

    pub(crate) fn cache_aggregates(&mut self, aggregates: ChannelPair<SignalSet>, now: Tick) {
        self.aggregates = aggregates;
        self.last_update = Some(now);
    }
}

/// Maps partition ids to partition records and owns every producer
/// registration.
pub struct PartitionDirectory<E: Copy + Eq + Hash> {
    partitions: HashMap<PartitionId, Partition<E>>,
    producers: BigMap<ProducerKey, ProducerRecord<E>>,
    producer_index: HashMap<E, ProducerKey>,
}

impl<E: Copy + Eq + Hash> PartitionDirectory<E> {
    pub fn new() -> Self {
        Self {
            partitions: HashMap::new(),
            producers: BigMap::new(),
            producer_index: HashMap::new(),
        }
    }

    /// Returns the existing record or creates an empty one. Never fails.
    pub fn get_or_create(&mut self, partition_id: PartitionId) -> &mut Partition<E> {
        self.partitions.entry(partition_id).or_insert_with(Partition::new)
    }

    pub fn partition(&self, partition_id: &PartitionId) -> Option<&Partition<E>> {
        self.partitions.get(partition_id)
    }

    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.keys().copied().collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Registers a producer and its relay pair under a partition. Re-adding
    /// an already-registered entity returns the existing key.
    pub fn add_producer(
        &mut self,
        partition_id: PartitionId,
        entity: E,
        relays: ChannelPair<E>,
    ) -> ProducerKey {
        if let Some(existing) = self.producer_index.get(&entity) {
            return *existing;
        }

        let key = self.producers.insert(ProducerRecord {
            entity,
            partition: partition_id,
            relays: relays.clone(),
        });
        self.producer_index.insert(entity, key);

        let partition = self.get_or_create(partition_id);
        partition.producers.insert(key);
        for channel in WireChannel::ALL {
            partition.relay_outputs.get_mut(channel).insert(*relays.get(channel));
        }

        key
    }

    /// Strikes a producer from its partition. No-op if absent; the removed
    /// record is handed back so the caller can release its relay entities.
    pub fn remove_producer(&mut self, key: &ProducerKey) -> Option<ProducerRecord<E>> {
        let record = self.producers.remove(key)?;
        self.producer_index.remove(&record.entity);

        if let Some(partition) = self.partitions.get_mut(&record.partition) {
            partition.producers.remove(key);
            for channel in WireChannel::ALL {
                partition
                    .relay_outputs
                    .get_mut(channel)
                    .remove(record.relays.get(channel));
            }
        }

        Some(record)
    }

    pub fn producer_key_of(&self, entity: &E) -> Option<ProducerKey> {
        self.producer_index.get(entity).copied()
    }

    pub fn producer(&self, key: &ProducerKey) -> Option<&ProducerRecord<E>> {
        self.producers.get(key)
    }

    pub fn producer_keys(&self) -> Vec<ProducerKey> {
        self.producers.keys()
    }

    /// Adds a relay-output handle to a partition's channel set. Idempotent.
    pub fn add_relay_output(&mut self, partition_id: PartitionId, channel: WireChannel, handle: E) {
        self.get_or_create(partition_id)
            .relay_outputs
            .get_mut(channel)
            .insert(handle);
    }

    /// Removes a relay-output handle from a partition's channel set. No-op if
    /// absent.
    pub fn remove_relay_output(
        &mut self,
        partition_id: PartitionId,
        channel: WireChannel,
        handle: &E,
    ) {
        if let Some(partition) = self.partitions.get_mut(&partition_id) {
            partition.relay_outputs.get_mut(channel).remove(handle);
        }
    }

    /// Drops every producer and relay-output entry of a partition whose
    /// handle no longer passes the validity oracle. Removed producer records
    /// are returned so the caller can release any still-valid relay entities;
    /// the directory itself never touches entities.
    pub fn prune_invalid(
        &mut self,
        partition_id: PartitionId,
        valid: impl Fn(&E) -> bool,
    ) -> Vec<ProducerRecord<E>> {
        let Some(partition) = self.partitions.get_mut(&partition_id) else {
            return Vec::new();
        };

        for channel in WireChannel::ALL {
            partition.relay_outputs.get_mut(channel).retain(&valid);
        }

        let stale: Vec<ProducerKey> = partition
            .producers
            .iter()
            .filter(|key| match self.producers.get(*key) {
                Some(record) => !valid(&record.entity),
                None => true,
            })
            .copied()
            .collect();

        let mut removed = Vec::new();
        for key in stale {
            if let Some(record) = self.remove_producer(&key) {
                removed.push(record);
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartitionId, &Partition<E>)> {
        self.partitions.iter().map(|(id, partition)| (*id, partition))
    }
}

impl<E: Copy + Eq + Hash> Default for PartitionDirectory<E> {
    fn default() -> Self {
        Self::new()
    }
}

// PartitionRef

/// Read-only view of one partition through the server, in the style of a
/// room handle.
pub struct PartitionRef<'s, E: Copy + Eq + Hash> {
    server: &'s RelayServer<E>,
    id: PartitionId,
}

impl<'s, E: Copy + Eq + Hash> PartitionRef<'s, E> {
    pub(crate) fn new(server: &'s RelayServer<E>, id: PartitionId) -> Self {
        Self { server, id }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn producer_count(&self) -> usize {
        self.server
            .directory()
            .partition(&self.id)
            .map(Partition::producer_count)
            .unwrap_or(0)
    }

    /// Aggregate cached by the most recent transmit pass, if the partition
    /// has ever been aggregated.
    pub fn latest_aggregate(&self, channel: WireChannel) -> Option<&'s SignalSet> {
        self.server
            .directory()
            .partition(&self.id)
            .map(|partition| partition.latest_aggregate(channel))
    }

    pub fn last_update(&self) -> Option<Tick> {
        self.server
            .directory()
            .partition(&self.id)
            .and_then(Partition::last_update)
    }
}
