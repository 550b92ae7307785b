use std::{collections::BTreeSet, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::{
    big_map::BigMapKey,
    channel::ChannelPair,
    signal::SignalSet,
    types::{HostId, PartitionId},
};

// SubscriberKey
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct SubscriberKey(u64);

impl BigMapKey for SubscriberKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        SubscriberKey(value)
    }
}

/// The player-editable part of a subscriber: which partitions it wants to
/// receive from, and whether it holds the last received value while away
/// from all of them. This is the whole payload of the blueprint blob; entity
/// handles never ride along.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SubscriberConfig {
    partitions: BTreeSet<PartitionId>,
    hold_last_value: bool,
}

impl SubscriberConfig {
    pub fn new(hold_last_value: bool) -> Self {
        Self {
            partitions: BTreeSet::new(),
            hold_last_value,
        }
    }

    pub fn with_partitions(
        partitions: impl IntoIterator<Item = PartitionId>,
        hold_last_value: bool,
    ) -> Self {
        Self {
            partitions: partitions.into_iter().collect(),
            hold_last_value,
        }
    }

    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.iter().copied()
    }

    pub fn contains(&self, partition_id: &PartitionId) -> bool {
        self.partitions.contains(partition_id)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Set semantics; adding an already-present partition is a no-op.
    pub fn add_partition(&mut self, partition_id: PartitionId) {
        self.partitions.insert(partition_id);
    }

    pub fn remove_partition(&mut self, partition_id: &PartitionId) {
        self.partitions.remove(partition_id);
    }

    pub fn set_partitions(&mut self, partitions: impl IntoIterator<Item = PartitionId>) {
        self.partitions = partitions.into_iter().collect();
    }

    pub fn hold_last_value(&self) -> bool {
        self.hold_last_value
    }

    pub fn set_hold_last_value(&mut self, hold: bool) {
        self.hold_last_value = hold;
    }
}

/// One live subscriber: volatile handles plus its configuration and the
/// per-channel cache of the last aggregate it received.
pub struct SubscriberRecord<E: Copy + Eq + Hash> {
    pub entity: E,
    pub host: HostId,
    pub config: SubscriberConfig,
    pub held: ChannelPair<SignalSet>,
    pub relays: ChannelPair<E>,
}

impl<E: Copy + Eq + Hash> SubscriberRecord<E> {
    pub(crate) fn new(entity: E, host: HostId, config: SubscriberConfig, relays: ChannelPair<E>) -> Self {
        Self {
            entity,
            host,
            config,
            held: ChannelPair::default(),
            relays,
        }
    }
}

/// A registry slot: either a not-yet-real placeholder carrying configuration
/// (a blueprint ghost), or a live subscriber. Both expose the same
/// configuration surface so the lifecycle hooks and the editor treat them
/// uniformly.
pub enum SubscriberSlot<E: Copy + Eq + Hash> {
    Placeholder(SubscriberConfig),
    Real(SubscriberRecord<E>),
}

impl<E: Copy + Eq + Hash> SubscriberSlot<E> {
    pub fn config(&self) -> &SubscriberConfig {
        match self {
            SubscriberSlot::Placeholder(config) => config,
            SubscriberSlot::Real(record) => &record.config,
        }
    }

    pub fn config_mut(&mut self) -> &mut SubscriberConfig {
        match self {
            SubscriberSlot::Placeholder(config) => config,
            SubscriberSlot::Real(record) => &mut record.config,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, SubscriberSlot::Real(_))
    }

    pub fn as_real(&self) -> Option<&SubscriberRecord<E>> {
        match self {
            SubscriberSlot::Real(record) => Some(record),
            SubscriberSlot::Placeholder(_) => None,
        }
    }

    pub fn as_real_mut(&mut self) -> Option<&mut SubscriberRecord<E>> {
        match self {
            SubscriberSlot::Real(record) => Some(record),
            SubscriberSlot::Placeholder(_) => None,
        }
    }
}
