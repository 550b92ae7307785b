//! In-memory stand-in for the host platform: an entity table with validity
//! flags, per-entity channel inputs and relay outputs, scriptable residency,
//! and fail-next-N switches for relay creation and wiring.

use std::collections::{HashMap, HashSet};

use crate::{
    channel::{ChannelPair, WireChannel},
    host::{CircuitAccess, RelaySite},
    signal::{SignalId, SignalSet},
    types::{HostId, PartitionId},
};

pub(crate) type MockEntity = u32;

struct EntityState {
    valid: bool,
    is_relay: bool,
    inputs: ChannelPair<SignalSet>,
    output: SignalSet,
    connections: Vec<(MockEntity, WireChannel)>,
}

impl EntityState {
    fn new(is_relay: bool) -> Self {
        Self {
            valid: true,
            is_relay,
            inputs: ChannelPair::default(),
            output: SignalSet::new(),
            connections: Vec::new(),
        }
    }
}

pub(crate) struct MockHost {
    next_entity: MockEntity,
    entities: HashMap<MockEntity, EntityState>,
    residency: HashMap<HostId, Option<PartitionId>>,
    partitions: Vec<PartitionId>,
    relay_creation_calls: usize,
    relay_failures: HashSet<usize>,
    connect_calls: usize,
    connect_failures: HashSet<usize>,
}

impl MockHost {
    pub(crate) fn new(partitions: &[PartitionId]) -> Self {
        Self {
            next_entity: 1,
            entities: HashMap::new(),
            residency: HashMap::new(),
            partitions: partitions.to_vec(),
            relay_creation_calls: 0,
            relay_failures: HashSet::new(),
            connect_calls: 0,
            connect_failures: HashSet::new(),
        }
    }

    /// Spawns a visible (non-relay) entity.
    pub(crate) fn spawn(&mut self) -> MockEntity {
        let entity = self.next_entity;
        self.next_entity += 1;
        self.entities.insert(entity, EntityState::new(false));
        entity
    }

    pub(crate) fn set_input(&mut self, entity: MockEntity, channel: WireChannel, signals: SignalSet) {
        let state = self.entities.get_mut(&entity).expect("unknown mock entity");
        *state.inputs.get_mut(channel) = signals;
    }

    pub(crate) fn output(&self, entity: MockEntity) -> SignalSet {
        self.entities
            .get(&entity)
            .map(|state| state.output.clone())
            .unwrap_or_default()
    }

    pub(crate) fn invalidate(&mut self, entity: MockEntity) {
        if let Some(state) = self.entities.get_mut(&entity) {
            state.valid = false;
        }
    }

    pub(crate) fn set_residency(&mut self, host_id: HostId, partition: Option<PartitionId>) {
        self.residency.insert(host_id, partition);
    }

    /// Fails the relay creation `offset` calls from now (0 = the next one).
    pub(crate) fn schedule_relay_failure(&mut self, offset: usize) {
        self.relay_failures.insert(self.relay_creation_calls + offset);
    }

    /// Fails the wire connection `offset` calls from now (0 = the next one).
    pub(crate) fn schedule_connect_failure(&mut self, offset: usize) {
        self.connect_failures.insert(self.connect_calls + offset);
    }

    /// Wire connections originating at an entity.
    pub(crate) fn connections_of(&self, entity: MockEntity) -> Vec<(MockEntity, WireChannel)> {
        self.entities
            .get(&entity)
            .map(|state| state.connections.clone())
            .unwrap_or_default()
    }

    /// Count of relay entities still alive; zero after a clean rollback or
    /// teardown.
    pub(crate) fn live_relay_count(&self) -> usize {
        self.entities
            .values()
            .filter(|state| state.is_relay && state.valid)
            .count()
    }
}

impl CircuitAccess<MockEntity> for MockHost {
    fn entity_is_valid(&self, entity: &MockEntity) -> bool {
        self.entities.get(entity).is_some_and(|state| state.valid)
    }

    fn read_channel(&self, entity: &MockEntity, channel: WireChannel) -> Option<SignalSet> {
        let state = self.entities.get(entity)?;
        if !state.valid {
            return None;
        }
        Some(state.inputs.get(channel).clone())
    }

    fn write_output(&mut self, entity: &MockEntity, signals: &SignalSet) {
        if let Some(state) = self.entities.get_mut(entity) {
            if state.valid {
                state.output = signals.clone();
            }
        }
    }

    fn create_relay_entity(&mut self, _site: RelaySite) -> Option<MockEntity> {
        let call = self.relay_creation_calls;
        self.relay_creation_calls += 1;
        if self.relay_failures.remove(&call) {
            return None;
        }
        let entity = self.next_entity;
        self.next_entity += 1;
        self.entities.insert(entity, EntityState::new(true));
        Some(entity)
    }

    fn connect_channel(
        &mut self,
        source: &MockEntity,
        dest: &MockEntity,
        channel: WireChannel,
    ) -> bool {
        let call = self.connect_calls;
        self.connect_calls += 1;
        if self.connect_failures.remove(&call) {
            return false;
        }
        if !self.entity_is_valid(source) || !self.entity_is_valid(dest) {
            return false;
        }
        let dest = *dest;
        if let Some(state) = self.entities.get_mut(source) {
            state.connections.push((dest, channel));
        }
        true
    }

    fn destroy_entity(&mut self, entity: &MockEntity) {
        if let Some(state) = self.entities.get_mut(entity) {
            state.valid = false;
        }
    }

    fn current_residency(&self, host_id: HostId) -> Option<PartitionId> {
        self.residency.get(&host_id).copied().flatten()
    }

    fn known_partitions(&self) -> Vec<PartitionId> {
        self.partitions.clone()
    }
}

/// Single-signal set shorthand.
pub(crate) fn items(entries: &[(&str, i64)]) -> SignalSet {
    entries
        .iter()
        .map(|(name, count)| (SignalId::item(name), *count))
        .collect()
}
