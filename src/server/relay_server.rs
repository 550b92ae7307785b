//! The relay engine: tick-driven orchestration of aggregation and delivery.
//!
//! Two independently-periodic passes run off the host's tick clock. The
//! transmit pass aggregates every partition's producer inputs per channel,
//! delivers the aggregates to co-located configured subscribers, then runs
//! the reverse direction (subscriber inputs grouped by resident partition,
//! written to the partitions' relay outputs). Ground→space always completes
//! fully before space→ground begins, so a subscriber's freshly written
//! output can never be read back as its own circuit input within one pass.
//! The resync pass re-derives every known host's residency from
//! authoritative state, correcting any missed relocation event.
//!
//! Everything runs on one logical thread; passes and lifecycle hooks are
//! strictly serialized by the host's callback model, so no interior locking
//! exists anywhere here.

use std::{collections::HashMap, fmt::Write as _, hash::Hash};

use log::warn;

use crate::{
    channel::{ChannelPair, WireChannel},
    error::RelayError,
    host::CircuitAccess,
    location::LocationResolver,
    partition::{PartitionDirectory, PartitionRef},
    server::{RelayConfig, TickTimer},
    signal::{aggregate, SignalSet},
    subscriber::{SubscriberConfig, SubscriberKey, SubscriberMut, SubscriberRef, SubscriberRegistry},
    types::{PartitionId, Tick},
};

/// Counters reported by [`RelayServer::stats`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RelayStats {
    pub partitions: usize,
    pub producers: usize,
    pub subscribers: usize,
    pub hosts: usize,
}

/// The cross-surface signal relay engine.
///
/// Owns the partition directory, the subscriber registry, and the location
/// cache; the host world is passed into every call rather than stored, so
/// the engine holds no entity references of its own beyond opaque handles.
pub struct RelayServer<E: Copy + Eq + Hash> {
    pub(super) config: RelayConfig,
    // Partitions & producers
    pub(super) directory: PartitionDirectory<E>,
    // Subscribers
    pub(super) registry: SubscriberRegistry<E>,
    pub(super) locations: LocationResolver,
    // Ticks
    transmit_timer: TickTimer,
    resync_timer: TickTimer,
    pub(super) current_tick: Tick,
}

impl<E: Copy + Eq + Hash> RelayServer<E> {
    /// Create a new RelayServer
    pub fn new(config: RelayConfig) -> Self {
        let transmit_timer = TickTimer::new(config.transmit_period);
        let resync_timer = TickTimer::new(config.resync_period);

        Self {
            config,
            directory: PartitionDirectory::new(),
            registry: SubscriberRegistry::new(),
            locations: LocationResolver::new(),
            transmit_timer,
            resync_timer,
            current_tick: 0,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Must be called once per host tick; runs whichever periodic passes are
    /// due. Resync runs first so a due transmit pass sees fresh locations.
    pub fn tick<H: CircuitAccess<E>>(&mut self, host: &mut H, now: Tick) {
        self.current_tick = now;

        if self.resync_timer.ring(now) {
            self.resync_pass(host);
        }
        if self.transmit_timer.ring(now) {
            self.transmit_pass(host);
        }
    }

    /// One full transmit pass. Also invoked out-of-cycle right after a build
    /// event so a new entity need not wait a full period.
    pub fn transmit_pass<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        self.aggregate_partitions(host);
        self.deliver_to_subscribers(host);
        self.collect_reverse(host);
    }

    /// Re-derives every known host's residency from authoritative state.
    pub fn resync_pass<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        for host_id in self.registry.hosts() {
            let residency = host.current_residency(host_id);
            self.locations.update(host_id, residency, self.current_tick);
        }
    }

    // Transmit, phase 1: per-partition aggregation (ground side).

    fn aggregate_partitions<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        for partition_id in self.directory.partition_ids() {
            // Lazy cleanup: anything invalid encountered here is struck from
            // the directory; still-valid relay entities of a removed
            // producer are released.
            let removed = self
                .directory
                .prune_invalid(partition_id, |entity| host.entity_is_valid(entity));
            for record in &removed {
                destroy_relay_pair(host, &record.relays);
            }

            let mut inputs: ChannelPair<Vec<SignalSet>> = ChannelPair::default();
            if let Some(partition) = self.directory.partition(&partition_id) {
                for key in partition.producer_keys() {
                    let Some(producer) = self.directory.producer(key) else {
                        continue;
                    };
                    for channel in WireChannel::ALL {
                        if let Some(signals) = host.read_channel(&producer.entity, channel) {
                            inputs.get_mut(channel).push(signals);
                        }
                    }
                }
            }

            let aggregates =
                ChannelPair::build(|channel| aggregate(inputs.get(channel).iter()));
            self.directory
                .get_or_create(partition_id)
                .cache_aggregates(aggregates, self.current_tick);
        }
    }

    // Transmit, phase 2: delivery to subscribers (space side). Every live
    // subscriber is visited exactly once: either it receives the aggregate
    // of the configured partition it currently resides at, or it falls into
    // the hold/clear branch.

    fn deliver_to_subscribers<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        for key in self.registry.real_keys() {
            let Some(record) = self.registry.record(&key) else {
                continue;
            };
            let entity = record.entity;
            let relays = record.relays.clone();
            let hold = record.config.hold_last_value();
            let resident = self
                .locations
                .get(record.host)
                .filter(|partition_id| record.config.contains(partition_id));

            if !host.entity_is_valid(&entity) {
                self.remove_subscriber_entity(host, &entity);
                continue;
            }

            match resident {
                Some(partition_id) => {
                    let aggregates = ChannelPair::build(|channel| {
                        self.directory
                            .partition(&partition_id)
                            .map(|partition| partition.latest_aggregate(channel).clone())
                            .unwrap_or_default()
                    });
                    for (channel, relay) in relays.iter() {
                        host.write_output(relay, aggregates.get(channel));
                    }
                    // "Last value" always means the most recent match.
                    if let Some(record) = self.registry.record_mut(&key) {
                        record.held = aggregates;
                    }
                }
                None => {
                    if hold {
                        let held = self
                            .registry
                            .record(&key)
                            .map(|record| record.held.clone())
                            .unwrap_or_default();
                        for (channel, relay) in relays.iter() {
                            host.write_output(relay, held.get(channel));
                        }
                    } else {
                        let empty = SignalSet::new();
                        for (_, relay) in relays.iter() {
                            host.write_output(relay, &empty);
                        }
                    }
                }
            }
        }
    }

    // Transmit, phase 3: the reverse direction. Subscriber inputs grouped by
    // *resident* partition only; configured partitions play no part here.

    fn collect_reverse<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        let mut grouped: HashMap<PartitionId, ChannelPair<SignalSet>> = HashMap::new();

        for (_, record) in self.registry.iter_real() {
            let Some(partition_id) = self.locations.get(record.host) else {
                continue;
            };
            if !host.entity_is_valid(&record.entity) {
                continue;
            }
            let sums = grouped.entry(partition_id).or_default();
            for channel in WireChannel::ALL {
                if let Some(signals) = host.read_channel(&record.entity, channel) {
                    sums.get_mut(channel).merge(&signals);
                }
            }
        }

        // Full-replace on every partition, so a partition whose last resident
        // subscriber left reads empty instead of a stale aggregate.
        for partition_id in self.directory.partition_ids() {
            let aggregates = grouped.remove(&partition_id).unwrap_or_default();
            let Some(partition) = self.directory.partition(&partition_id) else {
                continue;
            };
            for channel in WireChannel::ALL {
                let outputs: Vec<E> = partition.relay_outputs(channel).iter().copied().collect();
                for relay in outputs {
                    host.write_output(&relay, aggregates.get(channel));
                }
            }
        }
    }

    // Accessors

    pub(crate) fn directory(&self) -> &PartitionDirectory<E> {
        &self.directory
    }

    pub(crate) fn registry(&self) -> &SubscriberRegistry<E> {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut SubscriberRegistry<E> {
        &mut self.registry
    }

    pub(crate) fn locations(&self) -> &LocationResolver {
        &self.locations
    }

    // Partitions

    /// Retrieves a PartitionRef that exposes read-only operations for the
    /// partition. Partitions are created lazily, so this never fails; an
    /// unknown id simply reads as empty.
    pub fn partition(&self, partition_id: PartitionId) -> PartitionRef<E> {
        PartitionRef::new(self, partition_id)
    }

    /// Return a list of all known partition ids
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.directory.partition_ids()
    }

    // Subscribers

    pub fn subscriber_exists(&self, key: &SubscriberKey) -> bool {
        self.registry.slot(key).is_some()
    }

    /// Retrieves a SubscriberRef that exposes read-only operations for the
    /// subscriber associated with the given key.
    pub fn subscriber(&self, key: &SubscriberKey) -> SubscriberRef<E> {
        SubscriberRef::new(self, key)
    }

    /// Retrieves a SubscriberMut that exposes read and write operations for
    /// the subscriber associated with the given key.
    pub fn subscriber_mut(&mut self, key: &SubscriberKey) -> SubscriberMut<E> {
        SubscriberMut::new(self, key)
    }

    pub fn subscriber_key_of(&self, entity: &E) -> Option<SubscriberKey> {
        self.registry.key_of(entity)
    }

    /// Return a list of all live subscribers' keys
    pub fn subscriber_keys(&self) -> Vec<SubscriberKey> {
        self.registry.real_keys()
    }

    /// Configuration snapshot for the editor. A subscriber queried before
    /// registration completes reads as an empty configuration.
    pub fn subscriber_config(&self, key: &SubscriberKey) -> SubscriberConfig {
        self.registry
            .config(key)
            .cloned()
            .unwrap_or_else(|| SubscriberConfig::new(false))
    }

    pub fn set_subscriber_config(
        &mut self,
        key: &SubscriberKey,
        config: SubscriberConfig,
    ) -> Result<(), RelayError> {
        let Some(existing) = self.registry.config_mut(key) else {
            warn!("set_subscriber_config: unknown subscriber key");
            return Err(RelayError::UnknownSubscriber);
        };
        *existing = config;
        Ok(())
    }

    /// Encodes a subscriber's configuration for blueprint/copy-paste glue.
    pub fn serialize_config(&self, key: &SubscriberKey) -> Result<String, RelayError> {
        let Some(config) = self.registry.config(key) else {
            return Err(RelayError::UnknownSubscriber);
        };
        serde_json::to_string(config).map_err(|error| RelayError::ConfigCodec(error.to_string()))
    }

    // Diagnostics

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            partitions: self.directory.partition_count(),
            producers: self.directory.producer_count(),
            subscribers: self.registry.real_count(),
            hosts: self.registry.host_count(),
        }
    }

    /// Human-readable report of the whole relay state, for on-demand
    /// diagnostics. Nothing here is pushed proactively.
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        let stats = self.stats();

        let _ = writeln!(
            out,
            "relay @ tick {}: {} partitions, {} producers, {} subscribers on {} hosts",
            self.current_tick, stats.partitions, stats.producers, stats.subscribers, stats.hosts
        );

        let mut partition_ids = self.directory.partition_ids();
        partition_ids.sort();
        for partition_id in partition_ids {
            let Some(partition) = self.directory.partition(&partition_id) else {
                continue;
            };
            let _ = writeln!(
                out,
                "  {}: {} producers, aggregates red={} green={} signals, updated {}",
                partition_id,
                partition.producer_count(),
                partition.latest_aggregate(WireChannel::Red).len(),
                partition.latest_aggregate(WireChannel::Green).len(),
                match partition.last_update() {
                    Some(tick) => format!("@ tick {tick}"),
                    None => "never".to_string(),
                },
            );
        }

        for (key, record) in self.registry.iter_real() {
            let resident = self.locations.get(record.host);
            let _ = writeln!(
                out,
                "  subscriber {:?} on {}: {} configured partitions, hold={}, resident={}",
                key,
                record.host,
                record.config.partition_count(),
                record.config.hold_last_value(),
                match resident {
                    Some(partition_id) => partition_id.to_string(),
                    None => "in transit".to_string(),
                },
            );
        }

        out
    }
}

/// Destroys both relay entities of a pair, tolerating handles that already
/// went invalid through a concurrent destruction path.
pub(crate) fn destroy_relay_pair<E: Copy + Eq + Hash, H: CircuitAccess<E>>(
    host: &mut H,
    relays: &ChannelPair<E>,
) {
    for (_, relay) in relays.iter() {
        if host.entity_is_valid(relay) {
            host.destroy_entity(relay);
        }
    }
}
