//! Lifecycle hooks: the creation/destruction paths that keep the directory
//! and registry consistent with the external entities they describe.
//!
//! Registration is all-or-nothing. Relay-entity creation and wire connection
//! are checked at every step; on partial failure everything already created
//! is destroyed and the attempt aborts, so a half-registered producer or
//! subscriber can never exist. Destruction is defensive: any handle may have
//! already gone invalid through a concurrent destruction path (e.g. a whole
//! surface being removed), and every step tolerates that.

use std::hash::Hash;

use log::{info, warn};

use crate::{
    channel::{ChannelPair, WireChannel},
    error::RelayError,
    host::{CircuitAccess, RelaySite},
    partition::ProducerKey,
    server::{relay_server::destroy_relay_pair, RelayServer},
    subscriber::{SubscriberConfig, SubscriberKey},
    types::{EntityKind, HostId, PartitionId},
};

impl<E: Copy + Eq + Hash> RelayServer<E> {
    // Producers

    /// Build hook for a producer entity on a partition. Creates its private
    /// relay pair, registers it, and runs one immediate transmit pass so it
    /// starts producing without waiting for the next period. Idempotent for
    /// an already-registered entity.
    pub fn producer_built<H: CircuitAccess<E>>(
        &mut self,
        host: &mut H,
        entity: E,
        partition_id: PartitionId,
    ) -> Result<ProducerKey, RelayError> {
        if let Some(existing) = self.directory.producer_key_of(&entity) {
            return Ok(existing);
        }

        if !host.entity_is_valid(&entity) {
            warn!("producer build event for an already-invalid entity, ignoring");
            return Err(RelayError::PartialRegistration {
                kind: EntityKind::Producer,
                detail: "primary entity is invalid",
            });
        }

        let relays = create_relay_pair(
            host,
            RelaySite::Partition(partition_id),
            &entity,
            EntityKind::Producer,
        )?;
        let key = self.directory.add_producer(partition_id, entity, relays);

        info!("registered producer on {}", partition_id);

        self.transmit_pass(host);

        Ok(key)
    }

    /// Destroy hook for a producer, whatever the cause: mining, force-kill,
    /// script removal. No-op for unknown entities.
    pub fn producer_destroyed<H: CircuitAccess<E>>(&mut self, host: &mut H, entity: &E) {
        let Some(key) = self.directory.producer_key_of(entity) else {
            return;
        };
        let Some(record) = self.directory.remove_producer(&key) else {
            return;
        };
        destroy_relay_pair(host, &record.relays);
    }

    // Subscribers

    /// Build hook for a subscriber entity riding a mobile host.
    ///
    /// Three cases resolve here, in order: an entity with a live record
    /// (re-linking across save/load edge cases) only refreshes its volatile
    /// handles, preserving configuration; an entity with a stashed
    /// placeholder (a revived blueprint ghost) is promoted with the stored
    /// configuration; anything else registers fresh with the default
    /// configuration from [`crate::RelayConfig`].
    pub fn subscriber_built<H: CircuitAccess<E>>(
        &mut self,
        host: &mut H,
        entity: E,
        host_id: HostId,
    ) -> Result<SubscriberKey, RelayError> {
        if let Some(key) = self.registry.key_of(&entity) {
            if self.registry.record(&key).is_some() {
                self.registry.refresh(&key, entity, host_id);
                let residency = host.current_residency(host_id);
                self.locations.update(host_id, residency, self.current_tick);
                return Ok(key);
            }
        }

        if !host.entity_is_valid(&entity) {
            warn!("subscriber build event for an already-invalid entity, ignoring");
            return Err(RelayError::PartialRegistration {
                kind: EntityKind::Subscriber,
                detail: "primary entity is invalid",
            });
        }

        let relays = create_relay_pair(
            host,
            RelaySite::Host(host_id),
            &entity,
            EntityKind::Subscriber,
        )?;

        let default_partitions = if self.config.subscribe_known_partitions_on_build {
            host.known_partitions()
        } else {
            Vec::new()
        };
        let default_config = SubscriberConfig::with_partitions(
            default_partitions,
            self.config.default_hold_last_value,
        );

        let key = self.registry.register(entity, host_id, relays, default_config);

        // Eager location fill, then one out-of-cycle pass so the subscriber
        // sees data this tick.
        let residency = host.current_residency(host_id);
        self.locations.update(host_id, residency, self.current_tick);

        info!("registered subscriber on {}", host_id);

        self.transmit_pass(host);

        Ok(key)
    }

    /// Destroy hook for a subscriber. Releases its private relay pair and
    /// removes the record entirely; also drops a stashed placeholder if the
    /// entity never became real. No-op for unknown entities.
    pub fn subscriber_destroyed<H: CircuitAccess<E>>(&mut self, host: &mut H, entity: &E) {
        self.remove_subscriber_entity(host, entity);
    }

    pub(crate) fn remove_subscriber_entity<H: CircuitAccess<E>>(
        &mut self,
        host: &mut H,
        entity: &E,
    ) {
        self.registry.remove_placeholder(entity);

        let Some((_, record)) = self.registry.unregister(entity) else {
            return;
        };
        destroy_relay_pair(host, &record.relays);

        if !self.registry.has_host_subscribers(record.host) {
            self.locations.forget(record.host);
        }
    }

    // Hosts

    /// Relocation-completed event: overwrite the cached location eagerly.
    /// The next transmit pass is authoritative; nothing else reacts here.
    pub fn host_relocated(&mut self, host_id: HostId, partition_id: Option<PartitionId>) {
        self.locations.update(host_id, partition_id, self.current_tick);
    }

    // Settings copy / blueprints

    /// Settings-copy hook: copies the source's configuration onto the
    /// destination. Only configuration moves, never entity handles; a
    /// destination that has not gone through its build registration yet
    /// holds the configuration as a placeholder until it does.
    pub fn subscriber_cloned(&mut self, source: &E, dest: E) {
        let Some(source_key) = self.registry.key_of(source) else {
            warn!("settings copy from an unknown subscriber, ignoring");
            return;
        };
        let Some(config) = self.registry.config(&source_key).cloned() else {
            return;
        };
        self.registry.stash(dest, config);
    }

    /// Decodes a configuration blob onto an entity that may still be a
    /// blueprint ghost. The configuration rides the placeholder until the
    /// entity becomes real.
    pub fn restore_config(&mut self, entity: E, blob: &str) -> Result<SubscriberKey, RelayError> {
        let config: SubscriberConfig = serde_json::from_str(blob)
            .map_err(|error| RelayError::ConfigCodec(error.to_string()))?;
        Ok(self.registry.stash(entity, config))
    }

    // Maintenance

    /// Sweeps every registered producer and subscriber, removing any whose
    /// underlying entity handle went stale. A bulk GC pass distinct from the
    /// per-access pruning of the transmit path, intended for after bulk
    /// external events such as a version migration.
    pub fn validate_all<H: CircuitAccess<E>>(&mut self, host: &mut H) {
        let mut removed_producers = 0;
        for partition_id in self.directory.partition_ids() {
            let removed = self
                .directory
                .prune_invalid(partition_id, |entity| host.entity_is_valid(entity));
            for record in &removed {
                destroy_relay_pair(host, &record.relays);
            }
            removed_producers += removed.len();
        }

        let mut removed_subscribers = 0;
        for key in self.registry.real_keys() {
            let Some(record) = self.registry.record(&key) else {
                continue;
            };
            let entity = record.entity;
            if !host.entity_is_valid(&entity) {
                self.remove_subscriber_entity(host, &entity);
                removed_subscribers += 1;
            }
        }

        if removed_producers > 0 || removed_subscribers > 0 {
            info!(
                "validate_all removed {} stale producers and {} stale subscribers",
                removed_producers, removed_subscribers
            );
        }
    }
}

/// Creates and wires one relay entity per channel for a primary entity.
/// All-or-nothing: any failure destroys whatever was already created and
/// aborts with a single error.
fn create_relay_pair<E: Copy + Eq + Hash, H: CircuitAccess<E>>(
    host: &mut H,
    site: RelaySite,
    primary: &E,
    kind: EntityKind,
) -> Result<ChannelPair<E>, RelayError> {
    let Some(red) = host.create_relay_entity(site) else {
        warn!("failed to create red relay entity for {}", kind);
        return Err(RelayError::PartialRegistration {
            kind,
            detail: "failed to create red relay entity",
        });
    };
    let Some(green) = host.create_relay_entity(site) else {
        warn!("failed to create green relay entity for {}, rolling back", kind);
        host.destroy_entity(&red);
        return Err(RelayError::PartialRegistration {
            kind,
            detail: "failed to create green relay entity",
        });
    };

    let relays = ChannelPair::new(red, green);
    for channel in WireChannel::ALL {
        if !host.connect_channel(relays.get(channel), primary, channel) {
            warn!(
                "failed to connect {} relay entity for {}, rolling back",
                channel.label(),
                kind
            );
            destroy_relay_pair(host, &relays);
            return Err(RelayError::PartialRegistration {
                kind,
                detail: "failed to connect relay entity",
            });
        }
    }

    Ok(relays)
}
