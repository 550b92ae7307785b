use std::hash::Hash;

use crate::{
    channel::WireChannel,
    signal::SignalSet,
    types::{HostId, PartitionId},
};

/// Where an anonymous relay entity should be spawned: on a surface, or aboard
/// a mobile host.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelaySite {
    Partition(PartitionId),
    Host(HostId),
}

/// The host platform's entity/circuit capability surface.
///
/// The engine never owns entities; it holds opaque handles `E` and reaches
/// every entity through this trait, passed into each call rather than stored.
/// All methods are total: an invalid handle reads as `None`/no-op, never a
/// panic.
pub trait CircuitAccess<E: Copy + Eq + Hash> {
    /// Whether the handle still resolves to a live entity.
    fn entity_is_valid(&self, entity: &E) -> bool;

    /// Current signal readings of the entity's connector on one channel.
    /// `None` if the entity is invalid or the channel unconnected.
    fn read_channel(&self, entity: &E, channel: WireChannel) -> Option<SignalSet>;

    /// Full-replace write of a relay entity's output. Prior contents are
    /// discarded, not merged. Clamping to the host's native signal range
    /// happens here.
    fn write_output(&mut self, entity: &E, signals: &SignalSet);

    /// Spawns a hidden relay entity at the given site. `None` on failure.
    fn create_relay_entity(&mut self, site: RelaySite) -> Option<E>;

    /// Wires two connectors together on one channel. Returns success.
    fn connect_channel(&mut self, source: &E, dest: &E, channel: WireChannel) -> bool;

    /// Destroys an entity. Must tolerate already-invalid handles.
    fn destroy_entity(&mut self, entity: &E);

    /// Authoritative residency of a mobile host. Expensive; called only from
    /// the resync sweep and immediate post-build passes, never from the fast
    /// transmit path.
    fn current_residency(&self, host_id: HostId) -> Option<PartitionId>;

    /// Every partition the host currently knows about. Used to seed default
    /// subscriptions and to present choices in the configuration editor.
    fn known_partitions(&self) -> Vec<PartitionId>;
}
