//! Cached answer to "which partition is host X currently co-located with".
//!
//! Deriving residency by querying the host every transmit tick would be
//! unacceptably costly, so the resolver caches: relocation events overwrite
//! eagerly, and the slower resync sweep re-derives every record from
//! authoritative state as a safety net. Readers tolerate staleness up to one
//! resync period.

use std::collections::HashMap;

use crate::types::{HostId, PartitionId, Tick};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationRecord {
    /// Partition the host resides at, or `None` while in transit.
    pub partition: Option<PartitionId>,
    /// Tick the record was last written.
    pub updated_at: Tick,
}

pub struct LocationResolver {
    records: HashMap<HostId, LocationRecord>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Overwrites the cached location, stamped with the current tick.
    pub fn update(&mut self, host_id: HostId, partition: Option<PartitionId>, now: Tick) {
        self.records.insert(
            host_id,
            LocationRecord {
                partition,
                updated_at: now,
            },
        );
    }

    /// Pure lookup, no recomputation. Unknown hosts read as in transit.
    pub fn get(&self, host_id: HostId) -> Option<PartitionId> {
        self.records.get(&host_id).and_then(|record| record.partition)
    }

    pub fn record(&self, host_id: HostId) -> Option<&LocationRecord> {
        self.records.get(&host_id)
    }

    /// Drops a host's record once nothing subscribes from it anymore.
    pub fn forget(&mut self, host_id: HostId) {
        self.records.remove(&host_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (HostId, &LocationRecord)> {
        self.records.iter().map(|(host_id, record)| (*host_id, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}
