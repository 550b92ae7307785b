use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic tick counter supplied by the host's clock.
pub type Tick = u64;

/// Stable identifier of one broadcast domain (a surface).
///
/// Assigned by the host and taken as-is; partitions are created lazily on
/// first registration and never destroyed, so an id stays addressable even
/// after its last producer is removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "partition-{}", self.0)
    }
}

/// Stable identifier of one mobile host (a platform) that subscribers ride on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct HostId(pub u32);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

/// The two registrable entity kinds. Dispatch over kinds is always a `match`
/// on this enum, resolved once at registration time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityKind {
    Producer,
    Subscriber,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityKind::Producer => write!(f, "producer"),
            EntityKind::Subscriber => write!(f, "subscriber"),
        }
    }
}
