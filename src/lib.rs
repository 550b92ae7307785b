//! # Surface Relay
//! A tick-driven engine that aggregates circuit-network signals per surface
//! and relays them to the platform-mounted receivers currently in range,
//! keeping the two wire channels strictly apart in both directions.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod big_map;
mod channel;
mod error;
mod host;
mod location;
mod partition;
mod server;
mod signal;
mod subscriber;
mod types;

pub use big_map::{BigMap, BigMapKey};
pub use channel::{ChannelPair, WireChannel};
pub use error::RelayError;
pub use host::{CircuitAccess, RelaySite};
pub use location::{LocationRecord, LocationResolver};
pub use partition::{Partition, PartitionDirectory, PartitionRef, ProducerKey, ProducerRecord};
pub use server::{RelayConfig, RelayServer, RelayStats};
pub use signal::{aggregate, SignalId, SignalKind, SignalSet};
pub use subscriber::{
    SubscriberConfig, SubscriberKey, SubscriberMut, SubscriberRecord, SubscriberRef,
    SubscriberRegistry, SubscriberSlot,
};
pub use types::{EntityKind, HostId, PartitionId, Tick};
