use std::default::Default;

use crate::types::Tick;

/// Contains Config properties which will be used by the relay engine
#[derive(Clone)]
pub struct RelayConfig {
    /// Ticks between transmit passes: the cadence at which partition
    /// aggregates are recomputed and pushed to subscribers.
    pub transmit_period: Tick,
    /// Ticks between resync sweeps. Location records may be stale by up to
    /// this long if a relocation event was missed (e.g. around load), so it
    /// bounds the worst-case staleness the transmit pass tolerates.
    pub resync_period: Tick,
    /// Whether a freshly built subscriber starts subscribed to every
    /// partition known at creation time, or to none.
    pub subscribe_known_partitions_on_build: bool,
    /// The hold-last-value flag a freshly built subscriber starts with.
    pub default_hold_last_value: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            transmit_period: 30,
            resync_period: 600,
            subscribe_known_partitions_on_build: true,
            default_hold_last_value: false,
        }
    }
}
