use thiserror::Error;

use crate::types::EntityKind;

/// Errors surfaced to callers of the relay engine.
///
/// Every other failure class (invalid handles, missing configuration, stale
/// locations) is recovered in place and never becomes an `Err`: invalid
/// handles are pruned where encountered, an unregistered subscriber reads as
/// an empty configuration, and the resync sweep corrects location drift.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// One of an entity's pair of relay entities could not be created or
    /// connected. Whatever was partially created has already been destroyed
    /// and the registration aborted.
    #[error("Failed to fully register {kind}: {detail}; partial relay entities rolled back")]
    PartialRegistration {
        kind: EntityKind,
        detail: &'static str,
    },

    /// A subscriber configuration blob could not be encoded or decoded.
    #[error("Failed to encode or decode subscriber configuration: {0}")]
    ConfigCodec(String),

    /// A configuration operation referenced a subscriber the registry does
    /// not know.
    #[error("No subscriber registered for the given key")]
    UnknownSubscriber,
}
