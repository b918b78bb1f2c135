//! PiercedError: Unified error type for mesh-pierced public APIs
//!
//! Every fallible container operation returns `Result<_, PiercedError>`.
//! Failed operations leave the container exactly as it was before the call.

use thiserror::Error;

/// Unified error type for pierced container operations.
///
/// Identifiers are carried pre-formatted (via `Debug`) so the error stays
/// independent of the container's id type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PiercedError {
    /// Insertion of an id that is already live.
    #[error("id `{0}` is already present in the container")]
    DuplicateId(String),
    /// Operation referencing an id that is not live.
    #[error("id `{0}` not found in the container")]
    NotFound(String),
    /// Position or field index outside the storage bounds.
    #[error("slot ({pos}, field {field}) out of range: capacity {capacity}, {fields} field(s) per slot")]
    OutOfRange {
        pos: usize,
        field: usize,
        capacity: usize,
        fields: usize,
    },
    /// `front`/`back` on a container with no live entries.
    #[error("container is empty")]
    Empty,
    /// Reserve or resize beyond the configured maximum capacity.
    #[error("requested capacity {requested} exceeds the maximum of {max}")]
    Capacity { requested: usize, max: usize },
    /// Shrinking would discard a live position.
    #[error("cannot shrink to {requested}: position {live_end} - 1 is still in use")]
    InUse { requested: usize, live_end: usize },
    /// Cursor advanced after a structural mutation of its kernel.
    #[error("container modified during traversal (version {expected} -> {found})")]
    ConcurrentModification { expected: u64, found: u64 },
    /// Attempted to build an `EntityId` from the reserved value 0.
    #[error("EntityId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidId,
    /// A storage must hold at least one field per slot.
    #[error("a storage needs at least one field per slot")]
    InvalidFieldCount,
    /// Sync requested with a handle the kernel never issued (or already released).
    #[error("unknown sync handle {0}")]
    UnknownSyncHandle(u64),
    /// Storage length disagrees with the kernel capacity.
    #[error("storage holds {found} slot(s) but the kernel capacity is {expected}")]
    StorageMismatch { expected: usize, found: usize },
}

impl PiercedError {
    pub(crate) fn duplicate<Id: std::fmt::Debug>(id: Id) -> Self {
        PiercedError::DuplicateId(format!("{id:?}"))
    }

    pub(crate) fn not_found<Id: std::fmt::Debug>(id: Id) -> Self {
        PiercedError::NotFound(format!("{id:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = PiercedError::duplicate(7u64);
        assert_eq!(e.to_string(), "id `7` is already present in the container");
        let e = PiercedError::InUse {
            requested: 2,
            live_end: 5,
        };
        assert!(e.to_string().contains("shrink to 2"));
        let e = PiercedError::not_found(-3i64);
        assert_eq!(e, PiercedError::NotFound("-3".into()));
    }
}
