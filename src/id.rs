//! Identifiers for pierced containers.
//!
//! A pierced container is keyed by an application-chosen integer id that
//! stays valid across every structural change of the container. This module
//! provides:
//! - [`PiercedId`], the bound set every id type satisfies (blanket-implemented
//!   for the primitive integers).
//! - [`EntityId`], a strong, zero-cost handle for mesh entities that wraps a
//!   nonzero `u64`, reserving 0 as an invalid or sentinel value.

use std::{fmt, num::NonZeroU64};

use num_traits::ToPrimitive;

use crate::pierced_error::PiercedError;

/// Canonical bound set for container identifiers.
///
/// - `Copy` for cheap pass-by-value in tight loops
/// - `Eq + Hash` for the id → position map
/// - `Ord` for deterministic ordering (`sort`)
/// - `Debug` for diagnostics and error messages
/// - `ToPrimitive` so array-backed caches can index by id
pub trait PiercedId: Copy + Eq + std::hash::Hash + Ord + fmt::Debug + ToPrimitive {
    /// Dense array index for this id, or `None` for negative ids.
    #[inline]
    fn to_index(self) -> Option<usize> {
        self.to_usize()
    }
}

impl<T> PiercedId for T where T: Copy + Eq + std::hash::Hash + Ord + fmt::Debug + ToPrimitive {}

/// Handle for a mesh entity (vertex, cell, interface) stored in a pierced
/// container.
///
/// This type is `repr(transparent)`, meaning it has the same ABI and
/// alignment as `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct EntityId(NonZeroU64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    ///
    /// # Errors
    /// Returns `Err(PiercedError::InvalidId)` if `raw == 0`.
    ///
    /// # Example
    /// ```rust
    /// # fn try_main() -> Result<(), mesh_pierced::pierced_error::PiercedError> {
    /// use mesh_pierced::id::EntityId;
    /// let e = EntityId::new(1)?;
    /// assert_eq!(e.get(), 1);
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn new(raw: u64) -> Result<Self, PiercedError> {
        NonZeroU64::new(raw)
            .map(EntityId)
            .ok_or(PiercedError::InvalidId)
    }

    /// Returns the inner `u64` value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityId").field(&self.get()).finish()
    }
}

/// Prints only the raw integer.
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl ToPrimitive for EntityId {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.get().to_i64()
    }

    #[inline]
    fn to_u64(&self) -> Option<u64> {
        Some(self.get())
    }
}

impl TryFrom<u64> for EntityId {
    type Error = PiercedError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        EntityId::new(raw)
    }
}

impl From<EntityId> for u64 {
    fn from(e: EntityId) -> u64 {
        e.get()
    }
}
