//! ValueCache: id → value lookup with a selectable layout.
//!
//! - `Dense`: slots indexed directly by [`PiercedId::to_index`]. Fastest when
//!   ids are small and compact.
//! - `Hashed`: a hash map, for sparse or negative ids.
//! - `Pierced`: a [`PiercedVector`], keeping insertion locality and hole
//!   reuse.

use hashbrown::HashMap;
use itertools::{Either, Itertools};

use crate::config::{CacheLayout, PiercedConfig};
use crate::containers::vector::PiercedVector;
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Id-keyed value cache; see the module docs for the layouts.
#[derive(Clone, Debug)]
pub enum ValueCache<Id: PiercedId, V> {
    /// Slots indexed by id.
    Dense {
        /// `slots[id.to_index()]` holds the entry for `id`.
        slots: Vec<Option<(Id, V)>>,
        /// Number of occupied slots.
        len: usize,
        /// Exclusive upper bound on `id.to_index()`.
        max_len: usize,
    },
    /// Hash map keyed by id.
    Hashed(HashMap<Id, V>),
    /// Pierced vector keyed by id.
    Pierced(PiercedVector<V, Id>),
}

impl<Id: PiercedId, V: Clone + Default> Default for ValueCache<Id, V> {
    fn default() -> Self {
        ValueCache::new(CacheLayout::default())
    }
}

impl<Id: PiercedId, V: Clone + Default> ValueCache<Id, V> {
    /// Empty cache using `layout` and the default configuration.
    pub fn new(layout: CacheLayout) -> Self {
        Self::with_config(layout, &PiercedConfig::default())
    }

    /// Empty cache using `layout`. A `Dense` cache only accepts ids whose
    /// index is below `cfg.max_capacity`.
    pub fn with_config(layout: CacheLayout, cfg: &PiercedConfig) -> Self {
        match layout {
            CacheLayout::Dense => ValueCache::Dense {
                slots: Vec::new(),
                len: 0,
                max_len: cfg.max_capacity,
            },
            CacheLayout::Hashed => ValueCache::Hashed(HashMap::new()),
            CacheLayout::Pierced => ValueCache::Pierced(PiercedVector::with_config(cfg)),
        }
    }

    /// Layout of this cache.
    pub fn layout(&self) -> CacheLayout {
        match self {
            ValueCache::Dense { .. } => CacheLayout::Dense,
            ValueCache::Hashed(_) => CacheLayout::Hashed,
            ValueCache::Pierced(_) => CacheLayout::Pierced,
        }
    }

    /// Store `value` under `id`.
    ///
    /// # Errors
    /// `DuplicateId` if `id` is cached already. For a `Dense` cache,
    /// `OutOfRange` when `id` has no index and `Capacity` when its index is
    /// not below the maximum or the slots cannot be allocated.
    pub fn insert(&mut self, id: Id, value: V) -> Result<(), PiercedError> {
        match self {
            ValueCache::Dense {
                slots,
                len,
                max_len,
            } => {
                let idx = dense_index(id, slots.len())?;
                if slots.get(idx).is_some_and(Option::is_some) {
                    return Err(PiercedError::duplicate(id));
                }
                if idx >= slots.len() {
                    let too_big = PiercedError::Capacity {
                        requested: idx.saturating_add(1),
                        max: *max_len,
                    };
                    let new_len = idx
                        .checked_add(1)
                        .filter(|&n| n <= *max_len)
                        .ok_or_else(|| too_big.clone())?;
                    slots
                        .try_reserve(new_len - slots.len())
                        .map_err(|_| too_big)?;
                    slots.resize_with(new_len, || None);
                }
                slots[idx] = Some((id, value));
                *len += 1;
                Ok(())
            }
            ValueCache::Hashed(map) => match map.entry(id) {
                hashbrown::hash_map::Entry::Occupied(_) => Err(PiercedError::duplicate(id)),
                hashbrown::hash_map::Entry::Vacant(e) => {
                    e.insert(value);
                    Ok(())
                }
            },
            ValueCache::Pierced(vec) => vec.insert(id, value).map(|_| ()),
        }
    }

    /// Cached value for `id`.
    pub fn find(&self, id: Id) -> Option<&V> {
        match self {
            ValueCache::Dense { slots, .. } => id
                .to_index()
                .and_then(|i| slots.get(i))
                .and_then(|slot| slot.as_ref())
                .map(|(_, v)| v),
            ValueCache::Hashed(map) => map.get(&id),
            ValueCache::Pierced(vec) => vec.get(id),
        }
    }

    /// Mutable cached value for `id`.
    pub fn find_mut(&mut self, id: Id) -> Option<&mut V> {
        match self {
            ValueCache::Dense { slots, .. } => id
                .to_index()
                .and_then(|i| slots.get_mut(i))
                .and_then(|slot| slot.as_mut())
                .map(|(_, v)| v),
            ValueCache::Hashed(map) => map.get_mut(&id),
            ValueCache::Pierced(vec) => vec.get_mut(id),
        }
    }

    /// Remove `id`, returning its value.
    ///
    /// # Errors
    /// `NotFound` if `id` is not cached.
    pub fn erase(&mut self, id: Id) -> Result<V, PiercedError> {
        match self {
            ValueCache::Dense { slots, len, .. } => {
                let (_, value) = id
                    .to_index()
                    .and_then(|i| slots.get_mut(i))
                    .and_then(Option::take)
                    .ok_or_else(|| PiercedError::not_found(id))?;
                *len -= 1;
                Ok(value)
            }
            ValueCache::Hashed(map) => map.remove(&id).ok_or_else(|| PiercedError::not_found(id)),
            ValueCache::Pierced(vec) => vec.erase(id),
        }
    }

    /// Whether `id` is cached.
    pub fn contains(&self, id: Id) -> bool {
        self.find(id).is_some()
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        match self {
            ValueCache::Dense { len, .. } => *len,
            ValueCache::Hashed(map) => map.len(),
            ValueCache::Pierced(vec) => vec.len(),
        }
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every value, keeping the layout.
    pub fn clear(&mut self) {
        match self {
            ValueCache::Dense { slots, len, .. } => {
                slots.clear();
                *len = 0;
            }
            ValueCache::Hashed(map) => map.clear(),
            ValueCache::Pierced(vec) => vec.clear(),
        }
    }

    /// Cached ids. `Dense` and `Hashed` yield ascending ids, `Pierced`
    /// yields position order.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        match self {
            ValueCache::Dense { slots, .. } => {
                Either::Left(slots.iter().filter_map(|slot| slot.as_ref().map(|(id, _)| *id)))
            }
            ValueCache::Hashed(map) => Either::Right(Either::Left(map.keys().copied().sorted())),
            ValueCache::Pierced(vec) => Either::Right(Either::Right(vec.ids())),
        }
    }
}

fn dense_index<Id: PiercedId>(id: Id, capacity: usize) -> Result<usize, PiercedError> {
    id.to_index().ok_or(PiercedError::OutOfRange {
        pos: usize::MAX,
        field: 0,
        capacity,
        fields: 1,
    })
}
