//! PiercedVector: an id-keyed ordered sequence.
//!
//! `PiercedVector<V, Id>` pairs a [`PiercedKernel`] with a single-field
//! [`PiercedStorage`]. Ids are resolved through the kernel, values are read
//! and written through the storage at the resolved position, and every
//! structural change of the kernel is committed to the storage right away.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PiercedConfig;
use crate::containers::kernel::{Compaction, PiercedKernel};
use crate::containers::range::Cursor;
use crate::containers::storage::PiercedStorage;
use crate::containers::sync::SyncAction;
use crate::debug_invariants::DebugInvariants;
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Vector-like container whose elements are addressed by stable ids.
///
/// # Example
/// ```rust
/// # fn try_main() -> Result<(), mesh_pierced::pierced_error::PiercedError> {
/// use mesh_pierced::containers::vector::PiercedVector;
/// let mut cells = PiercedVector::<&str, u64>::new();
/// cells.push_back(1, "tri")?;
/// cells.push_back(2, "quad")?;
/// cells.push_back(3, "tet")?;
/// assert_eq!(cells.erase(2)?, "quad");
/// cells.insert(4, "hex")?;
/// assert_eq!(cells.values().copied().collect::<Vec<_>>(), vec!["tri", "hex", "tet"]);
/// assert_eq!(cells[4], "hex");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PiercedVector<V, Id: PiercedId = u64> {
    kernel: PiercedKernel<Id>,
    storage: PiercedStorage<V>,
}

impl<V: Clone + Default, Id: PiercedId> Default for PiercedVector<V, Id> {
    fn default() -> Self {
        PiercedVector::with_config(&PiercedConfig::default())
    }
}

impl<V: Clone + Default, Id: PiercedId> PiercedVector<V, Id> {
    /// Empty vector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty vector honoring `cfg`.
    pub fn with_config(cfg: &PiercedConfig) -> Self {
        PiercedVector {
            kernel: PiercedKernel::with_config(cfg),
            storage: Self::single_field_storage(),
        }
    }

    fn single_field_storage() -> PiercedStorage<V> {
        match PiercedStorage::new(1) {
            Ok(s) => s,
            // One field is always valid.
            Err(_) => unreachable!(),
        }
    }

    /// The underlying kernel.
    #[inline]
    pub fn kernel(&self) -> &PiercedKernel<Id> {
        &self.kernel
    }

    /// The underlying storage.
    #[inline]
    pub fn storage(&self) -> &PiercedStorage<V> {
        &self.storage
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.kernel.len()
    }

    /// Whether there are no live elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    /// Number of positions, holes included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.kernel.capacity()
    }

    /// Whether `id` is live.
    #[inline]
    pub fn contains(&self, id: Id) -> bool {
        self.kernel.contains(id)
    }

    /// Position of `id`, if live.
    #[inline]
    pub fn find(&self, id: Id) -> Option<usize> {
        self.kernel.find(id)
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Store `value` under `id` in the lowest hole, or at the end.
    /// Returns the position used.
    pub fn insert(&mut self, id: Id, value: V) -> Result<usize, PiercedError> {
        let action = self.kernel.insert(id)?;
        self.place(id, action, value)
    }

    /// Store `value` under `id` after the last element.
    pub fn push_back(&mut self, id: Id, value: V) -> Result<usize, PiercedError> {
        let action = self.kernel.insert_append(id)?;
        self.place(id, action, value)
    }

    /// Store `value` under `id` in the lowest hole (appending without holes).
    pub fn fill_hole(&mut self, id: Id, value: V) -> Result<usize, PiercedError> {
        let action = self.kernel.fill_hole(id)?;
        self.place(id, action, value)
    }

    /// Store `value` under `id` immediately before `reference`.
    pub fn insert_before(
        &mut self,
        id: Id,
        reference: Id,
        value: V,
    ) -> Result<usize, PiercedError> {
        let action = self.kernel.insert_before(id, reference)?;
        self.place(id, action, value)
    }

    /// Store `value` under `id` immediately after `reference`.
    pub fn insert_after(&mut self, id: Id, reference: Id, value: V) -> Result<usize, PiercedError> {
        let action = self.kernel.insert_after(id, reference)?;
        self.place(id, action, value)
    }

    fn place(&mut self, id: Id, action: SyncAction, value: V) -> Result<usize, PiercedError> {
        self.storage.commit(&action)?;
        let pos = self.kernel.position(id)?;
        self.storage.set(pos, 0, value)?;
        Ok(pos)
    }

    // ------------------------------------------------------------------
    // Removal and layout
    // ------------------------------------------------------------------

    /// Remove `id`, returning its value.
    ///
    /// # Errors
    /// `NotFound` if `id` is not live.
    pub fn erase(&mut self, id: Id) -> Result<V, PiercedError> {
        let pos = self.kernel.position(id)?;
        let value = std::mem::take(self.storage.get_mut(pos, 0)?);
        let action = self.kernel.erase(id)?;
        self.storage.commit(&action)?;
        Ok(value)
    }

    /// Compact holes; see [`PiercedKernel::flush`].
    pub fn flush(&mut self) -> Result<Compaction, PiercedError> {
        let compaction = self.kernel.flush();
        self.storage.commit(&compaction.action)?;
        Ok(compaction)
    }

    /// Compact holes and release spare allocation.
    pub fn squeeze(&mut self) -> Result<Compaction, PiercedError> {
        let compaction = self.kernel.squeeze();
        self.storage.commit(&compaction.action)?;
        self.storage.commit(&SyncAction::ShrinkToFit)?;
        Ok(compaction)
    }

    /// Order elements by ascending id.
    pub fn sort(&mut self) -> Result<Compaction, PiercedError> {
        let compaction = self.kernel.sort();
        self.storage.commit(&compaction.action)?;
        Ok(compaction)
    }

    /// Exchange the positions of two elements.
    pub fn swap(&mut self, a: Id, b: Id) -> Result<(), PiercedError> {
        let action = self.kernel.swap(a, b)?;
        self.storage.commit(&action)
    }

    /// Re-key the element `old` as `new`, keeping its value and position.
    pub fn update_id(&mut self, old: Id, new: Id) -> Result<(), PiercedError> {
        self.kernel.update_id(old, new)
    }

    /// Pre-allocate room for `n` positions.
    pub fn reserve(&mut self, n: usize) -> Result<(), PiercedError> {
        let action = self.kernel.reserve(n)?;
        self.storage.commit(&action)
    }

    /// Set the number of positions; see [`PiercedKernel::resize`].
    pub fn resize(&mut self, n: usize) -> Result<(), PiercedError> {
        self.storage.resize(&mut self.kernel, n)
    }

    /// Release spare allocation without moving elements.
    pub fn shrink_to_fit(&mut self) -> Result<(), PiercedError> {
        let action = self.kernel.shrink_to_fit();
        self.storage.commit(&action)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.kernel.clear();
        self.storage = Self::single_field_storage();
    }

    /// Set every slot, holes included, to `value`.
    pub fn fill(&mut self, value: V) {
        self.storage.fill(value);
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// Value stored under `id`.
    #[inline]
    pub fn get(&self, id: Id) -> Option<&V> {
        let pos = self.kernel.find(id)?;
        self.storage.get(pos, 0).ok()
    }

    /// Mutable value stored under `id`.
    #[inline]
    pub fn get_mut(&mut self, id: Id) -> Option<&mut V> {
        let pos = self.kernel.find(id)?;
        self.storage.get_mut(pos, 0).ok()
    }

    /// Value stored under `id`, or `NotFound`.
    pub fn at(&self, id: Id) -> Result<&V, PiercedError> {
        let pos = self.kernel.position(id)?;
        self.storage.get(pos, 0)
    }

    /// Mutable value stored under `id`, or `NotFound`.
    pub fn at_mut(&mut self, id: Id) -> Result<&mut V, PiercedError> {
        let pos = self.kernel.position(id)?;
        self.storage.get_mut(pos, 0)
    }

    /// Value at the first live position.
    pub fn front(&self) -> Result<&V, PiercedError> {
        self.at(self.kernel.front()?)
    }

    /// Value at the last live position.
    pub fn back(&self) -> Result<&V, PiercedError> {
        self.at(self.kernel.back()?)
    }

    /// `(id, &value)` in position order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Id, &V)> + '_ {
        self.kernel
            .slots()
            .iter()
            .zip(self.storage.as_slice())
            .filter_map(|(slot, v)| slot.map(|id| (id, v)))
    }

    /// `(id, &mut value)` in position order.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (Id, &mut V)> + '_ {
        self.kernel
            .slots()
            .iter()
            .zip(self.storage.as_mut_slice())
            .filter_map(|(slot, v)| slot.map(|id| (id, v)))
    }

    /// Live ids in position order.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = Id> + '_ {
        self.kernel.iter().map(|(id, _)| id)
    }

    /// Live values in position order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// `(id, &value)` from `first` to `last` inclusive, in position order.
    ///
    /// # Errors
    /// `NotFound` if either id is not live.
    pub fn range(
        &self,
        first: Id,
        last: Id,
    ) -> Result<impl DoubleEndedIterator<Item = (Id, &V)> + '_, PiercedError> {
        let window = self.kernel.range_between(first, last)?;
        Ok(self.storage.range(window).map(|(id, _, slot)| (id, &slot[0])))
    }

    /// Detached cursor; advance it with [`advance`](Self::advance).
    pub fn cursor(&self) -> Cursor {
        self.kernel.cursor()
    }

    /// Next `(id, position, &value)` for `cursor`.
    ///
    /// # Errors
    /// `ConcurrentModification` if the vector was structurally modified
    /// since the cursor started.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(Id, usize, &V)>, PiercedError> {
        match cursor.advance(&self.kernel)? {
            Some((id, pos)) => Ok(Some((id, pos, self.storage.get(pos, 0)?))),
            None => Ok(None),
        }
    }
}

impl<V: Clone + Default, Id: PiercedId> Index<Id> for PiercedVector<V, Id> {
    type Output = V;

    /// # Panics
    /// Panics if `id` is not live; use [`PiercedVector::at`] to handle that.
    fn index(&self, id: Id) -> &V {
        match self.at(id) {
            Ok(v) => v,
            Err(e) => panic!("PiercedVector index: {e}"),
        }
    }
}

impl<V: Clone + Default, Id: PiercedId> IndexMut<Id> for PiercedVector<V, Id> {
    fn index_mut(&mut self, id: Id) -> &mut V {
        match self.at_mut(id) {
            Ok(v) => v,
            Err(e) => panic!("PiercedVector index: {e}"),
        }
    }
}

/// Later duplicates overwrite earlier values, new ids are appended.
///
/// # Panics
/// Panics if the maximum capacity is exceeded, like `Vec` on overflow.
impl<V: Clone + Default, Id: PiercedId> Extend<(Id, V)> for PiercedVector<V, Id> {
    fn extend<I: IntoIterator<Item = (Id, V)>>(&mut self, iter: I) {
        for (id, value) in iter {
            if let Some(slot) = self.get_mut(id) {
                *slot = value;
            } else if let Err(e) = self.push_back(id, value) {
                panic!("PiercedVector::extend: {e}");
            }
        }
    }
}

impl<V: Clone + Default, Id: PiercedId> FromIterator<(Id, V)> for PiercedVector<V, Id> {
    fn from_iter<I: IntoIterator<Item = (Id, V)>>(iter: I) -> Self {
        let mut out = PiercedVector::new();
        out.extend(iter);
        out
    }
}

impl<V: Clone + Default, Id: PiercedId> DebugInvariants for PiercedVector<V, Id> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PiercedVector invalid");
    }

    fn validate_invariants(&self) -> Result<(), PiercedError> {
        self.kernel.validate_invariants()?;
        self.storage.check_sync(&self.kernel)
    }
}

/// Serialized densely as a sequence of `(id, value)` in position order;
/// holes are not preserved.
impl<V, Id> Serialize for PiercedVector<V, Id>
where
    V: Clone + Default + Serialize,
    Id: PiercedId + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for entry in self.iter() {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

/// Upper bound on the slots reserved up front while deserializing.
const PREALLOC_LIMIT: usize = 4096;

impl<'de, V, Id> Deserialize<'de> for PiercedVector<V, Id>
where
    V: Clone + Default + Deserialize<'de>,
    Id: PiercedId + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V, Id>(std::marker::PhantomData<(V, Id)>);

        impl<'de, V, Id> Visitor<'de> for EntriesVisitor<V, Id>
        where
            V: Clone + Default + Deserialize<'de>,
            Id: PiercedId + Deserialize<'de>,
        {
            type Value = PiercedVector<V, Id>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence of (id, value) pairs with unique ids")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = PiercedVector::new();
                // Length prefixes are untrusted; grow past this as elements arrive.
                if let Some(n) = seq.size_hint() {
                    out.reserve(n.min(PREALLOC_LIMIT)).map_err(serde::de::Error::custom)?;
                }
                while let Some((id, value)) = seq.next_element::<(Id, V)>()? {
                    out.push_back(id, value).map_err(serde::de::Error::custom)?;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(EntriesVisitor(std::marker::PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> PiercedVector<char, u32> {
        [(1, 'a'), (2, 'b'), (3, 'c')].into_iter().collect()
    }

    #[test]
    fn insert_get_and_index() {
        let mut v = abc();
        assert_eq!(v.get(2), Some(&'b'));
        assert_eq!(v[3], 'c');
        v[3] = 'z';
        assert_eq!(v.at(3).unwrap(), &'z');
        assert_eq!(v.at(9), Err(PiercedError::NotFound("9".into())));
        assert_eq!(v.get(9), None);
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn index_missing_panics() {
        let v = abc();
        let _ = v[42];
    }

    #[test]
    fn erase_returns_value_and_reuses_slot() {
        let mut v = abc();
        assert_eq!(v.erase(2).unwrap(), 'b');
        assert_eq!(v.capacity(), 3);
        assert_eq!(v.insert(4, 'd').unwrap(), 1);
        assert_eq!(v.ids().collect::<Vec<_>>(), vec![1, 4, 3]);
        assert_eq!(v.values().copied().collect::<Vec<_>>(), vec!['a', 'd', 'c']);
    }

    #[test]
    fn reused_slot_starts_from_default() {
        let mut v: PiercedVector<Vec<u8>, u32> = PiercedVector::new();
        v.push_back(1, vec![1, 2, 3]).unwrap();
        v.erase(1).unwrap();
        v.fill_hole(2, Vec::new()).unwrap();
        assert!(v[2].is_empty());
    }

    #[test]
    fn ordered_inserts_keep_values_attached() {
        let mut v = abc();
        v.erase(1).unwrap();
        v.insert_before(9, 3, 'x').unwrap();
        assert_eq!(
            v.iter().map(|(id, c)| (id, *c)).collect::<Vec<_>>(),
            vec![(2, 'b'), (9, 'x'), (3, 'c')]
        );
        v.insert_after(8, 2, 'y').unwrap();
        assert_eq!(
            v.iter().map(|(id, c)| (id, *c)).collect::<Vec<_>>(),
            vec![(2, 'b'), (8, 'y'), (9, 'x'), (3, 'c')]
        );
        assert!(v.validate_invariants().is_ok());
    }

    #[test]
    fn front_back_values() {
        let mut v = abc();
        assert_eq!(v.front().unwrap(), &'a');
        assert_eq!(v.back().unwrap(), &'c');
        v.clear();
        assert_eq!(v.front(), Err(PiercedError::Empty));
        assert_eq!(v.back(), Err(PiercedError::Empty));
        v.push_back(5, 'e').unwrap();
        assert_eq!(v.front().unwrap(), &'e');
    }

    #[test]
    fn flush_keeps_values_with_ids() {
        let mut v = abc();
        v.erase(1).unwrap();
        let c = v.flush().unwrap();
        assert_eq!(c.remap, vec![None, Some(0), Some(1)]);
        assert_eq!(v.find(3), Some(1));
        assert_eq!(v[3], 'c');
        assert_eq!(v.storage().capacity(), 2);
    }

    #[test]
    fn sort_swap_update() {
        let mut v: PiercedVector<char, u32> = [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();
        v.sort().unwrap();
        assert_eq!(v.values().copied().collect::<String>(), "abc");
        v.swap(1, 3).unwrap();
        assert_eq!(v.values().copied().collect::<String>(), "cba");
        v.update_id(2, 20).unwrap();
        assert_eq!(v[20], 'b');
    }

    #[test]
    fn failed_resize_leaves_vector_unchanged() {
        let mut v = abc();
        v.resize(6).unwrap();
        assert_eq!(v.capacity(), 6);
        assert!(matches!(v.resize(2), Err(PiercedError::InUse { .. })));
        assert_eq!(v.capacity(), 6);
        for (id, c) in [(1, 'a'), (2, 'b'), (3, 'c')] {
            assert_eq!(v.get(id), Some(&c));
        }
        v.resize(3).unwrap();
        assert!(v.validate_invariants().is_ok());
    }

    #[test]
    fn iter_mut_updates_live_values_only() {
        let mut v = abc();
        v.erase(2).unwrap();
        for (_, c) in v.iter_mut() {
            *c = c.to_ascii_uppercase();
        }
        assert_eq!(v.values().copied().collect::<String>(), "AC");
        assert_eq!(v.iter().rev().map(|(id, _)| id).collect::<Vec<_>>(), vec![3, 1]);
    }

    #[test]
    fn range_between_ids() {
        let mut v: PiercedVector<char, u32> = "abcde"
            .chars()
            .zip(1..)
            .map(|(c, id)| (id, c))
            .collect();
        v.erase(3).unwrap();
        let got: String = v.range(2, 5).unwrap().map(|(_, c)| *c).collect();
        assert_eq!(got, "bde");
        assert_eq!(v.range(5, 2).unwrap().count(), 0);
        assert!(v.range(3, 4).is_err());
    }

    #[test]
    fn cursor_detects_modification() {
        let mut v = abc();
        let mut c = v.cursor();
        assert_eq!(v.advance(&mut c).unwrap(), Some((1, 0, &'a')));
        v.erase(3).unwrap();
        assert!(matches!(
            v.advance(&mut c),
            Err(PiercedError::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn extend_overwrites_duplicates() {
        let mut v = abc();
        v.extend([(2, 'B'), (4, 'd')]);
        assert_eq!(v.values().copied().collect::<String>(), "aBcd");
    }

    #[test]
    fn serde_roundtrip_is_dense() {
        let mut v = abc();
        v.erase(2).unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"[[1,"a"],[3,"c"]]"#);
        let back: PiercedVector<char, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.capacity(), 2);
        assert_eq!(back[3], 'c');

        let bytes = bincode::serialize(&v).unwrap();
        let back: PiercedVector<char, u32> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn duplicate_ids_fail_deserialization() {
        let r: Result<PiercedVector<char, u32>, _> = serde_json::from_str(r#"[[1,"a"],[1,"b"]]"#);
        assert!(r.is_err());
    }
}
