//! PiercedStorage: position-addressed payload slots kept in lockstep with a
//! kernel.
//!
//! A storage holds `k` interleaved fields per position, addressed as
//! `position * k + field`. It never interprets ids: it only learns about
//! structural changes through [`SyncAction`]s, either committed directly by
//! whoever owns both kernel and storage, or replayed from the kernel's
//! journal with [`PiercedStorage::sync`].

use std::marker::PhantomData;

use crate::containers::buffer::{SlotBuffer, VecBuffer};
use crate::containers::kernel::PiercedKernel;
use crate::containers::range::PiercedRange;
use crate::containers::sync::{SyncAction, SyncHandle};
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Payload slots for the positions of a [`PiercedKernel`].
///
/// # Example
/// ```rust
/// # fn try_main() -> Result<(), mesh_pierced::pierced_error::PiercedError> {
/// use mesh_pierced::containers::{kernel::PiercedKernel, storage::PiercedStorage};
/// let mut kernel = PiercedKernel::<u64>::new();
/// // Two fields per entry, e.g. a pressure and a temperature.
/// let (mut fields, handle) = PiercedStorage::<f64>::attach(&mut kernel, 2)?;
/// kernel.insert(10)?;
/// fields.sync(&mut kernel, handle)?;
/// let pos = kernel.position(10)?;
/// fields.set(pos, 1, 293.0)?;
/// assert_eq!(fields.slots(pos)?, &[0.0, 293.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PiercedStorage<V, B: SlotBuffer<V> = VecBuffer<V>> {
    buf: B,
    fields: usize,
    _marker: PhantomData<V>,
}

impl<V, B> PiercedStorage<V, B>
where
    V: Clone + Default,
    B: SlotBuffer<V>,
{
    /// Empty storage with `fields` values per position.
    ///
    /// # Errors
    /// `InvalidFieldCount` if `fields == 0`.
    pub fn new(fields: usize) -> Result<Self, PiercedError> {
        Self::with_capacity(0, fields)
    }

    fn with_capacity(capacity: usize, fields: usize) -> Result<Self, PiercedError> {
        if fields == 0 {
            return Err(PiercedError::InvalidFieldCount);
        }
        Ok(PiercedStorage {
            buf: B::with_len(capacity * fields, V::default()),
            fields,
            _marker: PhantomData,
        })
    }

    /// Storage sized for the current layout of `kernel`, not registered
    /// with it. The caller commits every later action itself.
    pub fn for_kernel<Id: PiercedId>(
        kernel: &PiercedKernel<Id>,
        fields: usize,
    ) -> Result<Self, PiercedError> {
        Self::with_capacity(kernel.capacity(), fields)
    }

    /// Storage sized for `kernel` and registered with its journal.
    pub fn attach<Id: PiercedId>(
        kernel: &mut PiercedKernel<Id>,
        fields: usize,
    ) -> Result<(Self, SyncHandle), PiercedError> {
        let storage = Self::for_kernel(kernel, fields)?;
        let handle = kernel.register_storage();
        Ok((storage, handle))
    }

    /// Number of fields per position.
    #[inline]
    pub fn fields(&self) -> usize {
        self.fields
    }

    /// Number of positions.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len() / self.fields
    }

    /// Backing buffer, all slots including holes.
    #[inline]
    pub fn as_slice(&self) -> &[V] {
        self.buf.as_slice()
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [V] {
        self.buf.as_mut_slice()
    }

    /// Value of `field` at `pos`.
    ///
    /// # Errors
    /// `OutOfRange` if `pos` or `field` is out of bounds.
    #[inline]
    pub fn get(&self, pos: usize, field: usize) -> Result<&V, PiercedError> {
        let idx = self.index(pos, field)?;
        Ok(&self.buf.as_slice()[idx])
    }

    /// Mutable value of `field` at `pos`.
    #[inline]
    pub fn get_mut(&mut self, pos: usize, field: usize) -> Result<&mut V, PiercedError> {
        let idx = self.index(pos, field)?;
        Ok(&mut self.buf.as_mut_slice()[idx])
    }

    /// Overwrite `field` at `pos`.
    pub fn set(&mut self, pos: usize, field: usize, value: V) -> Result<(), PiercedError> {
        *self.get_mut(pos, field)? = value;
        Ok(())
    }

    /// All fields at `pos`.
    pub fn slots(&self, pos: usize) -> Result<&[V], PiercedError> {
        let start = self.index(pos, 0)?;
        Ok(&self.buf.as_slice()[start..start + self.fields])
    }

    /// All fields at `pos`, mutably.
    pub fn slots_mut(&mut self, pos: usize) -> Result<&mut [V], PiercedError> {
        let start = self.index(pos, 0)?;
        let k = self.fields;
        Ok(&mut self.buf.as_mut_slice()[start..start + k])
    }

    /// Set every slot, holes included, to `value`.
    pub fn fill(&mut self, value: V) {
        self.buf.as_mut_slice().fill(value);
    }

    /// Parallel [`fill`](Self::fill) for large storages.
    #[cfg(feature = "rayon")]
    pub fn par_fill(&mut self, value: V)
    where
        V: Send + Sync,
    {
        use rayon::prelude::*;
        self.buf
            .as_mut_slice()
            .par_iter_mut()
            .for_each(|slot| *slot = value.clone());
    }

    /// Exchange every field of positions `a` and `b`.
    ///
    /// This is a raw positional operation: the kernel is not told, so use
    /// it only to mirror a kernel-side swap.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), PiercedError> {
        self.index(a, 0)?;
        self.index(b, 0)?;
        self.swap_unchecked(a, b);
        Ok(())
    }

    /// Resize `kernel` and this storage together. New slots are holes with
    /// default payload.
    ///
    /// # Errors
    /// `StorageMismatch` if this storage is not in step with `kernel`,
    /// `InUse` if a live position would be cut, `Capacity` above the
    /// kernel's maximum. Neither side changes on error.
    pub fn resize<Id: PiercedId>(
        &mut self,
        kernel: &mut PiercedKernel<Id>,
        new_capacity: usize,
    ) -> Result<(), PiercedError> {
        self.check_sync(kernel)?;
        let action = kernel.resize(new_capacity)?;
        self.commit(&action)
    }

    /// `Ok` when this storage has exactly one slot group per kernel position.
    pub fn check_sync<Id: PiercedId>(
        &self,
        kernel: &PiercedKernel<Id>,
    ) -> Result<(), PiercedError> {
        if self.capacity() != kernel.capacity() || self.buf.len() % self.fields != 0 {
            return Err(PiercedError::StorageMismatch {
                expected: kernel.capacity(),
                found: self.capacity(),
            });
        }
        Ok(())
    }

    /// Replay every action journaled for `handle`. Returns how many were
    /// applied.
    pub fn sync<Id: PiercedId>(
        &mut self,
        kernel: &mut PiercedKernel<Id>,
        handle: SyncHandle,
    ) -> Result<usize, PiercedError> {
        let mut applied = 0;
        for action in kernel.journal().pending(handle)? {
            self.commit(action)?;
            applied += 1;
        }
        kernel.journal_mut().acknowledge(handle)?;
        if applied > 0 {
            log::debug!("storage synced with {} journaled action(s)", applied);
        }
        Ok(applied)
    }

    /// Mirror one kernel action.
    ///
    /// # Errors
    /// `OutOfRange` if the action refers to positions this storage does not
    /// have; the storage is unchanged in that case.
    pub fn commit(&mut self, action: &SyncAction) -> Result<(), PiercedError> {
        let k = self.fields;
        match action {
            SyncAction::Append { pos } => {
                let len = self.capacity().max(pos + 1);
                self.buf.resize(len * k, V::default());
                self.reset(*pos);
            }
            SyncAction::Insert { pos } => {
                // Inserting at `capacity` is an append.
                if *pos > self.capacity() {
                    return Err(PiercedError::OutOfRange {
                        pos: *pos,
                        field: 0,
                        capacity: self.capacity(),
                        fields: k,
                    });
                }
                self.buf.insert_fill(pos * k, k, V::default());
            }
            SyncAction::Overwrite { pos } | SyncAction::Pierce { pos } => {
                self.index(*pos, 0)?;
                self.reset(*pos);
            }
            SyncAction::PierceMultiple { positions } => {
                for &pos in positions {
                    self.index(pos, 0)?;
                }
                for &pos in positions {
                    self.reset(pos);
                }
            }
            SyncAction::Shift { hole, pos } => {
                self.index(*hole, 0)?;
                self.index(*pos, 0)?;
                let slice = self.buf.as_mut_slice();
                if hole < pos {
                    slice[hole * k..(pos + 1) * k].rotate_left(k);
                } else {
                    slice[pos * k..(hole + 1) * k].rotate_right(k);
                }
                self.reset(*pos);
            }
            SyncAction::Swap { a, b } => self.swap(*a, *b)?,
            SyncAction::Resize { len } => self.buf.resize(len * k, V::default()),
            SyncAction::Reserve { capacity } => {
                self.buf
                    .reserve(capacity.saturating_sub(self.capacity()) * k);
            }
            SyncAction::Reorder { order } => {
                for &old in order {
                    self.index(old, 0)?;
                }
                let slice = self.buf.as_mut_slice();
                let mut packed = Vec::with_capacity(order.len() * k);
                for &old in order {
                    for f in 0..k {
                        packed.push(std::mem::take(&mut slice[old * k + f]));
                    }
                }
                self.buf.replace(packed);
            }
            SyncAction::Clear => self.buf.replace(Vec::new()),
            SyncAction::ShrinkToFit => self.buf.shrink_to_fit(),
            SyncAction::Noop => {}
        }
        Ok(())
    }

    /// Iterate `(id, position, fields)` over the live entries of `kernel`.
    pub fn iter_with<'a, Id: PiercedId>(
        &'a self,
        kernel: &'a PiercedKernel<Id>,
    ) -> impl DoubleEndedIterator<Item = (Id, usize, &'a [V])> + 'a {
        self.range(kernel.range())
    }

    /// Iterate `(id, position, fields)` over the live entries of a window
    /// obtained from the kernel, e.g. with [`PiercedKernel::range_between`].
    pub fn range<'a, Id: PiercedId>(
        &'a self,
        window: PiercedRange<'a, Id>,
    ) -> impl DoubleEndedIterator<Item = (Id, usize, &'a [V])> + 'a {
        let k = self.fields;
        let data = self.buf.as_slice();
        window
            .iter()
            .filter(move |&(_, pos)| (pos + 1) * k <= data.len())
            .map(move |(id, pos)| (id, pos, &data[pos * k..(pos + 1) * k]))
    }

    fn index(&self, pos: usize, field: usize) -> Result<usize, PiercedError> {
        let capacity = self.capacity();
        if pos >= capacity || field >= self.fields {
            return Err(PiercedError::OutOfRange {
                pos,
                field,
                capacity,
                fields: self.fields,
            });
        }
        Ok(pos * self.fields + field)
    }

    fn reset(&mut self, pos: usize) {
        let k = self.fields;
        for slot in &mut self.buf.as_mut_slice()[pos * k..(pos + 1) * k] {
            *slot = V::default();
        }
    }

    fn swap_unchecked(&mut self, a: usize, b: usize) {
        let k = self.fields;
        let slice = self.buf.as_mut_slice();
        for f in 0..k {
            slice.swap(a * k + f, b * k + f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = PiercedStorage<i32>;

    #[test]
    fn zero_fields_rejected() {
        assert_eq!(Store::new(0).unwrap_err(), PiercedError::InvalidFieldCount);
    }

    #[test]
    fn bounds_checked_access() {
        let mut s = Store::new(2).unwrap();
        s.commit(&SyncAction::Append { pos: 0 }).unwrap();
        s.set(0, 1, 5).unwrap();
        assert_eq!(*s.get(0, 1).unwrap(), 5);
        assert_eq!(
            s.get(1, 0).unwrap_err(),
            PiercedError::OutOfRange {
                pos: 1,
                field: 0,
                capacity: 1,
                fields: 2
            }
        );
        assert!(s.set(0, 2, 1).is_err());
    }

    #[test]
    fn commit_shift_rotates_slots() {
        let mut s = Store::new(1).unwrap();
        s.commit(&SyncAction::Resize { len: 4 }).unwrap();
        for pos in 0..4 {
            s.set(pos, 0, pos as i32 + 1).unwrap();
        }
        // Hole at 0 pulled up to 2.
        s.commit(&SyncAction::Shift { hole: 0, pos: 2 }).unwrap();
        assert_eq!(s.as_slice(), &[2, 3, 0, 4]);
        // Hole at 3 pushed down to 1.
        s.commit(&SyncAction::Shift { hole: 3, pos: 1 }).unwrap();
        assert_eq!(s.as_slice(), &[2, 0, 3, 0]);
    }

    #[test]
    fn commit_reorder_packs_fields() {
        let mut s = Store::new(2).unwrap();
        s.commit(&SyncAction::Resize { len: 3 }).unwrap();
        s.slots_mut(0).unwrap().copy_from_slice(&[1, 2]);
        s.slots_mut(2).unwrap().copy_from_slice(&[5, 6]);
        s.commit(&SyncAction::Reorder { order: vec![2, 0] }).unwrap();
        assert_eq!(s.as_slice(), &[5, 6, 1, 2]);
        assert_eq!(s.capacity(), 2);
    }

    #[test]
    fn commit_rejects_foreign_positions() {
        let mut s = Store::new(1).unwrap();
        assert!(s.commit(&SyncAction::Overwrite { pos: 0 }).is_err());
        assert!(s.commit(&SyncAction::Reorder { order: vec![1] }).is_err());
        assert_eq!(s.capacity(), 0);
    }

    #[test]
    fn fill_and_swap() {
        let mut s = Store::new(2).unwrap();
        s.commit(&SyncAction::Resize { len: 2 }).unwrap();
        s.fill(9);
        s.set(1, 0, 1).unwrap();
        s.swap(0, 1).unwrap();
        assert_eq!(s.as_slice(), &[1, 9, 9, 9]);
        assert!(s.swap(0, 2).is_err());
    }

    #[test]
    fn resize_in_lockstep() {
        let mut k = PiercedKernel::<u32>::new();
        let mut s = Store::for_kernel(&k, 1).unwrap();
        s.commit(&k.insert(1).unwrap()).unwrap();
        s.commit(&k.insert(2).unwrap()).unwrap();
        s.resize(&mut k, 5).unwrap();
        assert_eq!(s.capacity(), 5);
        assert_eq!(k.capacity(), 5);
        let err = s.resize(&mut k, 1).unwrap_err();
        assert!(matches!(err, PiercedError::InUse { .. }));
        assert_eq!(s.capacity(), 5);
        assert_eq!(k.find(1), Some(0));
        assert_eq!(k.find(2), Some(1));
    }

    #[test]
    fn attached_storage_iterates_live_fields() {
        let mut k = PiercedKernel::<u32>::new();
        let (mut s, h) = Store::attach(&mut k, 2).unwrap();
        for id in 1..=4 {
            k.insert(id).unwrap();
        }
        k.erase(3).unwrap();
        assert_eq!(s.sync(&mut k, h).unwrap(), 2);
        for (id, pos) in k.iter().collect::<Vec<_>>() {
            s.slots_mut(pos).unwrap().copy_from_slice(&[id as i32, -(id as i32)]);
        }
        let all: Vec<_> = s.iter_with(&k).map(|(id, _, f)| (id, f.to_vec())).collect();
        assert_eq!(all, vec![(1, vec![1, -1]), (2, vec![2, -2]), (4, vec![4, -4])]);
        let tail: Vec<u32> = s
            .range(k.range_between(2, 4).unwrap())
            .rev()
            .map(|(id, _, _)| id)
            .collect();
        assert_eq!(tail, vec![4, 2]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn par_fill_matches_fill() {
        let mut s = Store::new(3).unwrap();
        s.commit(&SyncAction::Resize { len: 100 }).unwrap();
        s.par_fill(4);
        assert!(s.as_slice().iter().all(|&v| v == 4));
    }
}
