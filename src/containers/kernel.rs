//! PiercedKernel: identifier lifecycle and position bookkeeping.
//!
//! The kernel decides *where* every live id lives inside a dense array of
//! positions, and which positions are holes. It never touches payload data:
//! each structural operation returns a [`SyncAction`] describing the change
//! so that storages can mirror it (see [`super::sync`]).
//!
//! Hole policy: inserts reuse holes before growing, and when several holes
//! are eligible the lowest position wins.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::PiercedConfig;
use crate::containers::range::{Cursor, Iter, PiercedRange};
use crate::containers::sync::{SyncAction, SyncHandle, SyncJournal};
use crate::debug_invariants::DebugInvariants;
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Result of compacting a kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compaction {
    /// `remap[old_pos]` is the new position of the entry formerly at
    /// `old_pos`, or `None` if `old_pos` was a hole.
    pub remap: Vec<Option<usize>>,
    /// Action to commit to attached storages.
    pub action: SyncAction,
}

impl Compaction {
    /// Whether no entry moved.
    pub fn is_identity(&self) -> bool {
        self.remap
            .iter()
            .enumerate()
            .all(|(old, new)| *new == Some(old))
    }
}

/// `PiercedKernel` maintains:
/// - `positions`: id → position of every live entry,
/// - `ids`: position → id, `None` marking a hole,
/// - `holes`: the free-list, ordered so the lowest hole is found first,
/// - `begin`/`end`: the window `[begin, end)` spanning all live positions,
/// - `dirty`: set when holes appear, cleared once they are compacted,
/// - `version`: bumped by every structural modification.
///
/// # Invariants
/// - Every live id maps to exactly one position whose back-mapping is the id.
/// - `holes` is exactly the set of positions with no id bound.
/// - `ids.len()` (the capacity) never exceeds `max_capacity`.
///
/// These are checked after mutations in debug builds and with the
/// `check-invariants` feature.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "Id: Serialize", deserialize = "Id: Deserialize<'de>"))]
pub struct PiercedKernel<Id: PiercedId> {
    positions: HashMap<Id, usize>,
    ids: Vec<Option<Id>>,
    holes: BTreeSet<usize>,
    begin: usize,
    end: usize,
    dirty: bool,
    version: u64,
    max_capacity: usize,
    journal: SyncJournal,
}

impl<Id: PiercedId> Default for PiercedKernel<Id> {
    fn default() -> Self {
        PiercedKernel::with_config(&PiercedConfig::default())
    }
}

impl<Id: PiercedId> PiercedKernel<Id> {
    /// Empty kernel with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty kernel honoring `cfg`.
    pub fn with_config(cfg: &PiercedConfig) -> Self {
        let initial = cfg.initial_capacity.min(cfg.max_capacity);
        PiercedKernel {
            positions: HashMap::with_capacity(initial),
            ids: Vec::with_capacity(initial),
            holes: BTreeSet::new(),
            begin: 0,
            end: 0,
            dirty: false,
            version: 0,
            max_capacity: cfg.max_capacity,
            journal: SyncJournal::with_warn_len(cfg.journal_warn_len),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Position of `id`, or `None` if it is not live.
    ///
    /// # Complexity
    /// **O(1)** expected.
    #[inline]
    pub fn find(&self, id: Id) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Position of `id`, or `NotFound`.
    #[inline]
    pub fn position(&self, id: Id) -> Result<usize, PiercedError> {
        self.find(id).ok_or_else(|| PiercedError::not_found(id))
    }

    /// Whether `id` is live.
    #[inline]
    pub fn contains(&self, id: Id) -> bool {
        self.positions.contains_key(&id)
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of positions, live or hole. Attached storages hold exactly
    /// this many slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Configured upper bound for [`capacity`](Self::capacity).
    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of holes.
    #[inline]
    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    /// Whether holes were created since the last compaction.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Monotonic counter changing on every structural modification.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Id bound at `pos`, `None` for holes and out-of-range positions.
    #[inline]
    pub fn id_at(&self, pos: usize) -> Option<Id> {
        self.ids.get(pos).copied().flatten()
    }

    /// Whether `pos` is a hole. Out-of-range positions are not holes.
    #[inline]
    pub fn is_hole(&self, pos: usize) -> bool {
        matches!(self.ids.get(pos), Some(None))
    }

    /// First live position, if any.
    #[inline]
    pub fn first_pos(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.begin)
    }

    /// Last live position, if any.
    #[inline]
    pub fn last_pos(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    /// One past the last live position (0 when empty).
    #[inline]
    pub fn live_end(&self) -> usize {
        self.end
    }

    /// Id at the first live position.
    pub fn front(&self) -> Result<Id, PiercedError> {
        self.first_pos()
            .and_then(|pos| self.id_at(pos))
            .ok_or(PiercedError::Empty)
    }

    /// Id at the last live position.
    pub fn back(&self) -> Result<Id, PiercedError> {
        self.last_pos()
            .and_then(|pos| self.id_at(pos))
            .ok_or(PiercedError::Empty)
    }

    /// Number of live entries stored before `id`.
    ///
    /// # Complexity
    /// **O(n)** in the distance from the first live position.
    pub fn rank(&self, id: Id) -> Result<usize, PiercedError> {
        let pos = self.position(id)?;
        Ok(self.ids[self.begin..pos].iter().filter(|s| s.is_some()).count())
    }

    /// Raw position → id table, holes included.
    #[inline]
    pub(crate) fn slots(&self) -> &[Option<Id>] {
        &self.ids
    }

    /// Lowest hole position, if any.
    #[inline]
    pub fn first_hole(&self) -> Option<usize> {
        self.holes.first().copied()
    }

    /// Borrowing iterator over `(id, position)` of live entries in position
    /// order.
    pub fn iter(&self) -> Iter<'_, Id> {
        Iter::new(&self.ids, self.begin, self.end)
    }

    /// Iterator over live ids in position order.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.iter().map(|(id, _)| id)
    }

    /// Restartable range over every live entry.
    pub fn range(&self) -> PiercedRange<'_, Id> {
        PiercedRange::new(self, self.begin, self.end)
    }

    /// Restartable range from `first` to `last`, both included.
    ///
    /// # Errors
    /// `NotFound` if either id is not live. An inverted pair yields an
    /// empty range.
    pub fn range_between(
        &self,
        first: Id,
        last: Id,
    ) -> Result<PiercedRange<'_, Id>, PiercedError> {
        let start = self.position(first)?;
        let stop = self.position(last)?;
        Ok(PiercedRange::new(self, start, (stop + 1).max(start)))
    }

    /// Detached cursor over all live entries; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    // ------------------------------------------------------------------
    // Capacity
    // ------------------------------------------------------------------

    /// Pre-allocate room for at least `n` positions. Live content and
    /// [`capacity`](Self::capacity) are unchanged.
    ///
    /// # Errors
    /// `Capacity` if `n` exceeds the configured maximum.
    pub fn reserve(&mut self, n: usize) -> Result<SyncAction, PiercedError> {
        self.check_capacity(n)?;
        self.ids.reserve(n.saturating_sub(self.ids.len()));
        self.positions.reserve(n.saturating_sub(self.positions.len()));
        Ok(self.emit(SyncAction::Reserve { capacity: n }))
    }

    /// Set the number of positions to `n`. New positions are holes.
    ///
    /// # Errors
    /// `Capacity` above the maximum, `InUse` if a live position would be
    /// cut. Nothing changes on error.
    pub fn resize(&mut self, n: usize) -> Result<SyncAction, PiercedError> {
        self.check_capacity(n)?;
        if n < self.end {
            return Err(PiercedError::InUse {
                requested: n,
                live_end: self.end,
            });
        }
        let old = self.ids.len();
        if n == old {
            return Ok(SyncAction::Noop);
        }
        if n < old {
            self.holes.split_off(&n);
            self.ids.truncate(n);
            if self.holes.is_empty() {
                self.dirty = false;
            }
        } else {
            self.ids.resize(n, None);
            self.holes.extend(old..n);
            self.dirty = true;
        }
        log::debug!("kernel resized {} -> {} positions", old, n);
        Ok(self.emit(SyncAction::Resize { len: n }))
    }

    /// Release spare allocation.
    pub fn shrink_to_fit(&mut self) -> SyncAction {
        self.ids.shrink_to_fit();
        self.positions.shrink_to_fit();
        self.emit(SyncAction::ShrinkToFit)
    }

    /// Drop every entry and position.
    pub fn clear(&mut self) -> SyncAction {
        self.positions.clear();
        self.ids.clear();
        self.holes.clear();
        self.begin = 0;
        self.end = 0;
        self.dirty = false;
        self.emit(SyncAction::Clear)
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Bind `id` to the lowest hole, or append when there is none.
    ///
    /// # Example
    /// ```rust
    /// # fn try_main() -> Result<(), mesh_pierced::pierced_error::PiercedError> {
    /// use mesh_pierced::containers::kernel::PiercedKernel;
    /// let mut k = PiercedKernel::<u64>::new();
    /// for id in [1, 2, 3] {
    ///     k.insert(id)?;
    /// }
    /// k.erase(2)?;
    /// k.insert(4)?;
    /// assert_eq!(k.find(4), Some(1));
    /// assert_eq!(k.ids().collect::<Vec<_>>(), vec![1, 4, 3]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn insert(&mut self, id: Id) -> Result<SyncAction, PiercedError> {
        self.fill_hole(id)
    }

    /// Consume the lowest hole for `id`; falls back to
    /// [`insert_append`](Self::insert_append) when there are no holes.
    ///
    /// # Errors
    /// `DuplicateId` if `id` is live, `Capacity` if growth is needed past
    /// the maximum.
    pub fn fill_hole(&mut self, id: Id) -> Result<SyncAction, PiercedError> {
        self.check_absent(id)?;
        match self.first_hole() {
            Some(pos) => {
                self.bind(pos, id);
                Ok(self.emit(SyncAction::Overwrite { pos }))
            }
            None => self.append_unchecked(id),
        }
    }

    /// Bind `id` right after the last live position, reusing the trailing
    /// hole if there is one and growing by one slot otherwise.
    ///
    /// # Errors
    /// `DuplicateId` if `id` is live, `Capacity` past the maximum.
    pub fn insert_append(&mut self, id: Id) -> Result<SyncAction, PiercedError> {
        self.check_absent(id)?;
        self.append_unchecked(id)
    }

    /// Bind `id` immediately before `reference`.
    ///
    /// The nearest hole on either side is moved next to `reference` by
    /// shifting the entries in between (ties go to the lower hole). Without
    /// holes one slot is inserted.
    ///
    /// # Errors
    /// `DuplicateId` if `id` is live, `NotFound` if `reference` is not,
    /// `Capacity` if growth is needed past the maximum.
    pub fn insert_before(&mut self, id: Id, reference: Id) -> Result<SyncAction, PiercedError> {
        self.check_absent(id)?;
        let rpos = self.position(reference)?;
        // New entry lands at rpos-1 when pulling a lower hole up, at rpos
        // when pushing `reference` toward a higher hole.
        self.insert_near(id, rpos.checked_sub(1), rpos)
    }

    /// Bind `id` immediately after `reference`; see
    /// [`insert_before`](Self::insert_before) for the hole policy.
    pub fn insert_after(&mut self, id: Id, reference: Id) -> Result<SyncAction, PiercedError> {
        self.check_absent(id)?;
        let rpos = self.position(reference)?;
        self.insert_near(id, Some(rpos), rpos + 1)
    }

    /// `below`: landing position if a hole under it is used (the entry at
    /// `below` and everything down to the hole shift down by one).
    /// `above`: landing position if a hole at or over it is used.
    fn insert_near(
        &mut self,
        id: Id,
        below: Option<usize>,
        above: usize,
    ) -> Result<SyncAction, PiercedError> {
        let lower = below.and_then(|b| {
            self.holes
                .range(..=b)
                .next_back()
                .map(|&h| (h, b, b - h))
        });
        let upper = self
            .holes
            .range(above..)
            .next()
            .map(|&h| (h, above, h - above));

        let chosen = match (lower, upper) {
            (Some(l), Some(u)) => Some(if u.2 < l.2 { u } else { l }),
            (l, u) => l.or(u),
        };

        match chosen {
            Some((hole, pos, _)) => {
                self.shift_hole(hole, pos);
                self.bind(pos, id);
                let action = if hole == pos {
                    SyncAction::Overwrite { pos }
                } else {
                    SyncAction::Shift { hole, pos }
                };
                Ok(self.emit(action))
            }
            None => {
                // No holes at all: open a new slot at `above`.
                self.check_capacity(self.ids.len() + 1)?;
                let pos = above;
                if pos == self.ids.len() {
                    self.ids.push(None);
                    self.bind(pos, id);
                    return Ok(self.emit(SyncAction::Append { pos }));
                }
                self.ids.insert(pos, None);
                for (p, slot) in self.ids.iter().enumerate().skip(pos + 1) {
                    if let Some(moved) = slot {
                        self.positions.insert(*moved, p);
                    }
                }
                if self.end > pos {
                    self.end += 1;
                }
                if self.begin > pos {
                    self.begin += 1;
                }
                self.bind(pos, id);
                Ok(self.emit(SyncAction::Insert { pos }))
            }
        }
    }

    fn append_unchecked(&mut self, id: Id) -> Result<SyncAction, PiercedError> {
        let pos = self.end;
        if pos < self.ids.len() {
            self.bind(pos, id);
            return Ok(self.emit(SyncAction::Overwrite { pos }));
        }
        self.check_capacity(pos + 1)?;
        self.ids.push(None);
        self.bind(pos, id);
        Ok(self.emit(SyncAction::Append { pos }))
    }

    // ------------------------------------------------------------------
    // Removal and reordering
    // ------------------------------------------------------------------

    /// Unbind `id`; its position becomes a hole.
    ///
    /// # Errors
    /// `NotFound` if `id` is not live.
    pub fn erase(&mut self, id: Id) -> Result<SyncAction, PiercedError> {
        let pos = self
            .positions
            .remove(&id)
            .ok_or_else(|| PiercedError::not_found(id))?;
        self.ids[pos] = None;
        self.holes.insert(pos);
        self.dirty = true;

        if self.positions.is_empty() {
            self.begin = 0;
            self.end = 0;
        } else {
            if pos == self.begin {
                while self.ids[self.begin].is_none() {
                    self.begin += 1;
                }
            }
            if pos + 1 == self.end {
                while self.ids[self.end - 1].is_none() {
                    self.end -= 1;
                }
            }
        }
        Ok(self.emit(SyncAction::Pierce { pos }))
    }

    /// Compact all holes, moving live entries down to the front in their
    /// current order. Capacity shrinks to [`len`](Self::len).
    ///
    /// Idempotent: without holes the remap is the identity, the action is
    /// `Noop` and the version does not change. The dirty flag is cleared
    /// either way.
    pub fn flush(&mut self) -> Compaction {
        if self.holes.is_empty() {
            self.dirty = false;
            return Compaction {
                remap: (0..self.ids.len()).map(Some).collect(),
                action: SyncAction::Noop,
            };
        }

        let old_len = self.ids.len();
        let mut remap = vec![None; old_len];
        let mut order = Vec::with_capacity(self.positions.len());
        let mut packed = Vec::with_capacity(self.positions.len());
        for (old, slot) in self.ids.iter().enumerate() {
            if let Some(id) = slot {
                remap[old] = Some(order.len());
                self.positions.insert(*id, order.len());
                order.push(old);
                packed.push(Some(*id));
            }
        }
        log::debug!(
            "flushed {} hole(s): {} -> {} positions",
            self.holes.len(),
            old_len,
            packed.len()
        );
        self.ids = packed;
        self.reset_dense();
        let action = self.emit(SyncAction::Reorder { order });
        Compaction { remap, action }
    }

    /// [`flush`](Self::flush) followed by [`shrink_to_fit`](Self::shrink_to_fit).
    pub fn squeeze(&mut self) -> Compaction {
        let mut compaction = self.flush();
        self.ids.shrink_to_fit();
        self.positions.shrink_to_fit();
        if compaction.action == SyncAction::Noop {
            compaction.action = self.emit(SyncAction::ShrinkToFit);
        }
        compaction
    }

    /// Reorder live entries by ascending id, compacting holes.
    pub fn sort(&mut self) -> Compaction {
        let mut live: Vec<(Id, usize)> = self.iter().collect();
        live.sort_unstable_by_key(|&(id, _)| id);

        let mut remap = vec![None; self.ids.len()];
        let mut order = Vec::with_capacity(live.len());
        self.ids.clear();
        for (new, (id, old)) in live.into_iter().enumerate() {
            remap[old] = Some(new);
            order.push(old);
            self.ids.push(Some(id));
            self.positions.insert(id, new);
        }
        log::debug!("sorted {} entries by id", order.len());
        self.reset_dense();
        let action = self.emit(SyncAction::Reorder { order });
        Compaction { remap, action }
    }

    /// Exchange the positions of two live ids.
    ///
    /// # Errors
    /// `NotFound` if either id is not live.
    pub fn swap(&mut self, a: Id, b: Id) -> Result<SyncAction, PiercedError> {
        let pa = self.position(a)?;
        let pb = self.position(b)?;
        if pa == pb {
            return Ok(SyncAction::Noop);
        }
        self.ids.swap(pa, pb);
        self.positions.insert(a, pb);
        self.positions.insert(b, pa);
        Ok(self.emit(SyncAction::Swap { a: pa, b: pb }))
    }

    /// Rebind the entry of `old` to `new` without moving it.
    ///
    /// # Errors
    /// `NotFound` if `old` is not live, `DuplicateId` if `new` already is.
    pub fn update_id(&mut self, old: Id, new: Id) -> Result<(), PiercedError> {
        let pos = self.position(old)?;
        if old == new {
            return Ok(());
        }
        self.check_absent(new)?;
        self.positions.remove(&old);
        self.positions.insert(new, pos);
        self.ids[pos] = Some(new);
        self.version = self.version.wrapping_add(1);
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    /// Register a storage currently matching this kernel's layout; every
    /// later action is journaled for it.
    pub fn register_storage(&mut self) -> SyncHandle {
        self.journal.register()
    }

    /// Stop journaling for `handle`.
    pub fn unregister_storage(&mut self, handle: SyncHandle) -> Result<(), PiercedError> {
        self.journal.unregister(handle)
    }

    /// Read access to the journal.
    pub fn journal(&self) -> &SyncJournal {
        &self.journal
    }

    pub(crate) fn journal_mut(&mut self) -> &mut SyncJournal {
        &mut self.journal
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_absent(&self, id: Id) -> Result<(), PiercedError> {
        if self.positions.contains_key(&id) {
            return Err(PiercedError::duplicate(id));
        }
        Ok(())
    }

    fn check_capacity(&self, n: usize) -> Result<(), PiercedError> {
        if n > self.max_capacity {
            return Err(PiercedError::Capacity {
                requested: n,
                max: self.max_capacity,
            });
        }
        Ok(())
    }

    /// Move the hole at `hole` to `pos`, shifting the entries in between
    /// one step toward `hole`.
    fn shift_hole(&mut self, hole: usize, pos: usize) {
        if hole < pos {
            for p in hole..pos {
                self.ids[p] = self.ids[p + 1];
                if let Some(id) = self.ids[p] {
                    self.positions.insert(id, p);
                }
            }
        } else {
            for p in (pos + 1..=hole).rev() {
                self.ids[p] = self.ids[p - 1];
                if let Some(id) = self.ids[p] {
                    self.positions.insert(id, p);
                }
            }
        }
        self.ids[pos] = None;
        self.holes.remove(&hole);
        self.holes.insert(pos);
        // Every slot between the two ends is live after the shift.
        let (lo, hi) = (hole.min(pos), hole.max(pos));
        if hole < pos {
            self.widen(lo, hi);
        } else {
            self.widen(lo + 1, hi);
        }
    }

    /// Bind a free slot at `pos` to `id`.
    fn bind(&mut self, pos: usize, id: Id) {
        debug_assert!(self.ids[pos].is_none());
        self.ids[pos] = Some(id);
        self.positions.insert(id, pos);
        self.holes.remove(&pos);
        self.widen(pos, pos);
    }

    /// Grow `[begin, end)` to cover `[lo, hi]`.
    fn widen(&mut self, lo: usize, hi: usize) {
        if self.begin >= self.end {
            self.begin = lo;
            self.end = hi + 1;
        } else {
            self.begin = self.begin.min(lo);
            self.end = self.end.max(hi + 1);
        }
    }

    /// Fix bookkeeping after `ids` was rebuilt without holes.
    fn reset_dense(&mut self) {
        self.holes.clear();
        self.begin = 0;
        self.end = self.ids.len();
        self.dirty = false;
    }

    fn emit(&mut self, action: SyncAction) -> SyncAction {
        if action.is_structural() {
            self.version = self.version.wrapping_add(1);
        }
        self.journal.record(&action);
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        action
    }
}

impl<Id: PiercedId> DebugInvariants for PiercedKernel<Id> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PiercedKernel invalid");
    }

    fn validate_invariants(&self) -> Result<(), PiercedError> {
        // 1) id -> pos -> id
        for (&id, &pos) in &self.positions {
            if self.ids.get(pos).copied().flatten() != Some(id) {
                return Err(PiercedError::not_found(id));
            }
        }

        // 2) every bound slot is in the map, every unbound slot is a hole
        let mut bound = 0usize;
        for (pos, slot) in self.ids.iter().enumerate() {
            match slot {
                Some(id) => {
                    bound += 1;
                    if self.positions.get(id) != Some(&pos) {
                        return Err(PiercedError::duplicate(*id));
                    }
                    if self.holes.contains(&pos) {
                        return Err(PiercedError::InUse {
                            requested: pos,
                            live_end: self.end,
                        });
                    }
                }
                None => {
                    if !self.holes.contains(&pos) {
                        return Err(PiercedError::OutOfRange {
                            pos,
                            field: 0,
                            capacity: self.ids.len(),
                            fields: 1,
                        });
                    }
                }
            }
        }
        if bound != self.positions.len() || bound + self.holes.len() != self.ids.len() {
            return Err(PiercedError::StorageMismatch {
                expected: self.ids.len(),
                found: bound + self.holes.len(),
            });
        }

        // 3) live window is tight
        if self.positions.is_empty() {
            if self.begin != 0 || self.end != 0 {
                return Err(PiercedError::Empty);
            }
        } else if self.id_at(self.begin).is_none()
            || self.end == 0
            || self.id_at(self.end - 1).is_none()
            || self.ids[..self.begin].iter().any(Option::is_some)
            || self.ids[self.end..].iter().any(Option::is_some)
        {
            return Err(PiercedError::InUse {
                requested: self.begin,
                live_end: self.end,
            });
        }

        // 4) holes imply dirty, capacity bounded
        if !self.holes.is_empty() && !self.dirty {
            return Err(PiercedError::StorageMismatch {
                expected: self.positions.len(),
                found: self.ids.len(),
            });
        }
        if self.ids.len() > self.max_capacity {
            return Err(PiercedError::Capacity {
                requested: self.ids.len(),
                max: self.max_capacity,
            });
        }
        Ok(())
    }
}
