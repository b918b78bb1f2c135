//! Synchronization of storages with their kernel.
//!
//! Every structural change a [`PiercedKernel`](super::kernel::PiercedKernel)
//! makes is described by a [`SyncAction`]. Storages owned next to their
//! kernel (e.g. inside a [`PiercedVector`](super::vector::PiercedVector))
//! commit the returned action directly. Storages living elsewhere register
//! with the kernel to obtain a [`SyncHandle`]; from then on the kernel keeps
//! the actions in a [`SyncJournal`] until every registered storage has
//! replayed them.
//!
//! # Merging
//! To keep the journal short, a new action is folded into the tail entry
//! when no handle has consumed that entry yet:
//! - `Append`/`Resize` after `Append`/`Resize` become a single `Resize`,
//! - `Pierce` runs become one `PierceMultiple`,
//! - `Clear` discards all older history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_JOURNAL_WARN_LEN;
use crate::pierced_error::PiercedError;

/// Description of one structural change of a kernel, in position space.
///
/// Positions refer to the layout *before* the action for the source side
/// and *after* it for the destination side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    /// A new slot was pushed at the end.
    Append {
        /// Position of the new slot, equal to the old capacity.
        pos: usize,
    },
    /// A new slot was inserted, shifting the tail up by one.
    Insert {
        /// Position of the new slot.
        pos: usize,
    },
    /// A hole was bound to a new id.
    Overwrite {
        /// Position of the former hole.
        pos: usize,
    },
    /// A hole moved next to an insertion point by shifting the slots in
    /// between one step toward it; the freed position was then bound.
    Shift {
        /// Position of the hole before the shift.
        hole: usize,
        /// Position bound to the new id.
        pos: usize,
    },
    /// A slot became a hole.
    Pierce {
        /// Position of the new hole.
        pos: usize,
    },
    /// Several slots became holes.
    PierceMultiple {
        /// Positions of the new holes.
        positions: Vec<usize>,
    },
    /// Two slots were exchanged.
    Swap {
        /// First position.
        a: usize,
        /// Second position.
        b: usize,
    },
    /// Capacity changed; new slots are holes.
    Resize {
        /// New capacity.
        len: usize,
    },
    /// Room was reserved; layout unchanged.
    Reserve {
        /// Requested capacity.
        capacity: usize,
    },
    /// Slots were permuted and truncated.
    Reorder {
        /// New slot `i` is old slot `order[i]`.
        order: Vec<usize>,
    },
    /// Every slot was dropped.
    Clear,
    /// Spare allocation was released; layout unchanged.
    ShrinkToFit,
    /// Nothing changed.
    Noop,
}

impl SyncAction {
    /// Whether the action changes which slots exist or where they live.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            SyncAction::Noop | SyncAction::Reserve { .. } | SyncAction::ShrinkToFit
        )
    }
}

/// Token identifying a storage registered with a kernel's journal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncHandle(u64);

impl SyncHandle {
    /// Raw token value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Queue of actions not yet replayed by every registered storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncJournal {
    entries: Vec<SyncAction>,
    /// Sequence number of `entries[0]`.
    base_seq: u64,
    /// Next sequence number each handle has to replay.
    cursors: BTreeMap<SyncHandle, u64>,
    next_handle: u64,
    warn_len: usize,
    warned: bool,
}

impl Default for SyncJournal {
    fn default() -> Self {
        SyncJournal::with_warn_len(DEFAULT_JOURNAL_WARN_LEN)
    }
}

impl SyncJournal {
    /// Empty journal warning once it exceeds `warn_len` entries.
    pub fn with_warn_len(warn_len: usize) -> Self {
        SyncJournal {
            entries: Vec::new(),
            base_seq: 0,
            cursors: BTreeMap::new(),
            next_handle: 0,
            warn_len,
            warned: false,
        }
    }

    /// Whether any storage is registered; actions are only kept if so.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.cursors.is_empty()
    }

    /// Number of journaled entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.base_seq + self.entries.len() as u64
    }

    /// Register a storage that currently matches the kernel layout.
    pub fn register(&mut self) -> SyncHandle {
        let handle = SyncHandle(self.next_handle);
        self.next_handle += 1;
        self.cursors.insert(handle, self.next_seq());
        log::debug!("registered sync handle {}", handle.0);
        handle
    }

    /// Forget a storage; its pending entries may be trimmed.
    pub fn unregister(&mut self, handle: SyncHandle) -> Result<(), PiercedError> {
        self.cursors
            .remove(&handle)
            .ok_or(PiercedError::UnknownSyncHandle(handle.0))?;
        self.trim();
        Ok(())
    }

    /// Whether `handle` has replayed every journaled action.
    pub fn is_synced(&self, handle: SyncHandle) -> Result<bool, PiercedError> {
        let cursor = self
            .cursors
            .get(&handle)
            .ok_or(PiercedError::UnknownSyncHandle(handle.0))?;
        Ok(*cursor == self.next_seq())
    }

    /// Actions `handle` has not replayed yet, in order.
    pub fn pending(&self, handle: SyncHandle) -> Result<&[SyncAction], PiercedError> {
        let cursor = *self
            .cursors
            .get(&handle)
            .ok_or(PiercedError::UnknownSyncHandle(handle.0))?;
        let start = (cursor.saturating_sub(self.base_seq)) as usize;
        Ok(&self.entries[start..])
    }

    /// Mark everything pending for `handle` as replayed and drop entries
    /// every handle has seen.
    pub fn acknowledge(&mut self, handle: SyncHandle) -> Result<(), PiercedError> {
        let next = self.next_seq();
        let cursor = self
            .cursors
            .get_mut(&handle)
            .ok_or(PiercedError::UnknownSyncHandle(handle.0))?;
        *cursor = next;
        self.trim();
        Ok(())
    }

    /// Record an action, merging it into the tail entry when possible.
    pub fn record(&mut self, action: &SyncAction) {
        if !self.is_enabled() || matches!(action, SyncAction::Noop) {
            return;
        }

        if matches!(action, SyncAction::Clear) {
            // Nothing before a clear matters to a storage.
            let seq = self.next_seq();
            self.entries.clear();
            self.base_seq = seq;
            for cursor in self.cursors.values_mut() {
                *cursor = (*cursor).max(seq);
            }
            self.entries.push(SyncAction::Clear);
            return;
        }

        let tail_seq = self.next_seq();
        let tail_consumed = self.cursors.values().any(|&c| c == tail_seq);
        if !tail_consumed {
            if let Some(tail) = self.entries.last_mut() {
                if let Some(merged) = merge(tail, action) {
                    log::trace!("journal merge {:?} + {:?} -> {:?}", tail, action, merged);
                    *tail = merged;
                    return;
                }
            }
        }

        self.entries.push(action.clone());
        if self.entries.len() > self.warn_len && !self.warned {
            self.warned = true;
            log::warn!(
                "sync journal holds {} actions; a registered storage is not being synced",
                self.entries.len()
            );
        }
    }

    fn trim(&mut self) {
        let keep_from = match self.cursors.values().min() {
            Some(&min) => min,
            None => self.next_seq(),
        };
        let drop = (keep_from.saturating_sub(self.base_seq) as usize).min(self.entries.len());
        if drop > 0 {
            self.entries.drain(..drop);
            self.base_seq += drop as u64;
            log::debug!("trimmed {} journal entries", drop);
        }
        if self.entries.len() <= self.warn_len {
            self.warned = false;
        }
    }
}

fn merge(tail: &SyncAction, next: &SyncAction) -> Option<SyncAction> {
    use SyncAction::*;
    match (tail, next) {
        (Append { .. } | Resize { .. }, Append { pos }) => Some(Resize { len: pos + 1 }),
        (Append { .. } | Resize { .. }, Resize { len }) => Some(Resize { len: *len }),
        (Pierce { pos: a }, Pierce { pos: b }) => Some(PierceMultiple {
            positions: vec![*a, *b],
        }),
        (PierceMultiple { positions }, Pierce { pos }) => {
            let mut positions = positions.clone();
            positions.push(*pos);
            Some(PierceMultiple { positions })
        }
        _ => None,
    }
}
