//! Traversal of live positions.
//!
//! Three flavors, all skipping holes and walking in position order:
//! - [`Iter`]: borrowing, double-ended iterator over `(id, position)`.
//!   The borrow checker rules out mutation while it is alive.
//! - [`PiercedRange`]: a window of positions that can be iterated any
//!   number of times.
//! - [`Cursor`]: detached traversal state that does not borrow the kernel.
//!   It snapshots the kernel version and fails fast with
//!   `ConcurrentModification` once the kernel is structurally modified.

use std::iter::FusedIterator;

use crate::containers::kernel::PiercedKernel;
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Borrowing iterator over `(id, position)` of live slots.
#[derive(Clone, Debug)]
pub struct Iter<'a, Id> {
    slots: &'a [Option<Id>],
    front: usize,
    back: usize,
}

impl<'a, Id: Copy> Iter<'a, Id> {
    pub(crate) fn new(slots: &'a [Option<Id>], start: usize, stop: usize) -> Self {
        let back = stop.min(slots.len());
        Iter {
            slots,
            front: start.min(back),
            back,
        }
    }
}

impl<Id: Copy> Iterator for Iter<'_, Id> {
    type Item = (Id, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.front < self.back {
            let pos = self.front;
            self.front += 1;
            if let Some(id) = self.slots[pos] {
                return Some((id, pos));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.back - self.front))
    }
}

impl<Id: Copy> DoubleEndedIterator for Iter<'_, Id> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while self.front < self.back {
            self.back -= 1;
            if let Some(id) = self.slots[self.back] {
                return Some((id, self.back));
            }
        }
        None
    }
}

impl<Id: Copy> FusedIterator for Iter<'_, Id> {}

/// Restartable window `[start, stop)` over a kernel's positions.
///
/// Every call to [`iter`](Self::iter) starts again from the beginning of
/// the window; two iterations with no mutation in between yield the same
/// sequence.
#[derive(Clone, Copy, Debug)]
pub struct PiercedRange<'a, Id: PiercedId> {
    kernel: &'a PiercedKernel<Id>,
    start: usize,
    stop: usize,
}

impl<'a, Id: PiercedId> PiercedRange<'a, Id> {
    pub(crate) fn new(kernel: &'a PiercedKernel<Id>, start: usize, stop: usize) -> Self {
        let stop = stop.min(kernel.capacity());
        PiercedRange {
            kernel,
            start: start.min(stop),
            stop,
        }
    }

    /// Fresh iterator over the window.
    pub fn iter(&self) -> Iter<'a, Id> {
        Iter::new(self.kernel.slots(), self.start, self.stop)
    }

    /// First position of the window.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last position of the window.
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Number of live entries in the window.
    pub fn count_live(&self) -> usize {
        self.iter().count()
    }

    /// Whether the window holds no live entry.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a, Id: PiercedId> IntoIterator for PiercedRange<'a, Id> {
    type Item = (Id, usize);
    type IntoIter = Iter<'a, Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, Id: PiercedId> IntoIterator for &PiercedRange<'a, Id> {
    type Item = (Id, usize);
    type IntoIter = Iter<'a, Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Traversal state detached from the kernel borrow.
///
/// A cursor remembers the next position to inspect and the kernel version
/// it started at. Advancing after any insert, erase, flush or other
/// structural change fails with `ConcurrentModification`; call
/// [`restart`](Self::restart) to traverse the new layout.
///
/// A cursor must be advanced against the kernel that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    next: usize,
    version: u64,
}

impl Cursor {
    pub(crate) fn new<Id: PiercedId>(kernel: &PiercedKernel<Id>) -> Self {
        Cursor {
            next: kernel.first_pos().unwrap_or(0),
            version: kernel.version(),
        }
    }

    /// Next live `(id, position)`, `Ok(None)` once exhausted.
    ///
    /// # Errors
    /// `ConcurrentModification` if `kernel` changed structurally since the
    /// cursor was created or restarted.
    pub fn advance<Id: PiercedId>(
        &mut self,
        kernel: &PiercedKernel<Id>,
    ) -> Result<Option<(Id, usize)>, PiercedError> {
        self.check(kernel)?;
        let mut it = Iter::new(kernel.slots(), self.next, kernel.live_end());
        match it.next() {
            Some((id, pos)) => {
                self.next = pos + 1;
                Ok(Some((id, pos)))
            }
            None => {
                self.next = kernel.live_end();
                Ok(None)
            }
        }
    }

    /// Rewind to the first live position and adopt the current version.
    pub fn restart<Id: PiercedId>(&mut self, kernel: &PiercedKernel<Id>) {
        *self = Cursor::new(kernel);
    }

    /// Whether the cursor can still be advanced against `kernel`.
    pub fn is_valid<Id: PiercedId>(&self, kernel: &PiercedKernel<Id>) -> bool {
        self.version == kernel.version()
    }

    /// Version snapshot taken when the cursor (re)started.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn check<Id: PiercedId>(&self, kernel: &PiercedKernel<Id>) -> Result<(), PiercedError> {
        if self.version != kernel.version() {
            return Err(PiercedError::ConcurrentModification {
                expected: self.version,
                found: kernel.version(),
            });
        }
        Ok(())
    }
}
