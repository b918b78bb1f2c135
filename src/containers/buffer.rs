//! Pluggable backing buffers for pierced storages.
//!
//! This trait abstracts how a storage's flat slot array is held (e.g. Vec,
//! pinned or mapped memory). Storages only need contiguous slice access plus
//! a handful of resizing primitives.

use core::fmt::{self, Debug};

/// Contiguous, indexable buffer of `V`.
pub trait SlotBuffer<V>: Debug {
    /// Construct a buffer of `len`, filled with `fill`.
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone;

    /// Current length in elements.
    fn len(&self) -> usize;

    /// Whether the buffer holds no element.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `new_len`, filling new cells with `fill`.
    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone;

    /// Insert `count` copies of `fill` at `at`, shifting the tail up.
    fn insert_fill(&mut self, at: usize, count: usize, fill: V)
    where
        V: Clone;

    /// Reserve room for `additional` more elements.
    fn reserve(&mut self, additional: usize);

    /// Release spare allocation.
    fn shrink_to_fit(&mut self);

    /// Replace the whole content.
    fn replace(&mut self, values: Vec<V>);

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[V];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [V];
}

/// `Vec`-backed buffer (default).
#[derive(Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VecBuffer<V>(pub(crate) Vec<V>);

impl<V> Default for VecBuffer<V> {
    fn default() -> Self {
        VecBuffer(Vec::new())
    }
}

impl<V> Debug for VecBuffer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecBuffer")
            .field("len", &self.0.len())
            .field("capacity", &self.0.capacity())
            .finish()
    }
}

impl<V> SlotBuffer<V> for VecBuffer<V> {
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone,
    {
        VecBuffer(vec![fill; len])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone,
    {
        self.0.resize(new_len, fill);
    }

    fn insert_fill(&mut self, at: usize, count: usize, fill: V)
    where
        V: Clone,
    {
        self.0.splice(at..at, std::iter::repeat_n(fill, count));
    }

    fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    fn shrink_to_fit(&mut self) {
        self.0.shrink_to_fit();
    }

    fn replace(&mut self, values: Vec<V>) {
        self.0 = values;
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

impl<V> From<Vec<V>> for VecBuffer<V> {
    fn from(v: Vec<V>) -> Self {
        VecBuffer(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_fill_shifts_tail() {
        let mut b = VecBuffer::from(vec![1, 2, 3]);
        b.insert_fill(1, 2, 0);
        assert_eq!(b.as_slice(), &[1, 0, 0, 2, 3]);
    }

    #[test]
    fn resize_and_replace() {
        let mut b = VecBuffer::with_len(2, 9u8);
        b.resize(4, 0);
        assert_eq!(b.as_slice(), &[9, 9, 0, 0]);
        b.as_mut_slice()[3] = 5;
        b.resize(1, 0);
        assert_eq!(b.len(), 1);
        b.replace(vec![]);
        assert!(b.is_empty());
    }
}
