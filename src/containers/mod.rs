//! Containers module: the pierced kernel, its storages and façades.
#![warn(missing_docs)]

pub mod bins;
pub mod buffer;
pub mod cache;
pub mod kernel;
pub mod range;
pub mod storage;
pub mod sync;
pub mod vector;

pub use bins::bin_group;
pub use cache::ValueCache;
pub use kernel::{Compaction, PiercedKernel};
pub use range::{Cursor, Iter, PiercedRange};
pub use storage::PiercedStorage;
pub use sync::{SyncAction, SyncHandle, SyncJournal};
pub use vector::PiercedVector;
