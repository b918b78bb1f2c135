#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-pierced
//!
//! mesh-pierced provides "pierced" containers for mesh and data management:
//! ordered, id-addressed sequences whose erasures leave holes instead of
//! shifting their neighbors, so positions stay stable until an explicit
//! compaction.
//!
//! ## Features
//! - [`PiercedKernel`](crate::containers::PiercedKernel): id ↔ position
//!   bookkeeping with hole reuse, ordered insertion and compaction
//! - [`PiercedStorage`](crate::containers::PiercedStorage): multi-field
//!   payload slots kept in lockstep with a kernel through sync actions and a
//!   per-storage journal
//! - [`PiercedVector`](crate::containers::PiercedVector): a vector-like
//!   façade combining both
//! - Borrowing iterators, restartable ranges and detached cursors that fail
//!   fast on concurrent modification
//! - [`ValueCache`](crate::containers::ValueCache) with dense, hashed or
//!   pierced layouts, and spatial [`bin_group`](crate::containers::bin_group)
//!
//! ## Invariant checking
//!
//! Every mutation validates the container invariants in debug builds, or in
//! release builds with the `check-invariants` feature enabled.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-pierced = "0.3"
//! # Optional features:
//! # features = ["rayon", "check-invariants"]
//! ```

pub mod config;
pub mod containers;
pub mod debug_invariants;
pub mod id;
pub mod pierced_error;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude importing the most-used traits & types:
pub mod prelude {
    pub use crate::config::{CacheLayout, PiercedConfig};
    pub use crate::containers::{
        Compaction, Cursor, PiercedKernel, PiercedRange, PiercedStorage, PiercedVector,
        SyncAction, SyncHandle, ValueCache, bin_group,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::id::{EntityId, PiercedId};
    pub use crate::pierced_error::PiercedError;
}
