//! Construction-time configuration for pierced containers.

use serde::{Deserialize, Serialize};

/// Largest capacity a kernel accepts unless configured otherwise.
pub const DEFAULT_MAX_CAPACITY: usize = u32::MAX as usize;

/// Journal length above which a warning is logged once per growth spurt.
pub const DEFAULT_JOURNAL_WARN_LEN: usize = 1 << 16;

/// Tunables shared by kernels, storages and vectors.
///
/// ```rust
/// use mesh_pierced::config::PiercedConfig;
/// let cfg = PiercedConfig { initial_capacity: 64, ..Default::default() };
/// assert_eq!(cfg.initial_capacity, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiercedConfig {
    /// Upper bound on the number of positions (`CapacityError` beyond it).
    pub max_capacity: usize,
    /// Positions reserved at construction.
    pub initial_capacity: usize,
    /// Journal length that triggers a `log::warn!` about storages lagging
    /// behind their kernel.
    pub journal_warn_len: usize,
}

impl Default for PiercedConfig {
    fn default() -> Self {
        PiercedConfig {
            max_capacity: DEFAULT_MAX_CAPACITY,
            initial_capacity: 0,
            journal_warn_len: DEFAULT_JOURNAL_WARN_LEN,
        }
    }
}

/// Backing layout of a [`ValueCache`](crate::containers::cache::ValueCache).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheLayout {
    /// Array indexed directly by id; best for small, dense id ranges.
    Dense,
    /// Hash map; best for sparse ids with few entries.
    Hashed,
    /// Pierced vector; dense payload with stable ids.
    #[default]
    Pierced,
}
