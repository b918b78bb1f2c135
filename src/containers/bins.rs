//! Spatial bin grouping of point coordinates stored in a pierced vector.

use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};

use crate::containers::vector::PiercedVector;
use crate::id::PiercedId;
use crate::pierced_error::PiercedError;

/// Group the ids of `points` into `n_bins³` uniform bins over their
/// bounding box.
///
/// Bins are keyed by the flat index `i + n_bins * (j + n_bins * k)`, where
/// `(i, j, k)` are the per-axis bin coordinates; only non-empty bins are
/// returned, each listing its ids in position order. Points on the upper
/// face of the box fall in the last bin of that axis.
///
/// # Errors
/// `OutOfRange` if `n_bins == 0` or if `n_bins³` does not fit in `usize`.
pub fn bin_group<Id: PiercedId>(
    points: &PiercedVector<[f64; 3], Id>,
    n_bins: usize,
) -> Result<BTreeMap<usize, Vec<Id>>, PiercedError> {
    let total = n_bins
        .checked_pow(3)
        .filter(|&t| t > 0)
        .ok_or(PiercedError::OutOfRange {
            pos: n_bins,
            field: 0,
            capacity: 0,
            fields: 3,
        })?;
    let mut bins: BTreeMap<usize, Vec<Id>> = BTreeMap::new();
    if points.is_empty() {
        return Ok(bins);
    }

    let mut lo = [0.0; 3];
    let mut extent = [0.0; 3];
    for axis in 0..3 {
        let (min, max) = match points.values().map(|p| p[axis]).minmax_by(f64::total_cmp) {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(a, b) => (a, b),
        };
        lo[axis] = min;
        extent[axis] = max - min;
    }

    let axis_bin = |x: f64, axis: usize| -> usize {
        if extent[axis] <= 0.0 {
            return 0;
        }
        let t = (x - lo[axis]) / extent[axis];
        ((t * n_bins as f64) as usize).min(n_bins - 1)
    };

    for (id, p) in points.iter() {
        let (i, j, k) = (axis_bin(p[0], 0), axis_bin(p[1], 1), axis_bin(p[2], 2));
        bins.entry(i + n_bins * (j + n_bins * k)).or_default().push(id);
    }
    log::debug!(
        "binned {} point(s) into {} of {} bin(s)",
        points.len(),
        bins.len(),
        total
    );
    Ok(bins)
}
